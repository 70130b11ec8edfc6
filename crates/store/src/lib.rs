pub mod corpus;
pub mod evidence_log;

pub use corpus::InMemoryCorpus;
pub use evidence_log::EvidenceLog;
