//! JSONL-backed evidence store.
//!
//! One append-only line-delimited JSON file holds every pattern's evidence.
//! Appends are serialized behind a single writer lock and fsync'd so a
//! record survives a crash immediately after the call returns.  Pruning
//! rewrites through a `.tmp` sibling and an atomic rename; corrupt lines
//! are quarantined to a `.corrupt` sidecar instead of poisoning a load.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use hearth_config::EvidenceConfig;
use hearth_core::{Clock, EvidenceStore, PatternEvidence, PatternId, StageError};

pub struct EvidenceLog {
    path: PathBuf,
    limits: EvidenceConfig,
    clock: Arc<dyn Clock>,
    /// Serializes appends and prunes; loads read a consistent snapshot
    /// because writes always leave whole lines behind.
    write_lock: Mutex<()>,
}

impl EvidenceLog {
    pub fn new(path: impl Into<PathBuf>, limits: EvidenceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            limits,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<Vec<PatternEvidence>, StageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)
            .map_err(|e| StageError::StoreUnavailable(format!("open evidence log: {e}")))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut corrupt = 0usize;
        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result
                .map_err(|e| StageError::StoreUnavailable(format!("read evidence log: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PatternEvidence>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    corrupt += 1;
                    warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt evidence record skipped"
                    );
                    self.quarantine(&line);
                }
            }
        }
        if corrupt > 0 {
            warn!(
                corrupt_lines = corrupt,
                path = %self.path.display(),
                "evidence log loaded with skipped corrupt lines"
            );
        }
        Ok(records)
    }

    fn quarantine(&self, line: &str) {
        let corrupt_path = self.path.with_extension("jsonl.corrupt");
        if let Ok(mut file) =
            fs::OpenOptions::new().create(true).append(true).open(&corrupt_path)
        {
            use std::io::Write as _;
            let _ = writeln!(file, "{line}");
        }
    }

    async fn append_lines(&self, records: &[PatternEvidence]) -> Result<(), StageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("create dir: {e}")))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StageError::StoreUnavailable(format!("open for append: {e}")))?;

        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| StageError::StoreUnavailable(format!("serialize: {e}")))?;
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("write: {e}")))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("write: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| StageError::StoreUnavailable(format!("flush: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| StageError::StoreUnavailable(format!("fsync: {e}")))?;
        Ok(())
    }

    /// Atomically replace the log with `records` via tmp-file + rename.
    async fn overwrite(&self, records: &[PatternEvidence]) -> Result<(), StageError> {
        let filename = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "evidence.jsonl".to_string());
        let tmp_path = self.path.with_file_name(format!("{filename}.tmp"));

        let write_result: Result<(), StageError> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("open tmp: {e}")))?;
            for record in records {
                let line = serde_json::to_string(record)
                    .map_err(|e| StageError::StoreUnavailable(format!("serialize: {e}")))?;
                file.write_all(line.as_bytes())
                    .await
                    .map_err(|e| StageError::StoreUnavailable(format!("write tmp: {e}")))?;
                file.write_all(b"\n")
                    .await
                    .map_err(|e| StageError::StoreUnavailable(format!("write tmp: {e}")))?;
            }
            file.flush()
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("flush tmp: {e}")))?;
            file.sync_all()
                .await
                .map_err(|e| StageError::StoreUnavailable(format!("fsync tmp: {e}")))?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StageError::StoreUnavailable(format!("rename: {err}")));
        }
        Ok(())
    }
}

#[async_trait]
impl EvidenceStore for EvidenceLog {
    async fn load(&self, pattern_id: PatternId) -> Result<Vec<PatternEvidence>, StageError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.pattern_id == pattern_id)
            .collect())
    }

    async fn append(&self, record: PatternEvidence) -> Result<(), StageError> {
        self.append_batch(vec![record]).await
    }

    async fn append_batch(&self, records: Vec<PatternEvidence>) -> Result<(), StageError> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        self.append_lines(&records).await
    }

    async fn prune(&self) -> Result<usize, StageError> {
        let _guard = self.write_lock.lock().await;
        let records = self.load_all()?;
        let before = records.len();

        let horizon = self.clock.now() - chrono::Duration::days(self.limits.max_age_days);
        let mut kept: Vec<PatternEvidence> = Vec::with_capacity(records.len());
        for pattern_id in PatternId::ALL {
            let mut for_pattern: Vec<PatternEvidence> = records
                .iter()
                .filter(|r| r.pattern_id == pattern_id && r.observed_at >= horizon)
                .cloned()
                .collect();
            // Most recent first; cap, then restore chronological order.
            for_pattern.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
            for_pattern.truncate(self.limits.max_per_pattern);
            for_pattern.reverse();
            kept.extend(for_pattern);
        }

        let removed = before - kept.len();
        if removed > 0 {
            self.overwrite(&kept).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use std::io::Write as _;

    use super::*;
    use hearth_core::{Domain, FixedClock, Polarity, Strength};

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn log_in(dir: &tempfile::TempDir, limits: EvidenceConfig) -> EvidenceLog {
        EvidenceLog::new(
            dir.path().join("evidence.jsonl"),
            limits,
            Arc::new(FixedClock(fixed_now())),
        )
    }

    fn record(days_ago: i64) -> PatternEvidence {
        PatternEvidence::new(
            PatternId::DecisionSpiral,
            Some(Domain::Work),
            fixed_now() - Duration::days(days_ago),
            Polarity::Support,
            Strength::Normal,
            "test query",
        )
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_in(&dir, EvidenceConfig::default());

        let first = record(1);
        let second = record(2);
        log.append(first.clone()).await.expect("append");
        log.append_batch(vec![second.clone()]).await.expect("append batch");

        let loaded = log.load(PatternId::DecisionSpiral).await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[1].id, second.id);

        let other = log.load(PatternId::Rumination).await.expect("load other");
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn prune_drops_old_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_in(&dir, EvidenceConfig { max_per_pattern: 100, max_age_days: 365 });

        log.append_batch(vec![record(1), record(400)]).await.expect("append");
        let removed = log.prune().await.expect("prune");
        assert_eq!(removed, 1);

        let remaining = log.load(PatternId::DecisionSpiral).await.expect("load");
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].observed_at > fixed_now() - Duration::days(2));
    }

    #[tokio::test]
    async fn prune_caps_records_per_pattern_keeping_most_recent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_in(&dir, EvidenceConfig { max_per_pattern: 3, max_age_days: 365 });

        log.append_batch((0..6).map(record).collect()).await.expect("append");
        let removed = log.prune().await.expect("prune");
        assert_eq!(removed, 3);

        let remaining = log.load(PatternId::DecisionSpiral).await.expect("load");
        assert_eq!(remaining.len(), 3);
        // The three most recent (0, 1, 2 days old) survive, oldest first.
        assert!(remaining.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));
        assert!(remaining.iter().all(|r| r.observed_at >= fixed_now() - Duration::days(2)));
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped_and_quarantined() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_in(&dir, EvidenceConfig::default());

        log.append(record(1)).await.expect("append");
        {
            let mut file = fs::OpenOptions::new()
                .append(true)
                .open(log.path())
                .expect("open raw");
            writeln!(file, "{{not valid json").expect("write garbage");
        }
        log.append(record(2)).await.expect("append after garbage");

        let loaded = log.load(PatternId::DecisionSpiral).await.expect("load");
        assert_eq!(loaded.len(), 2, "valid records survive a corrupt line");
        assert!(
            log.path().with_extension("jsonl.corrupt").exists(),
            "corrupt line quarantined to sidecar"
        );
    }

    #[tokio::test]
    async fn prune_of_clean_log_removes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_in(&dir, EvidenceConfig::default());
        log.append(record(1)).await.expect("append");
        assert_eq!(log.prune().await.expect("prune"), 0);
    }
}
