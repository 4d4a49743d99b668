//! Persistent audit ledger.
//!
//! A single JSON file holding the most recent decisions, oldest first,
//! capped at a fixed capacity. The whole array is rewritten on every
//! append; decision volume is a handful per authentication attempt, so
//! durability wins over write amplification here. Denials can additionally
//! save a PNG snapshot of the offending frame next to the ledger.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::decision::{CheckReport, DecisionCode};
use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Identity the caller asked to verify against.
    pub expected: String,
    /// Identity the matcher recognized, when it named one.
    pub subject: Option<String>,
    pub granted: bool,
    pub code: DecisionCode,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub checks: Vec<CheckReport>,
    /// Relative snapshot filename, when one was saved for this entry.
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub granted: usize,
    pub denied: usize,
    /// Granted share of all recorded attempts, in percent.
    pub success_rate: f64,
    pub by_code: std::collections::HashMap<String, usize>,
}

#[derive(Debug)]
pub struct DecisionLedger {
    path: PathBuf,
    snapshot_dir: Option<PathBuf>,
    capacity: usize,
    entries: Vec<LedgerEntry>,
}

impl DecisionLedger {
    /// Open (or create) the ledger file. A corrupt file is logged and
    /// replaced on the next append; refusing to start over a damaged audit
    /// trail would lock everyone out.
    pub fn open(
        path: impl Into<PathBuf>,
        snapshot_dir: Option<PathBuf>,
        capacity: usize,
    ) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(dir) = &snapshot_dir {
            std::fs::create_dir_all(dir)?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<LedgerEntry>>(&raw) {
                Ok(entries) => entries,
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "corrupt ledger, starting fresh");
                    Vec::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path,
            snapshot_dir,
            capacity: capacity.max(1),
            entries,
        })
    }

    /// Append an entry, saving a frame snapshot when a frame is provided
    /// and a snapshot directory is configured. Snapshot failures are logged
    /// and swallowed; the textual record must land regardless.
    pub fn append(
        &mut self,
        mut entry: LedgerEntry,
        frame: Option<&Frame>,
    ) -> Result<(), LedgerError> {
        if let (Some(dir), Some(frame)) = (&self.snapshot_dir, frame) {
            let name = format!("{}_{}.png", entry.timestamp.timestamp(), entry.code);
            match frame.image().save(dir.join(&name)) {
                Ok(()) => entry.snapshot = Some(name),
                Err(error) => tracing::warn!(%error, "snapshot save failed"),
            }
        }

        self.entries.push(entry);
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }
        self.persist()
    }

    pub fn recent(&self, count: usize) -> &[LedgerEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats {
            total: self.entries.len(),
            ..LedgerStats::default()
        };
        for entry in &self.entries {
            if entry.granted {
                stats.granted += 1;
            } else {
                stats.denied += 1;
            }
            *stats.by_code.entry(entry.code.to_string()).or_insert(0) += 1;
        }
        if stats.total > 0 {
            stats.success_rate = stats.granted as f64 / stats.total as f64 * 100.0;
        }
        stats
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_ledger;
    use super::*;
    use image::{Rgb, RgbImage};

    fn entry(code: DecisionCode, granted: bool) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            expected: "alice".to_string(),
            subject: None,
            granted,
            code,
            confidence: 50.0,
            reasons: Vec::new(),
            checks: Vec::new(),
            snapshot: None,
        }
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let mut ledger = temp_ledger(10, false);
        ledger
            .append(entry(DecisionCode::AccessGranted, true), None)
            .unwrap();
        ledger
            .append(entry(DecisionCode::SpoofDetected, false), None)
            .unwrap();

        let reloaded = DecisionLedger::open(ledger.path().to_path_buf(), None, 10).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.recent(1)[0].code, DecisionCode::SpoofDetected);
    }

    #[test]
    fn test_capacity_evicts_oldest_entries() {
        let mut ledger = temp_ledger(3, false);
        for i in 0..5 {
            let mut e = entry(DecisionCode::AccessGranted, true);
            e.expected = format!("user-{i}");
            ledger.append(e, None).unwrap();
        }
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.recent(3)[0].expected, "user-2");
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let ledger = temp_ledger(10, false);
        std::fs::write(ledger.path(), "not json at all").unwrap();
        let reopened = DecisionLedger::open(ledger.path().to_path_buf(), None, 10).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_snapshot_is_saved_for_provided_frames() {
        let mut ledger = temp_ledger(10, true);
        let frame = Frame::new(RgbImage::from_pixel(8, 8, Rgb([50; 3])), 0.0);
        ledger
            .append(entry(DecisionCode::SpoofDetected, false), Some(&frame))
            .unwrap();
        let saved = ledger.recent(1)[0].snapshot.clone().unwrap();
        assert!(saved.ends_with("_SPOOF_DETECTED.png"));
    }

    #[test]
    fn test_stats_count_by_outcome_and_code() {
        let mut ledger = temp_ledger(10, false);
        ledger
            .append(entry(DecisionCode::AccessGranted, true), None)
            .unwrap();
        ledger
            .append(entry(DecisionCode::SpoofDetected, false), None)
            .unwrap();
        ledger
            .append(entry(DecisionCode::SpoofDetected, false), None)
            .unwrap();
        let stats = ledger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.granted, 1);
        assert_eq!(stats.denied, 2);
        assert!((stats.success_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.by_code["SPOOF_DETECTED"], 2);
    }

    #[test]
    fn test_stats_cover_only_retained_entries() {
        let mut ledger = temp_ledger(3, false);
        ledger
            .append(entry(DecisionCode::AccessGranted, true), None)
            .unwrap();
        for _ in 0..3 {
            ledger
                .append(entry(DecisionCode::SpoofDetected, false), None)
                .unwrap();
        }
        // The grant was evicted, so it must not surface in the stats
        let stats = ledger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.granted, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(!stats.by_code.contains_key("ACCESS_GRANTED"));
        assert_eq!(stats.by_code["SPOOF_DETECTED"], 3);
    }
}
