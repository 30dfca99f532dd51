use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::accounting::AccountingState;

/// Persistence failures: `Io` covers the storage layer, `Parse` a damaged
/// record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt state record: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What `load_into` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A record was read and applied.
    Loaded,
    /// No record yet; in-memory values kept and a fresh record written.
    Missing,
    /// Record unreadable; in-memory values kept, file left in place for
    /// inspection.
    Corrupt,
}

/// On-disk record. The key names are the durability contract with previously
/// persisted state. Every key is optional so an old or partial record still
/// loads, falling back per-field to whatever is already in memory.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateRecord {
    daily_kwh: Option<f64>,
    yesterday_kwh: Option<f64>,
    month_kwh: Option<f64>,
    last_month_kwh: Option<f64>,
    tariff: Option<f64>,
    #[serde(rename = "lastDayNum", skip_serializing_if = "Option::is_none")]
    last_day_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    month_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_month_id: Option<i32>,
    timer_accum_sec: Option<u64>,
}

impl StateRecord {
    fn capture(state: &AccountingState) -> Self {
        Self {
            daily_kwh: Some(state.daily_kwh),
            yesterday_kwh: Some(state.yesterday_kwh),
            month_kwh: Some(state.month_kwh),
            last_month_kwh: Some(state.last_month_kwh),
            tariff: Some(state.tariff),
            last_day_num: state.last_day_num,
            month_id: state.month_id,
            last_month_id: state.last_month_id,
            timer_accum_sec: Some(state.timer_accum_sec),
        }
    }

    fn apply(self, state: &mut AccountingState) {
        if let Some(v) = self.daily_kwh {
            state.daily_kwh = v;
        }
        if let Some(v) = self.yesterday_kwh {
            state.yesterday_kwh = v;
        }
        if let Some(v) = self.month_kwh {
            state.month_kwh = v;
        }
        if let Some(v) = self.last_month_kwh {
            state.last_month_kwh = v;
        }
        if let Some(v) = self.tariff {
            state.tariff = v;
        }
        if let Some(v) = self.last_day_num {
            state.last_day_num = Some(v);
        }
        if let Some(v) = self.month_id {
            state.month_id = Some(v);
        }
        if let Some(v) = self.last_month_id {
            state.last_month_id = Some(v);
        }
        if let Some(v) = self.timer_accum_sec {
            state.timer_accum_sec = v;
        }
    }
}

/// Whole-document JSON store for the accounting state.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the full record and atomically replace the previous one
    /// (write-to-temp, then rename). A crash mid-save leaves the old record
    /// intact.
    pub async fn save(&self, state: &AccountingState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&StateRecord::capture(state))?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load the record into `state`, applying only the keys present.
    ///
    /// A missing file self-heals: the current (default) values are written
    /// out so the record exists from first boot on. A corrupt file is
    /// deliberately NOT rewritten; it stays on disk for diagnosis and the
    /// next periodic save replaces it.
    pub async fn load_into(&self, state: &mut AccountingState) -> Result<LoadOutcome, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state record yet, writing defaults");
                self.save(state).await?;
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<StateRecord>(&bytes) {
            Ok(record) => {
                record.apply(state);
                Ok(LoadOutcome::Loaded)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state record unreadable, keeping in-memory values"
                );
                Ok(LoadOutcome::Corrupt)
            }
        }
    }

    /// Wipe the record and re-establish a default one.
    pub async fn erase(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.save(&AccountingState::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_store(tag: &str) -> Store {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "oem-store-{}-{}-{}.json",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);
        Store::new(path)
    }

    #[tokio::test]
    async fn round_trip_preserves_state() {
        let store = temp_store("roundtrip");
        let state = AccountingState {
            daily_kwh: 1.25,
            yesterday_kwh: 2.5,
            month_kwh: 30.0,
            last_month_kwh: 28.0,
            tariff: 5.5,
            last_day_num: Some(19_876),
            month_id: Some(202_406),
            last_month_id: Some(202_405),
            timer_accum_sec: 321,
        };

        store.save(&state).await.unwrap();
        let mut loaded = AccountingState::default();
        assert_eq!(
            store.load_into(&mut loaded).await.unwrap(),
            LoadOutcome::Loaded
        );
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn missing_record_self_heals_with_defaults() {
        let store = temp_store("missing");
        let mut state = AccountingState::default();

        assert_eq!(
            store.load_into(&mut state).await.unwrap(),
            LoadOutcome::Missing
        );
        assert_eq!(state, AccountingState::default());
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn corrupt_record_is_left_untouched() {
        let store = temp_store("corrupt");
        std::fs::write(store.path(), b"{ not json").unwrap();

        let mut state = AccountingState::default();
        assert_eq!(
            store.load_into(&mut state).await.unwrap(),
            LoadOutcome::Corrupt
        );
        assert_eq!(state, AccountingState::default());
        assert_eq!(std::fs::read(store.path()).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn empty_record_counts_as_corrupt() {
        let store = temp_store("empty");
        std::fs::write(store.path(), b"").unwrap();

        let mut state = AccountingState::default();
        assert_eq!(
            store.load_into(&mut state).await.unwrap(),
            LoadOutcome::Corrupt
        );
    }

    #[tokio::test]
    async fn absent_keys_fall_back_to_memory() {
        let store = temp_store("partial");
        std::fs::write(store.path(), br#"{ "daily_kwh": 3.0 }"#).unwrap();

        let mut state = AccountingState {
            tariff: 7.25,
            ..Default::default()
        };
        assert_eq!(
            store.load_into(&mut state).await.unwrap(),
            LoadOutcome::Loaded
        );
        assert_eq!(state.daily_kwh, 3.0);
        // In-session tariff survives a partial reload.
        assert_eq!(state.tariff, 7.25);
    }

    #[tokio::test]
    async fn record_uses_legacy_key_names() {
        let store = temp_store("keys");
        let state = AccountingState {
            last_day_num: Some(20_000),
            month_id: Some(202_407),
            ..Default::default()
        };
        store.save(&state).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        for key in [
            "daily_kwh",
            "yesterday_kwh",
            "month_kwh",
            "last_month_kwh",
            "tariff",
            "lastDayNum",
            "month_id",
            "timer_accum_sec",
        ] {
            assert!(raw.get(key).is_some(), "missing key {key}");
        }
    }

    #[tokio::test]
    async fn erase_recreates_default_record() {
        let store = temp_store("erase");
        let state = AccountingState {
            daily_kwh: 9.0,
            tariff: 3.0,
            ..Default::default()
        };
        store.save(&state).await.unwrap();

        store.erase().await.unwrap();
        let mut reloaded = AccountingState::default();
        assert_eq!(
            store.load_into(&mut reloaded).await.unwrap(),
            LoadOutcome::Loaded
        );
        assert_eq!(reloaded, AccountingState::default());
    }
}
