// 9.2 epochs.rs: epoch scheduler capability. the scheduler owns the cadence,
// the engine only reads epoch metadata and gets called back through EpochHooks.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub identifier: String,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub current_epoch: u64,
}

impl EpochInfo {
    pub fn new(identifier: impl Into<String>, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            duration,
            current_epoch: 0,
        }
    }
}

pub trait EpochKeeper {
    fn get_epoch_info(&self, identifier: &str) -> Option<EpochInfo>;
}

/// Callbacks the scheduler fires around each epoch boundary.
pub trait EpochHooks {
    fn before_epoch_start(&mut self, identifier: &str, epoch_number: u64);

    fn after_epoch_end(&mut self, identifier: &str, epoch_number: u64);
}

#[derive(Debug, Clone, Default)]
pub struct StaticEpochs {
    epochs: BTreeMap<String, EpochInfo>,
}

impl StaticEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epoch(mut self, info: EpochInfo) -> Self {
        self.epochs.insert(info.identifier.clone(), info);
        self
    }
}

impl EpochKeeper for StaticEpochs {
    fn get_epoch_info(&self, identifier: &str) -> Option<EpochInfo> {
        self.epochs.get(identifier).cloned()
    }
}

mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        i64::deserialize(d).map(Duration::milliseconds)
    }
}
