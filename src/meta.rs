use std::time::SystemTime;

use uuid::Uuid;

use crate::EmissionId;

/// Metadata attached to every emission.
///
/// - `id`: unique identifier of the emission, shared by all subscribers it reaches.
/// - `timestamp`: creation time in nanoseconds since Unix epoch (truncated to `u64`).
///
/// Handlers can use the id to correlate the work they do for one emission,
/// e.g. across an entry callback and its success continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    id: EmissionId,
    timestamp: u64,
}

impl Meta {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4().as_u128(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default(),
        }
    }

    /// Unique identifier for this emission.
    pub fn id(&self) -> EmissionId {
        self.id
    }

    /// Timestamp in nanoseconds since Unix epoch (u64 truncation).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
