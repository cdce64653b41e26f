//! Versioned binary snapshots of a production plan.
//!
//! A snapshot is the plan plus the stream registry it refers to, encoded with
//! `bitcode` behind a header carrying a magic number and format version.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::plan::ProductionPlan;
use crate::stream::StreamHandler;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a production plan snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x9C0E_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Wall-clock time the snapshot was written.
    pub created_at: Timestamp,
}

impl SnapshotHeader {
    pub fn new() -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub header: SnapshotHeader,
    pub plan: ProductionPlan,
    pub streams: StreamHandler,
}

impl PlanSnapshot {
    pub fn new(plan: ProductionPlan, streams: StreamHandler) -> Self {
        Self {
            header: SnapshotHeader::new(),
            plan,
            streams,
        }
    }
}

pub fn write_plan_snapshot(snapshot: &PlanSnapshot) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot and check its header.
pub fn read_plan_snapshot(data: &[u8]) -> Result<PlanSnapshot, DeserializeError> {
    let snapshot: PlanSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ProcessStateData;
    use crate::test_utils::*;

    fn snapshot() -> PlanSnapshot {
        let mut plan = ProductionPlan::new();
        plan.add_process_state_data(
            "mill",
            ProcessStateData::new("Output", ts("2024-01-01 11:20:00"), ts("2024-01-01 12:00:00")),
        );
        let mut streams = StreamHandler::new();
        streams
            .add_stream(make_continuous_stream("gas", "well", "mill", ore(), 10.0, 50.0))
            .unwrap();
        PlanSnapshot::new(plan, streams)
    }

    #[test]
    fn snapshot_restores_plan_and_streams() {
        let original = snapshot();
        let bytes = write_plan_snapshot(&original).unwrap();
        let restored = read_plan_snapshot(&bytes).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bad = snapshot();
        bad.header.magic = 0xDEAD_BEEF;
        let bytes = write_plan_snapshot(&bad).unwrap();
        assert!(matches!(
            read_plan_snapshot(&bytes),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bad = snapshot();
        bad.header.version = FORMAT_VERSION + 1;
        let bytes = write_plan_snapshot(&bad).unwrap();
        assert!(matches!(
            read_plan_snapshot(&bytes),
            Err(DeserializeError::FutureVersion(_))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            read_plan_snapshot(&[1, 2, 3]),
            Err(DeserializeError::Decode(_))
        ));
    }
}
