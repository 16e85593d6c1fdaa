//! Core transfer domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use skiff_events::{JobState, JobView};

use crate::error::{BlockRangeError, JobIdError};

/// Stable content identity for a transfer job.
///
/// Twenty bytes of engine-assigned content hash; rendered as lowercase hex.
/// Used as the registry key and as the checkpoint file key, so it must be
/// collision-resistant across jobs (a display name is not).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId([u8; 20]);

impl JobId {
    /// Wrap a raw twenty-byte content hash.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "JobId({self})")
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.len() != 40 {
            return Err(JobIdError::Length { len: input.len() });
        }
        let mut bytes = [0_u8; 20];
        for (index, chunk) in input.as_bytes().chunks_exact(2).enumerate() {
            let high = hex_value(chunk[0]).ok_or(JobIdError::InvalidChar { index: index * 2 })?;
            let low = hex_value(chunk[1]).ok_or(JobIdError::InvalidChar {
                index: index * 2 + 1,
            })?;
            bytes[index] = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Source describing how a job should be admitted to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobSource {
    /// A magnet URI to resolve and fetch.
    Magnet {
        /// Full magnet URI.
        uri: String,
    },
    /// A metainfo file on disk the engine reads itself.
    MetainfoFile {
        /// Path to the metainfo file.
        path: PathBuf,
    },
    /// A previously persisted checkpoint blob; supersedes a freshly parsed
    /// descriptor for the same content identity.
    Checkpoint {
        /// Raw engine-format resume payload.
        payload: Vec<u8>,
    },
}

impl JobSource {
    /// Convenience constructor for magnet sources.
    #[must_use]
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet { uri: uri.into() }
    }

    /// Convenience constructor for metainfo file sources.
    #[must_use]
    pub fn metainfo_file(path: impl Into<PathBuf>) -> Self {
        Self::MetainfoFile { path: path.into() }
    }

    /// Convenience constructor for checkpoint resume sources.
    #[must_use]
    pub fn checkpoint(payload: impl Into<Vec<u8>>) -> Self {
        Self::Checkpoint {
            payload: payload.into(),
        }
    }
}

/// Request payload for admitting a job into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// How the job content is located.
    pub source: JobSource,
    /// Directory the payload is written to.
    pub save_path: PathBuf,
    /// Friendly name to display before metadata is known.
    pub name_hint: Option<String>,
}

/// Registry entry for one active or recently-active job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Stable content identity.
    pub id: JobId,
    /// Display name.
    pub name: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Bytes transferred so far.
    pub bytes_done: u64,
    /// Total wanted bytes (zero until metadata is known).
    pub bytes_total: u64,
    /// Directory the payload is written to.
    pub save_path: PathBuf,
    /// Connected peer count.
    pub peer_count: u32,
    /// Current download rate in bytes per second.
    pub download_bps: u64,
    /// Timestamp when the job entered the registry.
    pub added_at: DateTime<Utc>,
    /// Timestamp of the last observed update.
    pub last_updated: DateTime<Utc>,
}

impl JobSnapshot {
    /// A blank entry in the `Submitted` state.
    #[must_use]
    pub fn submitted(id: JobId, name: impl Into<String>, save_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            state: JobState::Submitted,
            bytes_done: 0,
            bytes_total: 0,
            save_path,
            peer_count: 0,
            download_bps: 0,
            added_at: now,
            last_updated: now,
        }
    }

    /// Completion percentage in the 0-100 range.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (to_f64(self.bytes_done) / to_f64(self.bytes_total)) * 100.0
        }
    }

    /// Map into the immutable row handed to the presentation layer.
    #[must_use]
    pub fn to_view(&self) -> JobView {
        JobView {
            id: self.id.to_string(),
            name: self.name.clone(),
            state: self.state.clone(),
            bytes_done: self.bytes_done,
            bytes_total: self.bytes_total,
            save_path: self.save_path.display().to_string(),
            peer_count: self.peer_count,
            download_bps: self.download_bps,
        }
    }
}

const fn to_f64(value: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "u64 to f64 conversion is required for user-facing percentage reporting"
    )]
    {
        value as f64
    }
}

/// Events emitted by the engine and polled by the coordinator each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine confirmed a job admission.
    JobAdded {
        /// Job identifier.
        id: JobId,
        /// Display name known at admission time.
        name: String,
        /// Effective save directory.
        save_path: PathBuf,
    },
    /// The engine completed a job removal.
    JobRemoved {
        /// Job identifier.
        id: JobId,
    },
    /// Progress / status counters changed.
    Status {
        /// Job identifier.
        id: JobId,
        /// Updated lifecycle state.
        state: JobState,
        /// Bytes transferred so far.
        bytes_done: u64,
        /// Total wanted bytes.
        bytes_total: u64,
        /// Current download rate in bytes per second.
        download_bps: u64,
        /// Connected peer count.
        peer_count: u32,
    },
    /// All wanted bytes are present.
    Finished {
        /// Job identifier.
        id: JobId,
    },
    /// The engine reported a job-level error condition.
    JobError {
        /// Job identifier.
        id: JobId,
        /// Human-readable failure description.
        message: String,
    },
    /// A requested checkpoint flush produced resume data.
    FlushDone {
        /// Job identifier.
        id: JobId,
        /// Raw engine-format resume payload.
        payload: Vec<u8>,
    },
    /// A requested checkpoint flush conclusively failed (including the
    /// "nothing modified since the last flush" answer).
    FlushFailed {
        /// Job identifier.
        id: JobId,
        /// Failure description.
        message: String,
    },
}

/// Inclusive address range held in the engine's block filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    /// First blocked address.
    pub start: IpAddr,
    /// Last blocked address.
    pub end: IpAddr,
}

impl BlockRange {
    /// A range covering a single address.
    #[must_use]
    pub const fn single(addr: IpAddr) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }
}

impl Display for BlockRange {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(formatter, "{}", self.start)
        } else {
            write!(formatter, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for BlockRange {
    type Err = BlockRangeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(BlockRangeError::Empty);
        }

        let (start_text, end_text) = match trimmed.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (trimmed, trimmed),
        };

        let start: IpAddr = start_text
            .parse()
            .map_err(|_| BlockRangeError::InvalidAddress {
                value: start_text.to_string(),
            })?;
        let end: IpAddr = end_text
            .parse()
            .map_err(|_| BlockRangeError::InvalidAddress {
                value: end_text.to_string(),
            })?;

        if start.is_ipv4() != end.is_ipv4() {
            return Err(BlockRangeError::MixedFamilies);
        }
        if start > end {
            return Err(BlockRangeError::Inverted);
        }
        Ok(Self { start, end })
    }
}

/// Individual file included in an authored descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorFile {
    /// Path relative to the shared folder root.
    pub path: String,
    /// Total file size in bytes.
    pub size_bytes: u64,
}

/// Request payload for authoring a shareable descriptor from a folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRequest {
    /// Descriptor display name (the folder name).
    pub name: String,
    /// Optional announce URL.
    pub tracker: Option<String>,
    /// Sorted file listing gathered from the folder.
    pub files: Vec<AuthorFile>,
}
