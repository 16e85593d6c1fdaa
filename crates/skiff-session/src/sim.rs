//! In-memory transfer engine double.
//!
//! Deterministic stand-in for a real protocol adapter: jobs progress a
//! fixed number of bytes per poll, checkpoints are JSON blobs the engine
//! itself can decode, and every flush request settles on the next poll.
//! Used by the test-suite and by the binary's default wiring.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skiff_engine_core::{
    AuthorRequest, BlockRange, EngineError, EngineEvent, JobDescriptor, JobId, JobSource,
    TransferEngine,
};
use skiff_events::JobState;

/// Bytes transferred per poll while a job is downloading.
const STEP_BYTES: u64 = 4_096;
/// Total payload size assigned once metadata is "fetched".
const TOTAL_BYTES: u64 = 16_384;
/// Simulated peer count while transferring.
const PEER_COUNT: u32 = 3;

/// Decodable checkpoint payload produced and consumed by the simulator.
#[derive(Debug, Serialize, Deserialize)]
struct SimCheckpoint {
    id: JobId,
    name: String,
    save_path: PathBuf,
    bytes_done: u64,
    bytes_total: u64,
}

#[derive(Debug, Clone)]
struct SimJob {
    name: String,
    save_path: PathBuf,
    state: JobState,
    bytes_done: u64,
    bytes_total: u64,
    modified: bool,
}

/// Simulated in-memory transfer engine.
#[derive(Debug, Default)]
pub struct SimEngine {
    jobs: HashMap<JobId, SimJob>,
    pending: Vec<EngineEvent>,
    filter: Vec<BlockRange>,
    auto_advance: bool,
    submissions: Vec<JobDescriptor>,
}

impl SimEngine {
    /// An engine whose jobs progress on every poll.
    #[must_use]
    pub fn new() -> Self {
        Self {
            auto_advance: true,
            ..Self::default()
        }
    }

    /// An engine that only emits what the test scripts into it.
    #[must_use]
    pub fn manual() -> Self {
        Self::default()
    }

    /// Queue an arbitrary event for the next poll.
    pub fn script_event(&mut self, event: EngineEvent) {
        self.pending.push(event);
    }

    /// Descriptors received so far, in submission order.
    #[must_use]
    pub fn submissions(&self) -> &[JobDescriptor] {
        &self.submissions
    }

    fn resolve(&self, descriptor: &JobDescriptor) -> Result<(JobId, SimJob)> {
        match &descriptor.source {
            JobSource::Magnet { uri } => {
                let id = magnet_id(uri).context("magnet URI carries no decodable content hash")?;
                let name = descriptor
                    .name_hint
                    .clone()
                    .unwrap_or_else(|| id.to_string());
                Ok((
                    id,
                    SimJob {
                        name,
                        save_path: descriptor.save_path.clone(),
                        state: JobState::Submitted,
                        bytes_done: 0,
                        bytes_total: 0,
                        modified: false,
                    },
                ))
            }
            JobSource::MetainfoFile { path } => {
                let id = path_id(path);
                let name = descriptor.name_hint.clone().unwrap_or_else(|| {
                    path.file_stem()
                        .map_or_else(|| id.to_string(), |stem| stem.to_string_lossy().into_owned())
                });
                Ok((
                    id,
                    SimJob {
                        name,
                        save_path: descriptor.save_path.clone(),
                        state: JobState::Submitted,
                        bytes_done: 0,
                        bytes_total: TOTAL_BYTES,
                        modified: false,
                    },
                ))
            }
            JobSource::Checkpoint { payload } => {
                let checkpoint: SimCheckpoint =
                    serde_json::from_slice(payload).context("undecodable checkpoint payload")?;
                Ok((
                    checkpoint.id,
                    SimJob {
                        name: checkpoint.name,
                        save_path: checkpoint.save_path,
                        state: JobState::CheckingResume,
                        bytes_done: checkpoint.bytes_done,
                        bytes_total: checkpoint.bytes_total,
                        modified: false,
                    },
                ))
            }
        }
    }

    fn checkpoint_payload(id: JobId, job: &SimJob) -> Vec<u8> {
        serde_json::to_vec(&SimCheckpoint {
            id,
            name: job.name.clone(),
            save_path: job.save_path.clone(),
            bytes_done: job.bytes_done,
            bytes_total: job.bytes_total,
        })
        .unwrap_or_default()
    }

    fn advance_jobs(&mut self) {
        let ids: Vec<JobId> = self.jobs.keys().copied().collect();
        for id in ids {
            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            let next = match &job.state {
                JobState::Submitted => Some(JobState::DownloadingMetadata),
                JobState::CheckingResume | JobState::DownloadingMetadata => {
                    if job.bytes_total == 0 {
                        job.bytes_total = TOTAL_BYTES;
                    }
                    Some(JobState::Downloading)
                }
                JobState::Downloading => {
                    job.bytes_done = (job.bytes_done + STEP_BYTES).min(job.bytes_total);
                    job.modified = true;
                    if job.bytes_done == job.bytes_total {
                        Some(JobState::Seeding)
                    } else {
                        None
                    }
                }
                JobState::Seeding | JobState::Finished | JobState::Errored { .. } => continue,
            };

            let finished = matches!(next, Some(JobState::Seeding));
            if let Some(state) = next {
                job.state = state;
            }
            let job = self.jobs[&id].clone();
            self.pending.push(EngineEvent::Status {
                id,
                state: job.state.clone(),
                bytes_done: job.bytes_done,
                bytes_total: job.bytes_total,
                download_bps: STEP_BYTES * 5,
                peer_count: PEER_COUNT,
            });
            if finished {
                self.pending.push(EngineEvent::Finished { id });
            }
        }
    }
}

#[async_trait]
impl TransferEngine for SimEngine {
    async fn submit_job(&mut self, descriptor: JobDescriptor) -> Result<JobId> {
        let (id, job) = self.resolve(&descriptor)?;
        self.submissions.push(descriptor);
        if self.jobs.contains_key(&id) {
            // Duplicate admission of a known identity is a no-op.
            return Ok(id);
        }
        self.pending.push(EngineEvent::JobAdded {
            id,
            name: job.name.clone(),
            save_path: job.save_path.clone(),
        });
        self.jobs.insert(id, job);
        Ok(id)
    }

    async fn remove_job(&mut self, id: JobId) -> Result<()> {
        if self.jobs.remove(&id).is_none() {
            return Err(EngineError::NotFound { job_id: id }.into());
        }
        self.pending.push(EngineEvent::JobRemoved { id });
        Ok(())
    }

    async fn poll_events(&mut self) -> Result<Vec<EngineEvent>> {
        if self.auto_advance {
            self.advance_jobs();
        }
        Ok(std::mem::take(&mut self.pending))
    }

    async fn request_flush(&mut self, id: JobId, only_if_modified: bool) -> Result<()> {
        match self.jobs.get_mut(&id) {
            None => self.pending.push(EngineEvent::FlushFailed {
                id,
                message: "unknown job".to_string(),
            }),
            Some(job) if only_if_modified && !job.modified => {
                self.pending.push(EngineEvent::FlushFailed {
                    id,
                    message: "resume data unchanged".to_string(),
                });
            }
            Some(job) => {
                job.modified = false;
                let payload = Self::checkpoint_payload(id, job);
                self.pending.push(EngineEvent::FlushDone { id, payload });
            }
        }
        Ok(())
    }

    async fn export_session_state(&mut self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.filter).context("session state serialization failed")
    }

    async fn import_session_state(&mut self, blob: &[u8]) -> Result<()> {
        self.filter = serde_json::from_slice(blob).context("session state deserialization failed")?;
        Ok(())
    }

    async fn set_block_filter(&mut self, ranges: Vec<BlockRange>) -> Result<()> {
        self.filter = ranges;
        Ok(())
    }

    async fn block_filter(&mut self) -> Result<Vec<BlockRange>> {
        Ok(self.filter.clone())
    }

    async fn author_descriptor(&mut self, request: AuthorRequest) -> Result<Vec<u8>> {
        serde_json::to_vec(&request).context("author request serialization failed")
    }
}

/// Extract the content hash from a magnet URI.
fn magnet_id(uri: &str) -> Option<JobId> {
    let start = uri.find("urn:btih:")? + "urn:btih:".len();
    let rest = &uri[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    rest[..end].to_ascii_lowercase().parse().ok()
}

/// Deterministic pseudo content hash for metainfo file sources.
fn path_id(path: &std::path::Path) -> JobId {
    let mut bytes = [0x5a_u8; 20];
    for (index, byte) in path.as_os_str().as_encoded_bytes().iter().enumerate() {
        let slot = index % 20;
        bytes[slot] = bytes[slot]
            .rotate_left(3)
            .wrapping_add(*byte)
            .wrapping_mul(31);
    }
    JobId::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    fn magnet_descriptor() -> JobDescriptor {
        JobDescriptor {
            source: JobSource::magnet(format!("magnet:?xt=urn:btih:{HASH_HEX}&dn=demo")),
            save_path: PathBuf::from("."),
            name_hint: Some("demo".to_string()),
        }
    }

    #[tokio::test]
    async fn magnet_job_walks_through_the_lifecycle() -> Result<()> {
        let mut engine = SimEngine::new();
        let id = engine.submit_job(magnet_descriptor()).await?;
        assert_eq!(id.to_string(), HASH_HEX);

        let added = engine.poll_events().await?;
        assert!(matches!(added.first(), Some(EngineEvent::JobAdded { .. })));

        // Submitted -> DownloadingMetadata -> Downloading -> ... -> Finished.
        let mut finished = false;
        for _ in 0..8 {
            for event in engine.poll_events().await? {
                if matches!(event, EngineEvent::Finished { .. }) {
                    finished = true;
                }
            }
        }
        assert!(finished, "simulated job should finish within a few polls");
        Ok(())
    }

    #[tokio::test]
    async fn flush_round_trips_through_checkpoint_source() -> Result<()> {
        let mut engine = SimEngine::new();
        let id = engine.submit_job(magnet_descriptor()).await?;

        // Progress a little, then flush.
        let _ = engine.poll_events().await?;
        let _ = engine.poll_events().await?;
        let _ = engine.poll_events().await?;
        engine.request_flush(id, true).await?;

        let payload = engine
            .poll_events()
            .await?
            .into_iter()
            .find_map(|event| match event {
                EngineEvent::FlushDone { payload, .. } => Some(payload),
                _ => None,
            })
            .expect("flush settles with resume data");

        // A fresh engine admitted from the checkpoint restores the counters.
        let mut restarted = SimEngine::manual();
        let resumed = restarted
            .submit_job(JobDescriptor {
                source: JobSource::checkpoint(payload),
                save_path: PathBuf::from("."),
                name_hint: None,
            })
            .await?;
        assert_eq!(resumed, id);
        let job = &restarted.jobs[&resumed];
        assert!(job.bytes_done > 0, "restored byte counts, not zero");
        assert_eq!(job.state, JobState::CheckingResume);
        Ok(())
    }

    #[tokio::test]
    async fn unmodified_flush_settles_as_failed() -> Result<()> {
        let mut engine = SimEngine::manual();
        let id = engine.submit_job(magnet_descriptor()).await?;
        let _ = engine.poll_events().await?;

        engine.request_flush(id, true).await?;
        let events = engine.poll_events().await?;
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::FlushFailed { .. }]
        ));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_submit_is_idempotent() -> Result<()> {
        let mut engine = SimEngine::manual();
        let first = engine.submit_job(magnet_descriptor()).await?;
        let _ = engine.poll_events().await?;

        let second = engine.submit_job(magnet_descriptor()).await?;
        assert_eq!(first, second);
        assert!(
            engine.poll_events().await?.is_empty(),
            "no second admission event"
        );
        Ok(())
    }

    #[tokio::test]
    async fn session_state_round_trips_block_filter() -> Result<()> {
        let mut engine = SimEngine::manual();
        let range: BlockRange = "10.0.0.1-10.0.0.9".parse().expect("range parses");
        engine.set_block_filter(vec![range]).await?;

        let blob = engine.export_session_state().await?;
        let mut restarted = SimEngine::manual();
        restarted.import_session_state(&blob).await?;
        assert_eq!(restarted.block_filter().await?, vec![range]);
        Ok(())
    }
}
