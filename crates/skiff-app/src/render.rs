//! Console presenter.
//!
//! Subscribes to the event bus on its own task and renders published
//! snapshots as carriage-return status lines, one per job. This is the
//! whole presentation layer of the headless binary; it never touches
//! coordinator state directly.

use std::io::{self, Write};

use skiff_events::{Event, EventBus, JobState, JobView};
use tokio::task::JoinHandle;

/// Spawn the console presenter task.
#[must_use]
pub fn spawn_console(events: &EventBus) -> JoinHandle<()> {
    let mut stream = events.subscribe(None);
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            match envelope.event {
                Event::Snapshot { jobs } => render_jobs(&jobs),
                Event::Blocklist { ranges } => {
                    println!("\nblocked ranges: [{}]", ranges.join(", "));
                }
                Event::Error { message } => eprintln!("\nerror: {message}"),
            }
        }
    })
}

fn render_jobs(jobs: &[JobView]) {
    let mut out = io::stdout().lock();
    for job in jobs {
        let _ = write!(out, "\r{}\x1b[K", format_job(job));
    }
    let _ = out.flush();
}

/// One status line per job, in the classic console-client shape.
fn format_job(job: &JobView) -> String {
    format!(
        "{}: {} {} kB/s {} kB ({}%) downloaded ({} peers)",
        job.name,
        state_label(&job.state),
        job.download_bps / 1_000,
        job.bytes_done / 1_000,
        percent(job.bytes_done, job.bytes_total),
        job.peer_count,
    )
}

const fn percent(done: u64, total: u64) -> u64 {
    if total == 0 { 0 } else { done * 100 / total }
}

const fn state_label(state: &JobState) -> &'static str {
    match state {
        JobState::Submitted => "submitted",
        JobState::CheckingResume => "checking resume data",
        JobState::DownloadingMetadata => "fetching metadata",
        JobState::Downloading => "downloading",
        JobState::Seeding => "seeding",
        JobState::Finished => "finished",
        JobState::Errored { .. } => "errored",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(state: JobState, done: u64, total: u64) -> JobView {
        JobView {
            id: "0123456789abcdef0123456789abcdef01234567".to_string(),
            name: "demo".to_string(),
            state,
            bytes_done: done,
            bytes_total: total,
            save_path: ".".to_string(),
            peer_count: 4,
            download_bps: 2_000,
        }
    }

    #[test]
    fn status_line_matches_console_shape() {
        let line = format_job(&view(JobState::Downloading, 50_000, 100_000));
        assert_eq!(line, "demo: downloading 2 kB/s 50 kB (50%) downloaded (4 peers)");
    }

    #[test]
    fn zero_total_renders_zero_percent() {
        let line = format_job(&view(JobState::DownloadingMetadata, 0, 0));
        assert!(line.contains("(0%)"));
        assert!(line.contains("fetching metadata"));
    }

    #[test]
    fn every_state_has_a_label() {
        for state in [
            JobState::Submitted,
            JobState::CheckingResume,
            JobState::DownloadingMetadata,
            JobState::Downloading,
            JobState::Seeding,
            JobState::Finished,
            JobState::Errored {
                message: "x".to_string(),
            },
        ] {
            assert!(!state_label(&state).is_empty());
        }
    }
}
