//! Simulated upload transfer.
//!
//! Nothing is transmitted: each accepted file gets its own task that advances a percentage
//! on a fixed tick until it reaches 100. Increments come from an injectable source so tests
//! can drive progress deterministically under paused Tokio time.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::domain::{FileCandidate, FileId, SlotId};
use super::requirements::SlotRequirement;

pub const DEFAULT_UPLOAD_TICK: Duration = Duration::from_millis(200);
const MAX_RANDOM_INCREMENT: f64 = 30.0;

/// Why a dropped file was not accepted for a slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("uploads are only accepted on the document upload step")]
    NotOnUploadStep,
    #[error("select a document type before uploading files")]
    NoDocumentType,
    #[error("document slot '{slot}' is not part of this application")]
    UnknownSlot { slot: SlotId },
    #[error("Invalid file format. Accepted formats: {}", format_list(.allowed))]
    InvalidFormat { extension: String, allowed: Vec<String> },
    #[error("File too large. Maximum size: {max_size}")]
    FileTooLarge { size: u64, max_size: String },
    #[error("the application has already been submitted")]
    AlreadySubmitted,
}

fn format_list(formats: &[String]) -> String {
    formats.join(", ")
}

impl UploadRejection {
    pub(crate) fn invalid_format(extension: String, requirement: &SlotRequirement) -> Self {
        Self::InvalidFormat {
            extension,
            allowed: requirement
                .formats
                .iter()
                .map(|format| format.to_string())
                .collect(),
        }
    }
}

/// A file that passed slot checks and is now transferring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub file_id: FileId,
    pub slot: SlotId,
    pub candidate: FileCandidate,
}

/// Progress snapshot of one in-flight upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_id: FileId,
    pub slot: SlotId,
    pub name: String,
    pub percent: u8,
}

/// Source of per-tick percentage increments.
pub trait ProgressIncrements: Send {
    fn next_increment(&mut self) -> f64;
}

/// Uniform increments in `[0, 30)`, like the portal's progress bar.
#[derive(Debug)]
pub struct RandomIncrements {
    rng: StdRng,
}

impl RandomIncrements {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ProgressIncrements for RandomIncrements {
    fn next_increment(&mut self) -> f64 {
        self.rng.gen_range(0.0..MAX_RANDOM_INCREMENT)
    }
}

/// Same increment every tick; at least one percent so the transfer always ends.
#[derive(Debug, Clone, Copy)]
pub struct FixedIncrements(f64);

impl FixedIncrements {
    pub fn new(step: f64) -> Self {
        Self(if step.is_finite() { step.max(1.0) } else { 1.0 })
    }
}

impl ProgressIncrements for FixedIncrements {
    fn next_increment(&mut self) -> f64 {
        self.0
    }
}

/// Replays scripted increments, then falls back to completing in one step.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIncrements(VecDeque<f64>);

impl ScriptedIncrements {
    pub fn new(steps: impl IntoIterator<Item = f64>) -> Self {
        Self(steps.into_iter().collect())
    }
}

impl ProgressIncrements for ScriptedIncrements {
    fn next_increment(&mut self) -> f64 {
        self.0.pop_front().unwrap_or(100.0)
    }
}

/// Drives one simulated transfer, reporting progress through a callback.
#[derive(Debug, Clone, Copy)]
pub struct UploadSimulator {
    tick: Duration,
}

impl Default for UploadSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_TICK)
    }
}

impl UploadSimulator {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Resolves once the transfer reaches 100 %. Intermediate reports never exceed 99 and
    /// never decrease; the final report is always 100.
    pub async fn run<I, F>(&self, mut increments: I, mut on_progress: F)
    where
        I: ProgressIncrements,
        F: FnMut(u8),
    {
        let mut progress = 0.0_f64;
        let mut reported = 0_u8;

        loop {
            tokio::time::sleep(self.tick).await;
            progress += increments.next_increment().max(0.0);

            if progress >= 100.0 {
                on_progress(100);
                return;
            }

            let percent = (progress.round() as u8).min(99).max(reported);
            reported = percent;
            on_progress(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_increments_complete_after_expected_ticks() {
        let simulator = UploadSimulator::new(Duration::from_millis(200));
        let started = tokio::time::Instant::now();
        let mut reports = Vec::new();

        simulator
            .run(FixedIncrements::new(25.0), |percent| reports.push(percent))
            .await;

        assert_eq!(reports, vec![25, 50, 75, 100]);
        assert_eq!(started.elapsed(), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn random_progress_is_monotonic_and_ends_at_100() {
        let simulator = UploadSimulator::default();
        let mut reports = Vec::new();

        simulator
            .run(RandomIncrements::seeded(7), |percent| reports.push(percent))
            .await;

        assert_eq!(reports.last(), Some(&100));
        assert!(reports.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(reports[..reports.len() - 1].iter().all(|p| *p <= 99));
    }

    #[tokio::test(start_paused = true)]
    async fn near_complete_rounding_is_capped_below_100() {
        let simulator = UploadSimulator::new(Duration::from_millis(10));
        let mut reports = Vec::new();

        simulator
            .run(ScriptedIncrements::new([99.7, 0.2, 0.5]), |percent| {
                reports.push(percent)
            })
            .await;

        assert_eq!(reports, vec![99, 99, 100]);
    }
}
