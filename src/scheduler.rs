//! Acquisition scheduler: settle polling followed by the multi-shot loop.
//!
//! Consumer webcams often deliver black or garbage frames right after the
//! stream starts. Phase one polls the session, sleeping the settle delay
//! before each check, until it reports a running pipeline with a non-empty
//! frame or [`SETTLE_POLL_LIMIT`] polls have passed. Phase two takes the
//! shots, one after another, sleeping the inter-shot delay after every shot
//! including the last.
//!
//! Neither phase aborts the run. An unconfirmed settle and failed shots are
//! logged and recorded in the returned [`AcquisitionReport`].

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::CaptureConfig;
use crate::encode::FrameSink;
use crate::filename::FilenamePolicy;
use crate::session::CaptureSession;
use crate::traits::{CaptureDevice, CapturedFrame};

/// Maximum number of settle polls before giving up and capturing anyway.
pub const SETTLE_POLL_LIMIT: u32 = 25;

/// Outcome of the settle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// A running pipeline delivered a frame after this many polls.
    Confirmed {
        /// Number of polls taken, at least one.
        polls: u32,
    },
    /// No good frame was seen within [`SETTLE_POLL_LIMIT`] polls.
    Degraded,
}

/// Outcome of one shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotOutcome {
    /// The frame was written to `path`.
    Saved {
        /// Shot number.
        shot_index: u32,
        /// Written file.
        path: PathBuf,
    },
    /// The session had no frame to give.
    NoFrame {
        /// Shot number.
        shot_index: u32,
    },
    /// Encoding or writing the frame failed.
    SaveFailed {
        /// Shot number.
        shot_index: u32,
        /// Path that could not be written.
        path: PathBuf,
        /// Error description.
        reason: String,
    },
}

impl ShotOutcome {
    /// Whether the shot produced a file.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Result of a complete acquisition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Settle phase outcome.
    pub settle: Settle,
    /// One entry per shot, in order.
    pub shots: Vec<ShotOutcome>,
}

impl AcquisitionReport {
    /// Paths of the files written, in shot order.
    pub fn saved_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.shots.iter().filter_map(|shot| match shot {
            ShotOutcome::Saved { path, .. } => Some(path),
            _ => None,
        })
    }

    /// Number of shots that produced a file.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.shots.iter().filter(|shot| shot.is_saved()).count()
    }
}

/// Drives one acquisition over an open session.
pub struct Acquisition<'a, C: Clock, S: FrameSink> {
    config: &'a CaptureConfig,
    clock: &'a C,
    sink: &'a S,
    filenames: FilenamePolicy,
}

impl<'a, C: Clock, S: FrameSink> Acquisition<'a, C, S> {
    /// Prepare an acquisition with the given timing, clock and sink.
    pub fn new(config: &'a CaptureConfig, clock: &'a C, sink: &'a S) -> Self {
        Self {
            config,
            clock,
            sink,
            filenames: FilenamePolicy::new(config),
        }
    }

    /// Run both phases against `session`.
    pub fn run<D: CaptureDevice>(&self, session: &CaptureSession<D>) -> AcquisitionReport {
        info!("waiting [{}]", self.config);
        let settle = self.settle(session);
        let shots = (0..self.config.plan.shot_count())
            .map(|shot_index| {
                let outcome = self.shoot(session, shot_index);
                self.clock.sleep(self.config.plan.inter_shot_delay());
                outcome
            })
            .collect();

        AcquisitionReport { settle, shots }
    }

    /// Phase one: poll until the pipeline delivers a frame.
    pub fn settle<D: CaptureDevice>(&self, session: &CaptureSession<D>) -> Settle {
        for poll in 1..=SETTLE_POLL_LIMIT {
            self.clock.sleep(self.config.plan.settle_delay());
            let ready = session.is_running()
                && session
                    .current_frame()
                    .is_some_and(|frame| !frame.is_empty());
            if ready {
                debug!(polls = poll, "capture pipeline settled");
                return Settle::Confirmed { polls: poll };
            }
            debug!(poll, "no frame yet");
        }

        warn!(
            polls = SETTLE_POLL_LIMIT,
            "capture degraded: no frame confirmed, increase the settle delay"
        );
        Settle::Degraded
    }

    /// Phase two, one iteration: take and save a single shot.
    fn shoot<D: CaptureDevice>(&self, session: &CaptureSession<D>, shot_index: u32) -> ShotOutcome {
        let Some(frame) = session.current_frame() else {
            warn!(shot = shot_index, "capture failed: no frame available");
            return ShotOutcome::NoFrame { shot_index };
        };

        let captured = CapturedFrame {
            frame,
            shot_index,
            captured_at: self.clock.now(),
        };
        let path = self.filenames.derive(captured.captured_at);

        match self.sink.save(&captured, &path, self.config.plan.format()) {
            Ok(()) => {
                info!("  {}", path.display());
                ShotOutcome::Saved { shot_index, path }
            }
            Err(err) => {
                warn!(shot = shot_index, path = %path.display(), "capture failed: {err}");
                ShotOutcome::SaveFailed {
                    shot_index,
                    path,
                    reason: err.to_string(),
                }
            }
        }
    }
}
