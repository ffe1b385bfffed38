//! Sustained-press gesture for Turnroom.
//!
//! A turn is advanced by holding a control down for a fixed duration
//! (900 ms by default). [`HoldGesture`] models that gesture as an explicit
//! state machine driven by a tokio deadline, independent of any rendering
//! cadence:
//!
//! ```text
//! Idle ──press──▶ Holding ──deadline──▶ Committing ──finish_commit──▶ Idle
//!                    │
//!                    └──release──▶ Idle
//! ```
//!
//! # Integration
//!
//! The gesture is designed to sit inside a session's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         event = subscription.next() => { /* apply feed event */ }
//!         _ = gesture.wait_for_completion() => {
//!             commit_next_turn().await;
//!             gesture.finish_commit();
//!         }
//!     }
//! }
//! ```
//!
//! While idle, [`HoldGesture::wait_for_completion`] pends forever so the
//! other branches keep running.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`HoldGesture`].
#[derive(Debug, Clone)]
pub struct HoldConfig {
    /// How long the control must stay pressed before the gesture
    /// completes. Default: 900 ms.
    pub duration: Duration,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            duration: Self::DEFAULT_DURATION,
        }
    }
}

impl HoldConfig {
    pub const DEFAULT_DURATION: Duration = Duration::from_millis(900);
    /// Shorter holds are indistinguishable from taps.
    pub const MIN_DURATION: Duration = Duration::from_millis(50);
    pub const MAX_DURATION: Duration = Duration::from_secs(10);

    pub fn with_duration(duration: Duration) -> Self {
        Self { duration }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`HoldGesture::new`].
    pub fn validated(mut self) -> Self {
        let clamped = self.duration.clamp(Self::MIN_DURATION, Self::MAX_DURATION);
        if clamped != self.duration {
            warn!(
                requested_ms = self.duration.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "hold duration out of range, clamping"
            );
            self.duration = clamped;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the gesture currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPhase {
    /// Nothing pressed. Progress is 0.
    Idle,
    /// Pressed since `started`; completes at `started + duration`.
    Holding { started: Instant },
    /// The hold completed and the caller is committing its effect.
    /// Further presses are ignored until [`HoldGesture::finish_commit`].
    Committing,
}

/// Returned by [`HoldGesture::wait_for_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldCompleted {
    /// 1-based count of completed gestures on this instance.
    pub sequence: u64,
    /// How long the control was held.
    pub held: Duration,
}

// ---------------------------------------------------------------------------
// Gesture
// ---------------------------------------------------------------------------

/// Timer-based sustained-press state machine.
///
/// Completion fires at most once per press: after it fires the gesture
/// sits in [`HoldPhase::Committing`] until the caller finishes.
#[derive(Debug)]
pub struct HoldGesture {
    config: HoldConfig,
    phase: HoldPhase,
    completions: u64,
}

impl HoldGesture {
    pub fn new(config: HoldConfig) -> Self {
        let config = config.validated();
        debug!(
            duration_ms = config.duration.as_millis() as u64,
            "hold gesture created"
        );
        Self {
            config,
            phase: HoldPhase::Idle,
            completions: 0,
        }
    }

    /// Starts a hold. Returns `true` if this press started the timer.
    ///
    /// Repeated presses while already holding (pointer wobble) do not
    /// restart the timer, and presses during a commit are ignored.
    pub fn press(&mut self) -> bool {
        match self.phase {
            HoldPhase::Idle => {
                self.phase = HoldPhase::Holding {
                    started: Instant::now(),
                };
                trace!("hold started");
                true
            }
            HoldPhase::Holding { .. } | HoldPhase::Committing => false,
        }
    }

    /// Ends a hold early. Before completion this resets to idle with
    /// progress 0; during a commit it has no effect.
    pub fn release(&mut self) {
        if let HoldPhase::Holding { started } = self.phase {
            trace!(
                held_ms = started.elapsed().as_millis() as u64,
                "hold released early"
            );
            self.phase = HoldPhase::Idle;
        }
    }

    /// Abandons the gesture from any phase, e.g. when the player loses
    /// turn authority or the session disconnects.
    pub fn cancel(&mut self) {
        self.phase = HoldPhase::Idle;
    }

    /// Fraction of the hold completed, rising linearly from 0 to 1.
    pub fn progress(&self) -> f64 {
        match self.phase {
            HoldPhase::Idle => 0.0,
            HoldPhase::Holding { started } => {
                let ratio = started.elapsed().as_secs_f64() / self.config.duration.as_secs_f64();
                ratio.min(1.0)
            }
            HoldPhase::Committing => 1.0,
        }
    }

    /// Checks the deadline without waiting. Returns the completion if the
    /// hold has just reached its duration.
    ///
    /// For callers driven by their own cadence instead of
    /// [`wait_for_completion`](Self::wait_for_completion).
    pub fn poll(&mut self) -> Option<HoldCompleted> {
        match self.phase {
            HoldPhase::Holding { started } if started.elapsed() >= self.config.duration => {
                Some(self.complete(started))
            }
            _ => None,
        }
    }

    /// Waits until the current hold completes.
    ///
    /// Pends forever while idle or committing. Cancel-safe: dropping the
    /// future before the deadline leaves the gesture untouched, so a
    /// release handled on another `select!` branch simply wins.
    pub async fn wait_for_completion(&mut self) -> HoldCompleted {
        let HoldPhase::Holding { started } = self.phase else {
            return std::future::pending().await;
        };
        time::sleep_until(started + self.config.duration).await;
        self.complete(started)
    }

    /// Marks the commit as done and returns to idle.
    pub fn finish_commit(&mut self) {
        if self.phase == HoldPhase::Committing {
            self.phase = HoldPhase::Idle;
        }
    }

    fn complete(&mut self, started: Instant) -> HoldCompleted {
        self.phase = HoldPhase::Committing;
        self.completions += 1;
        let held = started.elapsed();
        debug!(
            sequence = self.completions,
            held_ms = held.as_millis() as u64,
            "hold completed"
        );
        HoldCompleted {
            sequence: self.completions,
            held,
        }
    }

    pub fn phase(&self) -> HoldPhase {
        self.phase
    }

    pub fn is_holding(&self) -> bool {
        matches!(self.phase, HoldPhase::Holding { .. })
    }

    /// Total completed gestures.
    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn duration(&self) -> Duration {
        self.config.duration
    }
}

impl Default for HoldGesture {
    fn default() -> Self {
        Self::new(HoldConfig::default())
    }
}
