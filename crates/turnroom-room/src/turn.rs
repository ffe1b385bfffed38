//! Host-only turn advancement.
//!
//! The host advances the shared turn counter by holding the control for
//! the configured duration. Everyone else's presses are ignored, as are
//! the host's until enough players have joined.

use tracing::{error, info, trace};
use turnroom_hold::{HoldCompleted, HoldConfig, HoldGesture, HoldPhase};
use turnroom_store::Backend;

use crate::{PublishOutcome, RoomError, Synchronizer};

/// What a completed hold did to the shared turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn advanced to `turn`.
    Advanced { turn: u64 },
    /// Another write landed first; the turn is now `turn`.
    Rejected { turn: u64 },
    /// The local player lost turn authority before the commit.
    NotAllowed,
    /// The write failed. Logged, not retried.
    Failed,
}

/// Gates a [`HoldGesture`] on host authority and room readiness, and
/// commits `turn + 1` when it completes.
#[derive(Debug)]
pub struct TurnAdvance {
    gesture: HoldGesture,
    min_ready_players: usize,
}

impl TurnAdvance {
    pub fn new(hold: HoldConfig, min_ready_players: usize) -> Self {
        Self {
            gesture: HoldGesture::new(hold),
            min_ready_players: min_ready_players.max(1),
        }
    }

    /// Returns `true` if the local player may advance the turn right now:
    /// synced, host, and the room is ready.
    pub fn can_advance<B: Backend>(&self, sync: &Synchronizer<B>) -> bool {
        sync.is_synced()
            && sync.is_host()
            && sync
                .snapshot()
                .is_some_and(|state| state.is_ready(self.min_ready_players))
    }

    /// Starts a hold if allowed. Returns `true` if the timer started.
    pub fn press<B: Backend>(&mut self, sync: &Synchronizer<B>) -> bool {
        if !self.can_advance(sync) {
            trace!(player_id = %sync.player_id(), "turn press ignored");
            return false;
        }
        self.gesture.press()
    }

    pub fn release(&mut self) {
        self.gesture.release();
    }

    /// Abandons an in-progress hold once the gate has closed (a player
    /// left, or the room disconnected).
    pub fn refresh<B: Backend>(&mut self, sync: &Synchronizer<B>) {
        if self.gesture.is_holding() && !self.can_advance(sync) {
            trace!("turn gate closed, cancelling hold");
            self.gesture.cancel();
        }
    }

    pub fn progress(&self) -> f64 {
        self.gesture.progress()
    }

    pub fn phase(&self) -> HoldPhase {
        self.gesture.phase()
    }

    /// Waits for the current hold to complete. Pends forever while idle.
    pub async fn wait_for_completion(&mut self) -> HoldCompleted {
        self.gesture.wait_for_completion().await
    }

    /// Commits the next turn after a completed hold.
    ///
    /// Writes `observed.turn + 1` against the observed version. A
    /// concurrent commit from another client wins and this one is
    /// rejected, so two hosts racing from the same turn advance it once.
    /// Failures are logged and not retried.
    pub async fn commit<B: Backend>(&mut self, sync: &mut Synchronizer<B>) -> TurnOutcome {
        let outcome = self.commit_inner(sync).await;
        self.gesture.finish_commit();
        outcome
    }

    async fn commit_inner<B: Backend>(&mut self, sync: &mut Synchronizer<B>) -> TurnOutcome {
        if !self.can_advance(sync) {
            return TurnOutcome::NotAllowed;
        }
        let Some(observed) = sync.snapshot().cloned() else {
            return TurnOutcome::NotAllowed;
        };

        match sync.publish(observed.advanced()).await {
            Ok(PublishOutcome::Committed(stored)) => {
                info!(
                    room_id = ?sync.room_id(),
                    turn = stored.turn,
                    version = stored.version,
                    "turn advanced"
                );
                TurnOutcome::Advanced { turn: stored.turn }
            }
            Ok(PublishOutcome::Rejected { current }) => {
                info!(
                    room_id = ?sync.room_id(),
                    from = observed.turn,
                    now = current.turn,
                    "turn advance rejected by a concurrent commit"
                );
                TurnOutcome::Rejected { turn: current.turn }
            }
            Err(e) => {
                error!(room_id = ?sync.room_id(), error = %e, "turn advance failed");
                TurnOutcome::Failed
            }
        }
    }

    /// Advances immediately, without a hold. For keyboard shortcuts and
    /// tests.
    ///
    /// # Errors
    /// [`RoomError::NotHost`] if the gate is closed.
    pub async fn advance_now<B: Backend>(
        &mut self,
        sync: &mut Synchronizer<B>,
    ) -> Result<TurnOutcome, RoomError> {
        if !self.can_advance(sync) {
            return Err(RoomError::NotHost);
        }
        Ok(self.commit_inner(sync).await)
    }
}

impl Default for TurnAdvance {
    fn default() -> Self {
        Self::new(HoldConfig::default(), 2)
    }
}
