//! One open room, as seen by the local player.
//!
//! A [`RoomSession`] owns the room's synchronizer and the host's turn
//! control. Applications drive it by awaiting
//! [`next_update`](RoomSession::next_update) in a loop and forwarding
//! press/release input in between.

use std::sync::Arc;

use tracing::{debug, info};
use turnroom_hold::{HoldConfig, HoldPhase};
use turnroom_protocol::{PlayerId, RoomState};
use turnroom_room::{SessionExit, SyncOutcome, SyncState, Synchronizer, Teardown, TurnAdvance, TurnOutcome};
use turnroom_session::{KeyValueStore, LocalProfile, ProfileStore, SessionEntry};
use turnroom_store::Backend;

use crate::TurnroomError;

/// Something the application should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The mirrored room state changed.
    State(RoomState),
    /// A completed hold tried to advance the turn.
    Turn(TurnOutcome),
    /// The change feed ended while the room still exists. Resume the
    /// session's entry to reconnect.
    Disconnected,
    /// The session is over.
    Ended(SessionExit),
}

/// An entered room.
#[derive(Debug)]
pub struct RoomSession<B, K> {
    sync: Synchronizer<B>,
    turn: TurnAdvance,
    teardown: Teardown<B>,
    entry: SessionEntry,
    profiles: Arc<ProfileStore<K>>,
    profile: LocalProfile,
    exit: Option<SessionExit>,
    finished: bool,
}

impl<B: Backend, K: KeyValueStore> RoomSession<B, K> {
    pub(crate) fn open(
        sync: Synchronizer<B>,
        teardown: Teardown<B>,
        entry: SessionEntry,
        hold: HoldConfig,
        min_ready_players: usize,
        profiles: Arc<ProfileStore<K>>,
    ) -> Result<Self, TurnroomError> {
        let profile = profiles.load(&entry.room_id, sync.player_id())?;
        info!(
            room_id = %entry.room_id,
            code = %entry.code,
            player_id = %sync.player_id(),
            is_host = entry.is_host,
            "room session open"
        );
        Ok(Self {
            sync,
            turn: TurnAdvance::new(hold, min_ready_players),
            teardown,
            entry,
            profiles,
            profile,
            exit: None,
            finished: false,
        })
    }

    /// Waits for the next change in the room or the next completed hold.
    ///
    /// Stale feed events are skipped. A completed hold is committed before
    /// this returns. Returns `None` once the session has ended or
    /// disconnected and that has been reported.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        if self.finished {
            return None;
        }
        loop {
            tokio::select! {
                outcome = self.sync.next_event() => match outcome {
                    SyncOutcome::Applied(state) => {
                        self.turn.refresh(&self.sync);
                        return Some(SessionUpdate::State(state));
                    }
                    SyncOutcome::Ignored => continue,
                    SyncOutcome::RoomDeleted => {
                        self.turn.refresh(&self.sync);
                        self.exit = Some(SessionExit::RoomDeleted);
                        self.finished = true;
                        return Some(SessionUpdate::Ended(SessionExit::RoomDeleted));
                    }
                    SyncOutcome::FeedClosed => {
                        self.turn.refresh(&self.sync);
                        self.finished = true;
                        return Some(SessionUpdate::Disconnected);
                    }
                },
                completed = self.turn.wait_for_completion() => {
                    debug!(sequence = completed.sequence, held_ms = completed.held.as_millis() as u64, "hold completed");
                    let outcome = self.turn.commit(&mut self.sync).await;
                    return Some(SessionUpdate::Turn(outcome));
                }
            }
        }
    }

    /// Starts the advance hold. Returns `false` if the local player may
    /// not advance right now or a hold is already running.
    pub fn press(&mut self) -> bool {
        self.turn.press(&self.sync)
    }

    pub fn release(&mut self) {
        self.turn.release();
    }

    /// Hold completion in `[0.0, 1.0]`, for drawing a progress ring.
    pub fn hold_progress(&self) -> f64 {
        self.turn.progress()
    }

    pub fn hold_phase(&self) -> HoldPhase {
        self.turn.phase()
    }

    /// Advances the turn without a hold.
    ///
    /// # Errors
    /// [`RoomError::NotHost`](turnroom_room::RoomError::NotHost) if the
    /// local player may not advance right now.
    pub async fn advance_now(&mut self) -> Result<TurnOutcome, TurnroomError> {
        Ok(self.turn.advance_now(&mut self.sync).await?)
    }

    pub fn can_advance(&self) -> bool {
        self.turn.can_advance(&self.sync)
    }

    /// Leaves the room. Always ends the session; the remote outcome is in
    /// the returned exit. Leaving twice returns the first exit.
    pub async fn leave(&mut self) -> SessionExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        let exit = self.teardown.leave(&mut self.sync).await;
        self.turn.refresh(&self.sync);
        self.exit = Some(exit);
        self.finished = true;
        exit
    }

    /// A handle that leaves this room from elsewhere, such as a window
    /// close hook. Shares the in-flight guard with [`leave`](Self::leave).
    pub fn leave_handle(&self) -> Teardown<B> {
        self.teardown.clone()
    }

    /// How the session ended, if it has.
    pub fn exit(&self) -> Option<SessionExit> {
        self.exit
    }

    pub fn entry(&self) -> &SessionEntry {
        &self.entry
    }

    pub fn player_id(&self) -> &PlayerId {
        self.sync.player_id()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// The mirrored room state, while synced.
    pub fn room_state(&self) -> Option<&RoomState> {
        self.sync.snapshot()
    }

    pub fn is_host(&self) -> bool {
        self.sync.is_host()
    }

    pub fn profile(&self) -> LocalProfile {
        self.profile
    }

    /// Changes the local profile and persists it.
    pub fn update_profile(
        &mut self,
        change: impl FnOnce(&mut LocalProfile),
    ) -> Result<LocalProfile, TurnroomError> {
        let mut next = self.profile;
        change(&mut next);
        self.profiles
            .save(&self.entry.room_id, self.sync.player_id(), &next)?;
        self.profile = next;
        Ok(next)
    }
}
