//! Two players share a room on an in-memory backend. The host holds the
//! advance control a few times; the guest watches the turn counter move,
//! then both leave and the room is deleted.
//!
//! Run with `RUST_LOG=debug` to see every change event.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;
use turnroom::prelude::*;

const ROUNDS: u64 = 3;

fn client(store: &MemoryStore) -> Result<TurnroomClient<MemoryStore, MemoryKeyValueStore>, TurnroomError> {
    TurnroomClient::builder()
        .hold_config(HoldConfig::with_duration(Duration::from_millis(300)))
        .build(store.clone(), MemoryKeyValueStore::new())
}

/// Follows the room until it ends, returning the last turn seen.
fn watch(mut guest: RoomSession<MemoryStore, MemoryKeyValueStore>, until_turn: u64) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut turn = guest.room_state().map_or(0, |s| s.turn);
        while let Some(update) = guest.next_update().await {
            match update {
                SessionUpdate::State(state) => {
                    if state.turn != turn {
                        info!(turn = state.turn, "guest sees new turn");
                        turn = state.turn;
                        let _ = guest.update_profile(|p| p.gold += 1);
                    }
                    if turn >= until_turn {
                        break;
                    }
                }
                SessionUpdate::Ended(exit) => {
                    info!(?exit, "guest session ended");
                    return turn;
                }
                SessionUpdate::Turn(_) | SessionUpdate::Disconnected => {}
            }
        }
        let exit = guest.leave().await;
        info!(?exit, gold = guest.profile().gold, "guest left");
        turn
    })
}

async fn run(rounds: u64) -> Result<(u64, usize), TurnroomError> {
    let store = MemoryStore::new();
    let mut host = client(&store)?.create_room().await?;
    info!(code = %host.entry().code, entry = %host.entry(), "room created");

    let typed = format!("  {} ", host.entry().code.as_str().to_lowercase());
    let guest = client(&store)?.join(&typed).await?;
    let guest_task = watch(guest, 1 + rounds);

    let mut advanced = 0;
    while advanced < rounds {
        let Some(update) = host.next_update().await else {
            break;
        };
        match update {
            SessionUpdate::State(state) => {
                info!(players = state.players.len(), turn = state.turn, "host state");
                if host.can_advance() {
                    host.press();
                }
            }
            SessionUpdate::Turn(TurnOutcome::Advanced { turn }) => {
                info!(turn, "host advanced the turn");
                advanced += 1;
                host.release();
                host.press();
            }
            SessionUpdate::Turn(outcome) => info!(?outcome, "hold did not advance"),
            SessionUpdate::Disconnected | SessionUpdate::Ended(_) => break,
        }
    }
    host.release();

    let guest_turn = guest_task.await.unwrap_or_default();
    let exit = host.leave().await;
    info!(?exit, rooms_left = store.room_count(), "host left");
    Ok((guest_turn, store.room_count()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    turnroom::init_tracing();
    let (turn, rooms_left) = run(ROUNDS).await?;
    println!("final turn {turn}, rooms left {rooms_left}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_advances_each_round_and_cleans_up() {
        let (turn, rooms_left) = run(ROUNDS).await.unwrap();

        assert_eq!(turn, 1 + ROUNDS);
        assert_eq!(rooms_left, 0);
    }
}
