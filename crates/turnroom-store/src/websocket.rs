//! Change feed carried over WebSocket using `tokio-tungstenite`.
//!
//! [`FeedRelay`] is the server half: it accepts connections and forwards
//! the changes of any [`ChangeFeed`] as JSON [`FeedFrame`]s.
//! [`WebSocketFeed`] is the client half: a [`ChangeFeed`] that opens one
//! connection per subscription.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use turnroom_protocol::{Codec, FeedFrame, JsonCodec, RoomId};

use crate::{ChangeFeed, StoreError, Subscription};

/// Extracts the payload of a data frame. Control frames yield `None`.
fn frame_bytes(msg: Message) -> Option<Vec<u8>> {
    match msg {
        Message::Binary(data) => Some(data.to_vec()),
        Message::Text(text) => Some(text.as_bytes().to_vec()),
        _ => None,
    }
}

fn feed_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Feed(e.to_string())
}

// ---------------------------------------------------------------------------
// FeedRelay
// ---------------------------------------------------------------------------

/// Serves a [`ChangeFeed`] to remote clients.
///
/// Protocol per connection: the client sends `Subscribe` frames, the relay
/// answers each with `Subscribed` and then streams `Event` frames for that
/// room in commit order. `Unsubscribe` stops one room; closing the socket
/// stops all of them.
pub struct FeedRelay<F> {
    listener: TcpListener,
    feed: Arc<F>,
}

impl<F: ChangeFeed> FeedRelay<F> {
    /// Binds the relay to the given address.
    pub async fn bind(addr: &str, feed: F) -> Result<Self, StoreError> {
        let listener = TcpListener::bind(addr).await.map_err(feed_error)?;
        tracing::info!(addr, "feed relay listening");
        Ok(Self {
            listener,
            feed: Arc::new(feed),
        })
    }

    /// The address actually bound (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, StoreError> {
        self.listener.local_addr().map_err(feed_error)
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> Result<(), StoreError> {
        loop {
            let (stream, addr) = self.listener.accept().await.map_err(feed_error)?;
            let feed = Arc::clone(&self.feed);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, feed).await {
                    tracing::debug!(%addr, error = %e, "feed connection ended with error");
                }
            });
        }
    }
}

async fn serve_connection<F: ChangeFeed>(stream: TcpStream, feed: Arc<F>) -> Result<(), StoreError> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(feed_error)?;
    let (mut sink, mut incoming) = ws.split();

    // Single writer task so forwarders never contend on the sink.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<FeedFrame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let bytes = match JsonCodec.encode(&frame) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unencodable feed frame");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut forwarders: HashMap<RoomId, AbortHandle> = HashMap::new();

    while let Some(msg) = incoming.next().await {
        let msg = match msg {
            Ok(Message::Close(_)) => break,
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "feed socket error");
                break;
            }
        };
        let Some(bytes) = frame_bytes(msg) else {
            continue;
        };
        let frame: FeedFrame = match JsonCodec.decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = out_tx.send(FeedFrame::Error {
                    message: e.to_string(),
                });
                continue;
            }
        };

        match frame {
            FeedFrame::Subscribe { room_id } => {
                let subscribed = feed.subscribe(&room_id).await;
                match subscribed {
                    Ok(mut sub) => {
                        let _ = out_tx.send(FeedFrame::Subscribed {
                            room_id: room_id.clone(),
                        });
                        let out = out_tx.clone();
                        let forwarded_room = room_id.clone();
                        let task = tokio::spawn(async move {
                            while let Some(event) = sub.next().await {
                                let frame = FeedFrame::Event {
                                    room_id: forwarded_room.clone(),
                                    event,
                                };
                                if out.send(frame).is_err() {
                                    break;
                                }
                            }
                        });
                        tracing::debug!(%room_id, "relay subscription opened");
                        if let Some(previous) = forwarders.insert(room_id, task.abort_handle()) {
                            previous.abort();
                        }
                    }
                    Err(e) => {
                        let _ = out_tx.send(FeedFrame::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
            FeedFrame::Unsubscribe { room_id } => {
                if let Some(task) = forwarders.remove(&room_id) {
                    task.abort();
                    tracing::debug!(%room_id, "relay subscription closed");
                }
            }
            other => {
                tracing::warn!(?other, "unexpected frame from feed client");
            }
        }
    }

    for task in forwarders.into_values() {
        task.abort();
    }
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

// ---------------------------------------------------------------------------
// WebSocketFeed
// ---------------------------------------------------------------------------

/// A [`ChangeFeed`] that reads from a remote [`FeedRelay`].
#[derive(Debug, Clone)]
pub struct WebSocketFeed {
    url: String,
}

impl WebSocketFeed {
    /// `url` is the relay endpoint, e.g. `ws://127.0.0.1:9000`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChangeFeed for WebSocketFeed {
    /// Connects, subscribes, and waits for the relay's acknowledgement
    /// before returning, so no commit after this call is missed.
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(feed_error)?;
        let (mut sink, mut incoming) = ws.split();

        let request = JsonCodec.encode(&FeedFrame::Subscribe {
            room_id: room_id.clone(),
        })?;
        sink.send(Message::Binary(request.into()))
            .await
            .map_err(feed_error)?;

        loop {
            let msg = incoming
                .next()
                .await
                .ok_or_else(|| feed_error("relay closed before acknowledging"))?
                .map_err(feed_error)?;
            let Some(bytes) = frame_bytes(msg) else {
                continue;
            };
            match JsonCodec.decode::<FeedFrame>(&bytes)? {
                FeedFrame::Subscribed { room_id: acked } if &acked == room_id => break,
                FeedFrame::Error { message } => return Err(StoreError::Feed(message)),
                _ => {}
            }
        }

        let (tx, sub) = Subscription::channel(room_id.clone());
        let expected = room_id.clone();
        let task = tokio::spawn(async move {
            // Holding the write half keeps the socket open.
            let _sink = sink;
            while let Some(msg) = incoming.next().await {
                let Ok(msg) = msg else {
                    break;
                };
                let Some(bytes) = frame_bytes(msg) else {
                    continue;
                };
                match JsonCodec.decode::<FeedFrame>(&bytes) {
                    Ok(FeedFrame::Event { room_id, event }) if room_id == expected => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(FeedFrame::Error { message }) => {
                        tracing::warn!(room_id = %expected, %message, "relay reported error");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(room_id = %expected, error = %e, "undecodable feed frame");
                    }
                }
            }
            tracing::debug!(room_id = %expected, "feed connection closed");
        });

        Ok(sub.with_task(task.abort_handle()))
    }
}
