use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crater_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message};
use crater_core::player::PlayerId;

use crate::relay::SharedRelayState;

/// Burst size and refill rate (messages per second) of the per-connection
/// token bucket.
const RATE_LIMIT_BURST: f64 = 50.0;
const RATE_LIMIT_REFILL: f64 = 50.0;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedRelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedRelayState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    let client_id = state.write().await.connect(tx);
    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, client_id).await;

    state.write().await.disconnect(client_id);
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection token bucket. Each connection gets
/// [`RATE_LIMIT_BURST`] tokens refilled at [`RATE_LIMIT_REFILL`] per second;
/// a frame that finds the bucket empty is dropped, not queued.
pub struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    pub fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &SharedRelayState,
    client_id: PlayerId,
) {
    let mut rate_limiter = RateLimiter::new(RATE_LIMIT_BURST, RATE_LIMIT_REFILL);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let size = text.as_str().len();
        if size > MAX_MESSAGE_SIZE {
            tracing::warn!(client_id, size, "Oversized message dropped");
            continue;
        }

        if !rate_limiter.allow() {
            tracing::warn!(client_id, "Client rate limited");
            continue;
        }

        let msg = match decode_client_message(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(client_id, error = %e, "Unparseable message dropped");
                continue;
            },
        };

        state.write().await.handle(client_id, msg);
    }
}
