use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crater_core::net::messages::{ClientMessage, ServerMessage};
use crater_core::net::protocol::{decode_server_message, encode_client_message};
use crater_core::player::PlayerId;

use crater_relay::build_app;

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestRelay {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    pub async fn new() -> Self {
        Self::with_max_rooms(100).await
    }

    pub async fn with_max_rooms(max_rooms: usize) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(max_rooms);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }
}

/// Connect and consume the `connected` greeting. Returns the assigned id.
pub async fn ws_connect(url: &str) -> (Ws, PlayerId) {
    let (mut stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::Connected { client_id } => (stream, client_id),
        other => panic!("Expected connected, got: {other:?}"),
    }
}

pub async fn ws_send(stream: &mut Ws, msg: &ClientMessage) {
    let text = encode_client_message(msg).unwrap();
    stream.send(Message::text(text)).await.unwrap();
}

pub async fn ws_send_raw(stream: &mut Ws, text: String) {
    stream.send(Message::text(text)).await.unwrap();
}

/// Read the next server message (5s timeout).
pub async fn ws_read_server_msg(stream: &mut Ws) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_message(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for a server message")
}

/// Read until a message matches, skipping lobby chatter in between.
pub async fn ws_read_until(
    stream: &mut Ws,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    for _ in 0..32 {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("Expected message never arrived");
}

/// Whether anything arrives within `wait`.
pub async fn ws_try_read(stream: &mut Ws, wait: Duration) -> Option<ServerMessage> {
    match tokio::time::timeout(wait, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => decode_server_message(text.as_str()).ok(),
        _ => None,
    }
}

/// Connect, name the client, and create a room. Returns the room code.
pub async fn ws_host(url: &str, name: &str) -> (Ws, PlayerId, String) {
    let (mut stream, id) = ws_connect(url).await;
    ws_send(
        &mut stream,
        &ClientMessage::SetName {
            name: name.to_string(),
        },
    )
    .await;
    ws_send(&mut stream, &ClientMessage::CreateRoom).await;
    let code = match ws_read_until(&mut stream, |m| {
        matches!(m, ServerMessage::RoomCreated { .. })
    })
    .await
    {
        ServerMessage::RoomCreated { code, .. } => code,
        _ => unreachable!(),
    };
    (stream, id, code)
}

/// Connect, name the client, and take the second seat of `code`.
pub async fn ws_guest(url: &str, name: &str, code: &str) -> (Ws, PlayerId) {
    let (mut stream, id) = ws_connect(url).await;
    ws_send(
        &mut stream,
        &ClientMessage::SetName {
            name: name.to_string(),
        },
    )
    .await;
    ws_send(
        &mut stream,
        &ClientMessage::JoinRoom {
            code: code.to_string(),
            as_spectator: false,
        },
    )
    .await;
    ws_read_until(&mut stream, |m| matches!(m, ServerMessage::RoomJoined { .. })).await;
    (stream, id)
}
