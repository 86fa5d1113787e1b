use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::sync::mpsc;
use tracing::{info, trace};
use uuid::Uuid;

use vanish_types::events::{ChatEvent, ClientCommand};

use crate::auth;
use crate::registry::ChannelRegistry;

struct Subscription {
    handle: String,
    conn_id: Uuid,
    rx: mpsc::UnboundedReceiver<ChatEvent>,
}

/// Serve one WebSocket connection that was already authenticated at the
/// HTTP upgrade layer. The client may subscribe to exactly one channel —
/// its own `chat.user.{handle}` — and then receives events as JSON text
/// frames. Unauthorized subscription attempts are ignored without a reply,
/// so a probing client learns nothing about which handles exist.
pub async fn serve_connection(socket: WebSocket, registry: ChannelRegistry, username: String) {
    let (mut sink, mut stream) = socket.split();

    info!("{} connected to gateway", username);

    let ready = ChatEvent::Ready {
        username: username.clone(),
    };
    if send_event(&mut sink, &ready).await.is_err() {
        return;
    }

    // Phase 1: wait for an authorized subscribe command.
    let Some(subscription) = await_subscription(&mut stream, &registry, &username).await else {
        info!("{} disconnected before subscribing", username);
        return;
    };

    info!("{} subscribed to chat.user.{}", username, subscription.handle);

    // Phase 2: relay channel events, draining further client frames.
    let Subscription { handle, conn_id, mut rx } = subscription;
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Already subscribed; other frames carry nothing we act on.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    registry.unsubscribe(&handle, conn_id).await;
    info!("{} disconnected from gateway", username);
}

async fn await_subscription(
    stream: &mut SplitStream<WebSocket>,
    registry: &ChannelRegistry,
    username: &str,
) -> Option<Subscription> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(subscription) = try_subscribe(&text, registry, username).await {
                    return Some(subscription);
                }
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => {}
        }
    }
}

async fn try_subscribe(
    text: &str,
    registry: &ChannelRegistry,
    username: &str,
) -> Option<Subscription> {
    let Ok(command) = serde_json::from_str::<ClientCommand>(text) else {
        trace!("Ignoring malformed gateway frame");
        return None;
    };

    let ClientCommand::Subscribe { channel } = command;

    let authorized = auth::subscriber_handle(&channel)
        .filter(|handle| auth::authorize_subscription(Some(username), handle));

    match authorized {
        Some(handle) => {
            let (conn_id, rx) = registry.subscribe(handle).await;
            Some(Subscription {
                handle: handle.to_string(),
                conn_id,
                rx,
            })
        }
        None => {
            // Silent denial: no response at all.
            trace!("Denied subscription to {}", channel);
            None
        }
    }
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &ChatEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap_or_default();
    sink.send(Message::Text(json.into())).await
}
