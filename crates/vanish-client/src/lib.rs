//! Client-side rendering session for one active chat view.
//!
//! A message can reach the client twice — once as the synchronous send
//! response and once as the broadcast event — in either order. The session
//! keeps a set of already-rendered ids so each message is rendered at most
//! once no matter how the two paths race.

use std::collections::HashSet;

use vanish_types::api::MessagePayload;

/// A message as it appears in the view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub id: i64,
    /// Computed locally against the viewer's own handle. The server never
    /// embeds ownership in a payload, since one broadcast payload is shared
    /// by viewers on both sides of the conversation.
    pub is_mine: bool,
    /// The other party: recipient for own messages, sender otherwise.
    pub counterpart: String,
    pub body: Option<String>,
    pub voice_url: Option<String>,
    pub time: String,
}

/// Session lifetime = one open chat view.
pub struct ChatSession {
    own_handle: String,
    rendered_ids: HashSet<i64>,
    log: Vec<RenderedMessage>,
}

impl ChatSession {
    pub fn new(own_handle: impl Into<String>) -> Self {
        Self {
            own_handle: own_handle.into(),
            rendered_ids: HashSet::new(),
            log: Vec::new(),
        }
    }

    /// Seed the view with server-supplied history. Runs before any live
    /// event is processed so a race between history load and a broadcast
    /// cannot double-render.
    pub fn seed_history(&mut self, history: &[MessagePayload]) {
        for payload in history {
            self.render(payload);
        }
    }

    /// Handle an incoming payload from either delivery path. Returns the
    /// rendered view entry, or `None` if this id was already on screen.
    pub fn on_message(&mut self, payload: &MessagePayload) -> Option<&RenderedMessage> {
        if self.render(payload) {
            self.log.last()
        } else {
            None
        }
    }

    pub fn rendered(&self) -> &[RenderedMessage] {
        &self.log
    }

    fn render(&mut self, payload: &MessagePayload) -> bool {
        if !self.rendered_ids.insert(payload.id) {
            return false;
        }

        let is_mine = payload.sender_username == self.own_handle;
        let counterpart = if is_mine {
            payload.recipient_username.clone()
        } else {
            payload.sender_username.clone()
        };

        self.log.push(RenderedMessage {
            id: payload.id,
            is_mine,
            counterpart,
            body: payload.message.clone(),
            voice_url: payload.voice_url.clone(),
            time: display_time(payload),
        });
        true
    }
}

/// Prefer the server's `HH:MM` hint; fall back to formatting `created_at`
/// when a payload arrives without one.
fn display_time(payload: &MessagePayload) -> String {
    if !payload.time.is_empty() {
        return payload.time.clone();
    }

    payload
        .created_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}
