use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared across vanish-api (REST middleware) and the WebSocket
/// upgrade in vanish-server. Canonical definition lives here in vanish-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Messages --

/// Voice clips travel base64-encoded inside the JSON body; the server
/// enforces the size ceiling against the decoded bytes.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceUpload {
    pub data: String,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub voice: Option<VoiceUpload>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: MessagePayload,
}

/// One message as rendered by clients. `created_at` is ISO-8601; `time` is a
/// precomputed `HH:MM` hint. There is deliberately no `is_mine` field: the
/// same payload is fanned out to the sender's response and the recipient's
/// channel, so each viewer computes ownership locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub id: i64,
    pub sender_username: String,
    pub recipient_username: String,
    pub message: Option<String>,
    pub voice_url: Option<String>,
    pub created_at: String,
    pub time: String,
}

// -- User lookup --

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub username: String,
}
