use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use tracing::{error, trace};

use vanish_db::models::MessageRow;
use vanish_types::api::{Claims, MessagePayload, SendMessageRequest, SendMessageResponse};
use vanish_types::events::ChatEvent;
use vanish_vault::Vault;

use crate::error::ApiError;
use crate::handle::normalize_handle;
use crate::state::AppState;

const MAX_BODY_CHARS: usize = 4000;
const MAX_VOICE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    200
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<MessagePayload>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let limit = query.limit.min(200);

    // Run blocking DB work off the async runtime
    let rows = tokio::task::spawn_blocking(move || db.list_for_participant(&user_id, limit))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })??;

    Ok(Json(rows.iter().map(payload_from_row).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let payload = create_and_publish(&state, &claims, req).await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { message: payload })))
}

/// The full creation path: validate, persist (store write first, so the
/// message is durable before anything is announced), then publish to the
/// recipient's channel. The publish is fire-and-forget — zero subscribers or
/// a dead socket never fails the response.
pub async fn create_and_publish(
    state: &AppState,
    sender: &Claims,
    req: SendMessageRequest,
) -> Result<MessagePayload, ApiError> {
    let recipient_handle = normalize_handle(&req.recipient, "recipient")?;

    let body = validate_body(req.message.as_deref())?;

    let voice = match &req.voice {
        Some(upload) => Some(validate_voice(upload)?),
        None => None,
    };

    if body.is_none() && voice.is_none() {
        return Err(ApiError::validation(
            "message",
            "Please send text or a voice note.",
        ));
    }

    let recipient = state
        .db
        .get_user_by_username(&recipient_handle)?
        .ok_or(ApiError::NotFound("user"))?;

    if recipient.id == sender.sub.to_string() {
        return Err(ApiError::validation(
            "recipient",
            "You cannot send a message to yourself.",
        ));
    }

    let voice_path = match voice {
        Some((bytes, extension)) => Some(
            state
                .vault
                .store(&bytes, extension)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        ),
        None => None,
    };

    // Run blocking DB insert off the async runtime
    let db = state.db.clone();
    let sender_id = sender.sub.to_string();
    let recipient_id = recipient.id.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.create_message(
            &sender_id,
            &recipient_id,
            body.as_deref(),
            voice_path.as_deref(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })??;

    let payload = payload_from_row(&row);

    let delivered = state
        .registry
        .publish(&recipient.username, ChatEvent::MessageSent(payload.clone()))
        .await;
    trace!(
        "Published message {} to {} ({} connections)",
        payload.id, recipient.username, delivered
    );

    Ok(payload)
}

fn validate_body(message: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = message else { return Ok(None) };
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text.chars().count() > MAX_BODY_CHARS {
        return Err(ApiError::validation(
            "message",
            format!("must not exceed {MAX_BODY_CHARS} characters"),
        ));
    }
    Ok(Some(text.to_string()))
}

fn validate_voice(
    upload: &vanish_types::api::VoiceUpload,
) -> Result<(Vec<u8>, &'static str), ApiError> {
    let extension = extension_for(&upload.content_type).ok_or_else(|| {
        ApiError::validation("voice", "unsupported audio content type")
    })?;

    let bytes = B64
        .decode(&upload.data)
        .map_err(|_| ApiError::validation("voice", "voice data must be valid base64"))?;

    if bytes.len() > MAX_VOICE_BYTES {
        return Err(ApiError::validation(
            "voice",
            "voice notes are limited to 10 MiB",
        ));
    }

    Ok((bytes, extension))
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/webm" => Some("webm"),
        "audio/ogg" => Some("ogg"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        _ => None,
    }
}

fn payload_from_row(row: &MessageRow) -> MessagePayload {
    let created_at = parse_sqlite_timestamp(&row.created_at);

    MessagePayload {
        id: row.id,
        sender_username: row.sender_username.clone(),
        recipient_username: row.recipient_username.clone(),
        message: row.body.clone(),
        voice_url: row.voice_path.as_deref().map(Vault::url),
        created_at: created_at.to_rfc3339(),
        time: created_at.format("%H:%M").to_string(),
    }
}

fn parse_sqlite_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Corrupt created_at '{}': {}", raw, e);
            chrono::DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;
    use vanish_db::Database;
    use vanish_gateway::ChannelRegistry;
    use vanish_types::api::VoiceUpload;

    use crate::state::AppStateInner;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let vault = Arc::new(Vault::open(dir.path()).await.unwrap());
        let state = Arc::new(AppStateInner {
            db,
            vault,
            registry: ChannelRegistry::new(),
            jwt_secret: "test-secret".into(),
        });
        (state, dir)
    }

    fn register_user(state: &AppState, handle: &str) -> Claims {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&id.to_string(), handle, "argon2id$fake")
            .unwrap();
        Claims {
            sub: id,
            username: handle.to_string(),
            exp: usize::MAX,
        }
    }

    fn text_request(recipient: &str, message: &str) -> SendMessageRequest {
        SendMessageRequest {
            recipient: recipient.into(),
            message: Some(message.into()),
            voice: None,
        }
    }

    #[tokio::test]
    async fn send_reaches_recipient_channel_once() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let (_conn, mut sara_rx) = state.registry.subscribe("sara").await;
        let (_ali_conn, mut ali_rx) = state.registry.subscribe("ali").await;

        let payload = create_and_publish(&state, &ali, text_request("sara", "Hello Sara"))
            .await
            .unwrap();
        assert_eq!(payload.message.as_deref(), Some("Hello Sara"));
        assert_eq!(payload.sender_username, "ali");
        assert_eq!(payload.recipient_username, "sara");

        let ChatEvent::MessageSent(event) = sara_rx.try_recv().unwrap() else {
            panic!("expected message.sent");
        };
        assert_eq!(event.message.as_deref(), Some("Hello Sara"));
        assert_eq!(event.sender_username, "ali");
        assert!(sara_rx.try_recv().is_err(), "exactly one event expected");

        // The sender does not hear their own message via broadcast; they
        // already have it from the synchronous response.
        assert!(ali_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_storage() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let req = SendMessageRequest {
            recipient: "sara".into(),
            message: Some("   ".into()),
            voice: None,
        };
        let err = create_and_publish(&state, &ali, req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "message", .. }));

        let rows = state.db.list_for_participant(&ali.sub.to_string(), 10).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn self_send_is_rejected() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");

        let err = create_and_publish(&state, &ali, text_request("ali", "hi me"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "recipient", .. }));
    }

    #[tokio::test]
    async fn unknown_recipient_is_not_found() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");

        let err = create_and_publish(&state, &ali, text_request("ghost_user", "boo"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("user")));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let err = create_and_publish(&state, &ali, text_request("sara", &"x".repeat(4001)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "message", .. }));
    }

    #[tokio::test]
    async fn voice_note_is_stored_and_resolvable() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let req = SendMessageRequest {
            recipient: "sara".into(),
            message: None,
            voice: Some(VoiceUpload {
                data: B64.encode(b"opus frames"),
                content_type: "audio/webm".into(),
            }),
        };

        let payload = create_and_publish(&state, &ali, req).await.unwrap();
        assert!(payload.message.is_none());

        let url = payload.voice_url.expect("voice url");
        assert!(url.starts_with("/storage/chat-voices/"));
        assert!(url.ends_with(".webm"));

        let reference = url.strip_prefix("/storage/").unwrap();
        assert!(state.vault.exists(reference).await);
    }

    #[tokio::test]
    async fn unsupported_voice_type_is_rejected() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let req = SendMessageRequest {
            recipient: "sara".into(),
            message: None,
            voice: Some(VoiceUpload {
                data: B64.encode(b"not audio"),
                content_type: "video/mp4".into(),
            }),
        };

        let err = create_and_publish(&state, &ali, req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "voice", .. }));
    }

    #[tokio::test]
    async fn invalid_base64_is_rejected() {
        let (state, _dir) = test_state().await;
        let ali = register_user(&state, "ali");
        register_user(&state, "sara");

        let req = SendMessageRequest {
            recipient: "sara".into(),
            message: None,
            voice: Some(VoiceUpload {
                data: "@@not-base64@@".into(),
                content_type: "audio/ogg".into(),
            }),
        };

        let err = create_and_publish(&state, &ali, req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { field: "voice", .. }));
    }

    #[test]
    fn sqlite_timestamp_parses_with_fallback() {
        let parsed = parse_sqlite_timestamp("2026-02-19 13:00:44");
        assert_eq!(parsed.format("%H:%M").to_string(), "13:00");
    }
}
