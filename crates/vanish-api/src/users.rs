use axum::{Extension, Json, extract::{Query, State}};

use vanish_types::api::{Claims, LookupQuery, LookupResponse};

use crate::error::ApiError;
use crate::handle::normalize_handle;
use crate::state::AppState;

/// Resolve a recipient handle before composing a message. Unknown handles
/// are a 404 (distinct from validation); targeting yourself is a field
/// error, caught here so the client can surface it next to the input.
pub async fn find_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse>, ApiError> {
    let username = normalize_handle(&query.username, "username")?;

    let user = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound("user"))?;

    if user.id == claims.sub.to_string() {
        return Err(ApiError::validation(
            "username",
            "You cannot message yourself.",
        ));
    }

    Ok(Json(LookupResponse {
        username: user.username,
    }))
}
