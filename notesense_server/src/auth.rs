//! Bearer token authentication for handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl, dsl::exists};
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::{models::state::NoteSenseState, schema, utils};

pub mod jwt;
pub mod password;

/// The user a request was made on behalf of.
///
/// Extracting this validates the `Authorization: Bearer <token>` header and
/// rejects tokens that were revoked through logout.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// The token's `jti` claim.
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

fn unauthorized(msg: &str) -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, msg.to_string())
}

impl FromRequestParts<NoteSenseState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &NoteSenseState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("missing authorization header"))?;
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("authorization header must be 'Bearer <token>'"))?;

        let claims = jwt::validate_token(token, &state.auth_config.jwt_secret).map_err(|err| {
            tracing::debug!(error = %err, "rejected access token");
            unauthorized("invalid or expired token")
        })?;

        let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
        let revoked = diesel::select(exists(
            schema::token_blacklist::table
                .filter(schema::token_blacklist::token_id.eq(&claims.jti)),
        ))
        .get_result::<bool>(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
        if revoked {
            tracing::debug!(user_id = %claims.user_id, "rejected revoked token");
            return Err(unauthorized("token has been revoked"));
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| unauthorized("invalid or expired token"))?;
        Ok(AuthUser {
            user_id: claims.user_id,
            token_id: claims.jti,
            expires_at,
        })
    }
}
