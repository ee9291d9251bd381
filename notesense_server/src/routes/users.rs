use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::RunQueryDsl;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{
    auth::{AuthUser, jwt, password},
    models::{
        blacklist::NewBlacklistedToken,
        state::NoteSenseState,
        users::{
            AuthResponse, LoginRequest, MessageResponse, NewUser, SignUpRequest, User,
            normalize_email,
        },
    },
    schema, utils,
};

const INVALID_CREDENTIALS: &str = "invalid email or password";

pub fn router(state: NoteSenseState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(signup))
        .routes(routes!(login))
        .routes(routes!(logout))
        .with_state(state)
}

fn issue_token(state: &NoteSenseState, user: &User) -> Result<String, (StatusCode, String)> {
    jwt::generate_access_token(
        user.id,
        &state.auth_config.jwt_secret,
        state.auth_config.access_token_expiry_mins,
    )
    .map_err(utils::internal_error)
}

/// Create an account and return an access token for it.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Successfully signed up", body = AuthResponse),
        (status = 400, description = "Missing fields, weak password, or email already exists")
    )
)]
#[axum::debug_handler]
pub async fn signup(
    State(state): State<NoteSenseState>,
    Json(body): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let SignUpRequest {
        email,
        password,
        name,
    } = body;
    let email = normalize_email(&email);
    if email.is_empty() || password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "email and password are required".to_string(),
        ));
    }
    password::validate_password_strength(&password, state.auth_config.min_password_length)
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let password_hash = password::hash_password(&password).map_err(utils::internal_error)?;
    let new_user = NewUser {
        email,
        password_hash,
        name: name.unwrap_or_default(),
    };

    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let user = diesel::insert_into(schema::users::table)
        .values(new_user)
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => (
                StatusCode::BAD_REQUEST,
                "email already exists".to_string(),
            ),
            err => utils::diesel_error(err),
        })?;
    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = %user.id, "user signed up");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Exchange an email and password for an access token.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successfully logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<NoteSenseState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let email = normalize_email(&body.email);
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let user = schema::users::table
        .select(User::as_select())
        .filter(schema::users::email.eq(&email))
        .first(&mut conn)
        .await
        .optional()
        .map_err(utils::diesel_error)?;
    let Some(user) = user else {
        tracing::debug!("login attempt for unknown email");
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    };
    if !password::verify_password(&body.password, &user.password_hash)
        .map_err(utils::internal_error)?
    {
        tracing::debug!(user_id = %user.id, "login attempt with wrong password");
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    }
    let token = issue_token(&state, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

/// Revoke the access token used for this request.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Successfully logged out", body = MessageResponse),
        (status = 401, description = "Missing, invalid, or revoked token")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn logout(
    State(state): State<NoteSenseState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let mut conn = state.pool.get().await.map_err(utils::internal_error)?;
    let revoked_token = NewBlacklistedToken {
        user_id: auth.user_id,
        token_id: auth.token_id,
        expires_at: auth.expires_at,
    };
    diesel::insert_into(schema::token_blacklist::table)
        .values(revoked_token)
        .on_conflict_do_nothing()
        .execute(&mut conn)
        .await
        .map_err(utils::diesel_error)?;
    tracing::info!(user_id = %auth.user_id, "user logged out");
    Ok(Json(MessageResponse {
        message: "successfully logged out".to_string(),
    }))
}
