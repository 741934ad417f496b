use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MeResponse, MessageResponse, PublicUser, RefreshRequest,
            RegisterRequest, ResetRequest, ResetSubmitRequest,
        },
        password::{hash_password, verify_password},
        session::{AuthUser, SessionKeys},
        tokens::{AccountTokens, TokenPurpose},
    },
    error::internal,
    roles::Actor,
    state::AppState,
    users::User,
};

/// One message for every confirmation failure so a caller cannot tell a bad
/// signature from an expired window from someone else's token.
const CONFIRM_FAILED: &str = "The confirmation link is invalid or has expired.";
const RESET_FAILED: &str = "The reset link is invalid or has expired.";
const RESET_REQUESTED: &str =
    "If that address is registered, a reset link has been sent to it.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/confirm/:token", get(confirm))
        .route("/auth/resend-confirmation", post(resend_confirmation))
        .route("/auth/reset", post(request_reset))
        .route("/auth/reset/:token", post(submit_reset))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]{2,63}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

#[derive(Debug, PartialEq, Eq)]
enum ConfirmOutcome {
    /// Token matches the session and the account is unconfirmed: flip it.
    Apply,
    /// Account already confirmed: succeed without touching anything.
    AlreadyConfirmed,
    /// Token belongs to a different account; rejected even though it is
    /// cryptographically valid.
    Mismatch,
}

fn evaluate_confirm(token_user: Uuid, session_user: Uuid, already_confirmed: bool) -> ConfirmOutcome {
    if token_user != session_user {
        ConfirmOutcome::Mismatch
    } else if already_confirmed {
        ConfirmOutcome::AlreadyConfirmed
    } else {
        ConfirmOutcome::Apply
    }
}

fn sign_session_pair(
    keys: &SessionKeys,
    user: &User,
) -> Result<AuthResponse, (StatusCode, String)> {
    let access_token = keys.sign_access(user.id).map_err(internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(internal)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            confirmed: user.confirmed,
        },
    })
}

async fn send_confirmation_mail(state: &AppState, user: &User) {
    let tokens = AccountTokens::from_ref(state);
    let token = match tokens.generate_default(user.id, TokenPurpose::Confirm) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "confirm token generation failed");
            return;
        }
    };
    let body = format!(
        "Hello {},\n\nTo confirm your account, open:\n/api/v1/auth/confirm/{}\n",
        user.username, token
    );
    if let Err(e) = state.mailer.send(&user.email, "Confirm Your Account", &body).await {
        error!(error = %e, user_id = %user.id, "confirmation mail failed");
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err((StatusCode::BAD_REQUEST, "Invalid username".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    // Uniqueness checks surface as typed conflicts, not exceptions.
    match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err((StatusCode::CONFLICT, "Email already registered".into()));
        }
        Ok(None) => {}
        Err(e) => return Err(internal(e)),
    }
    match User::find_by_username(&state.db, &payload.username).await {
        Ok(Some(_)) => {
            warn!(username = %payload.username, "username already taken");
            return Err((StatusCode::CONFLICT, "Username already taken".into()));
        }
        Ok(None) => {}
        Err(e) => return Err(internal(e)),
    }

    let hash = hash_password(&payload.password).map_err(internal)?;

    let user = User::create(
        &state.db,
        &payload.email,
        &payload.username,
        &hash,
        state.config.admin_email.as_deref(),
    )
    .await
    .map_err(internal)?;

    send_confirmation_mail(&state, &user).await;

    let keys = SessionKeys::from_ref(&state);
    let response = sign_session_pair(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => return Err(internal(e)),
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(internal)?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    if let Err(e) = User::ping(&state.db, user.id).await {
        warn!(error = %e, user_id = %user.id, "last_seen update failed");
    }

    let keys = SessionKeys::from_ref(&state);
    let response = sign_session_pair(&keys, &user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = SessionKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    let user = match User::find_by_id(&state.db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => return Err(internal(e)),
    };

    let response = sign_session_pair(&keys, &user)?;
    Ok(Json(response))
}

/// Completes email confirmation. The token must verify for the `confirm`
/// purpose and its embedded user id must match the authenticated session;
/// a cryptographically valid token for a different account is rejected.
#[instrument(skip(state, token))]
pub async fn confirm(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let tokens = AccountTokens::from_ref(&state);
    let token_user = match tokens.verify(&token, TokenPurpose::Confirm) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, user_id = %user_id, "confirm token rejected");
            return Err((StatusCode::BAD_REQUEST, CONFIRM_FAILED.into()));
        }
    };

    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => return Err(internal(e)),
    };

    match evaluate_confirm(token_user, user_id, user.confirmed) {
        ConfirmOutcome::Mismatch => {
            warn!(token_user = %token_user, user_id = %user_id, "confirm token user mismatch");
            return Err((StatusCode::BAD_REQUEST, CONFIRM_FAILED.into()));
        }
        ConfirmOutcome::AlreadyConfirmed => {}
        ConfirmOutcome::Apply => {
            User::set_confirmed(&state.db, user_id)
                .await
                .map_err(internal)?;
            info!(user_id = %user_id, "account confirmed");
        }
    }

    Ok(Json(MessageResponse {
        message: "You have confirmed your account. Thanks!".into(),
    }))
}

#[instrument(skip(state))]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => return Err((StatusCode::UNAUTHORIZED, "User not found".into())),
        Err(e) => return Err(internal(e)),
    };

    if user.confirmed {
        return Ok(Json(MessageResponse {
            message: "Your account is already confirmed.".into(),
        }));
    }

    send_confirmation_mail(&state, &user).await;
    Ok(Json(MessageResponse {
        message: "A new confirmation email has been sent to you.".into(),
    }))
}

/// Starts a password reset. Answers identically whether or not the email is
/// registered, so the endpoint cannot be used to enumerate accounts. The
/// flow is unauthenticated: locked-out users must be able to reach it.
#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if let Ok(Some(user)) = User::find_by_email(&state.db, &payload.email).await {
        let tokens = AccountTokens::from_ref(&state);
        match tokens.generate_default(user.id, TokenPurpose::Reset) {
            Ok(token) => {
                let body = format!(
                    "Hello {},\n\nTo reset your password, open:\n/api/v1/auth/reset/{}\n\n\
                     If you did not request a reset, ignore this message.\n",
                    user.username, token
                );
                if let Err(e) = state.mailer.send(&user.email, "Reset Your Password", &body).await
                {
                    error!(error = %e, user_id = %user.id, "reset mail failed");
                }
                info!(user_id = %user.id, "password reset requested");
            }
            Err(e) => error!(error = %e, user_id = %user.id, "reset token generation failed"),
        }
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED.into(),
    }))
}

/// Completes a password reset. The user to mutate is resolved from the
/// verified token payload only; client-supplied identity is never trusted
/// here, so a token for user A cannot rewrite user B's password.
#[instrument(skip(state, token, payload))]
pub async fn submit_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetSubmitRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    if payload.password.len() < 8 {
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let tokens = AccountTokens::from_ref(&state);
    let user_id = match tokens.verify(&token, TokenPurpose::Reset) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "reset token rejected");
            return Err((StatusCode::BAD_REQUEST, RESET_FAILED.into()));
        }
    };

    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = %user_id, "reset token for unknown user");
            return Err((StatusCode::BAD_REQUEST, RESET_FAILED.into()));
        }
        Err(e) => return Err(internal(e)),
    };

    let hash = hash_password(&payload.password).map_err(internal)?;
    User::update_password(&state.db, user.id, &hash)
        .await
        .map_err(internal)?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Your password has been updated.".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, (StatusCode, String)> {
    let actor = Actor::load(&state.db, user_id).await.map_err(internal)?;
    let Actor::Authenticated { user, role } = actor else {
        return Err((StatusCode::UNAUTHORIZED, "User not found".into()));
    };

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        confirmed: user.confirmed,
        role: role.name,
        permissions: role.permissions,
        about_me: user.about_me,
        member_since: user.member_since,
        last_seen: user.last_seen,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a_b-c.d"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("1starts-with-digit"));
        assert!(!is_valid_username("has spaces"));
    }

    #[test]
    fn confirming_twice_is_idempotent() {
        let user = Uuid::new_v4();
        // First presentation of the token applies the flag.
        assert_eq!(evaluate_confirm(user, user, false), ConfirmOutcome::Apply);
        // Presenting the same token again succeeds without another write.
        assert_eq!(
            evaluate_confirm(user, user, true),
            ConfirmOutcome::AlreadyConfirmed
        );
    }

    #[test]
    fn confirm_rejects_token_for_another_account() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        assert_eq!(evaluate_confirm(alice, bob, false), ConfirmOutcome::Mismatch);
        assert_eq!(evaluate_confirm(alice, bob, true), ConfirmOutcome::Mismatch);
    }

    #[test]
    fn auth_response_hides_nothing_it_should_not() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            username: "test".to_string(),
            confirmed: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"confirmed\":false"));
    }
}
