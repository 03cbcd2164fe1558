use crate::auth::{hash_password, issue_token, validate_email, verify_password, AuthUser};
use crate::db::models::{Role, User};
use crate::error::{ApiResponse, AppError, AppJson, AppResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub const MAX_NAME_CHARS: usize = 50;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_name(name: &str, errors: &mut Vec<String>) {
    if name.is_empty() {
        errors.push("Name is required".to_string());
    } else if name.chars().count() > MAX_NAME_CHARS {
        errors.push(format!(
            "Name cannot be more than {MAX_NAME_CHARS} characters"
        ));
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if !validate_email(email) {
        errors.push("Please provide a valid email".to_string());
    }
}

fn token_for(state: &AppState, user: &User) -> AppResult<String> {
    Ok(issue_token(
        &user.id,
        &state.config.jwt_secret,
        state.config.jwt_expires_days,
    )?)
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, ApiResponse<AuthPayload>)> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    tracing::info!(%email, "signup attempt");

    let mut errors = Vec::new();
    check_name(&name, &mut errors);
    check_email(&email, &mut errors);
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        ));
    }
    let requested_role = match req.role.as_deref().filter(|r| !r.trim().is_empty()) {
        None => Role::Student,
        Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
            errors.push(e);
            Role::Student
        }),
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let role = if requested_role != Role::Student && !state.config.allow_privileged_signup {
        tracing::warn!(%email, requested = %requested_role, "privileged signup disabled, creating student");
        Role::Student
    } else {
        requested_role
    };

    if state.db.email_taken(&email, None)? {
        return Err(AppError::BadRequest(
            "User already exists with this email".to_string(),
        ));
    }

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = state
        .db
        .create_user(&name, &email, &hash, role)
        .map_err(|e| {
            if e.is_constraint_violation() {
                AppError::BadRequest("User already exists with this email".to_string())
            } else {
                e.into()
            }
        })?;
    let token = token_for(&state, &user)?;
    tracing::info!(user = %user.email, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", AuthPayload { user, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let email = normalize_email(&req.email);

    let mut errors = Vec::new();
    check_email(&email, &mut errors);
    if req.password.is_empty() {
        errors.push("Password is required".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = state.db.find_user_by_email(&email)?.ok_or_else(|| {
        tracing::info!(%email, "login for unknown email");
        invalid()
    })?;

    if !user.is_active {
        return Err(AppError::Unauthorized(
            "Your account has been deactivated".to_string(),
        ));
    }

    let password = req.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    if !matches {
        tracing::info!(%email, "login with wrong password");
        return Err(invalid());
    }

    let token = token_for(&state, &user)?;
    tracing::info!(user = %user.email, "login successful");
    Ok(ApiResponse::with_message(
        "Login successful",
        AuthPayload { user, token },
    ))
}

pub async fn me(user: AuthUser) -> ApiResponse<UserPayload> {
    ApiResponse::data(UserPayload { user: user.0 })
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<ProfileRequest>,
) -> AppResult<ApiResponse<UserPayload>> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let email = req
        .email
        .map(|e| normalize_email(&e))
        .filter(|e| !e.is_empty());

    let mut errors = Vec::new();
    if let Some(name) = &name {
        check_name(name, &mut errors);
    }
    if let Some(email) = &email {
        check_email(email, &mut errors);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if let Some(email) = &email {
        if state.db.email_taken(email, Some(user.id()))? {
            return Err(AppError::BadRequest("Email already in use".to_string()));
        }
    }

    let updated = state
        .db
        .update_profile(user.id(), name.as_deref(), email.as_deref())?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    tracing::info!(user = %updated.email, "profile updated");

    Ok(ApiResponse::with_message(
        "Profile updated successfully",
        UserPayload { user: updated },
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<ApiResponse<Vec<User>>> {
    user.require_role(&[Role::Admin])?;
    Ok(ApiResponse::data(state.db.list_users()?))
}

pub async fn set_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<ActiveRequest>,
) -> AppResult<ApiResponse<UserPayload>> {
    user.require_role(&[Role::Admin])?;
    if id == user.id() {
        return Err(AppError::BadRequest(
            "You cannot change your own account status".to_string(),
        ));
    }
    let updated = state
        .db
        .set_user_active(&id, req.is_active)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    tracing::info!(target_user = %updated.email, active = updated.is_active, by = %user.0.email, "account status changed");
    Ok(ApiResponse::data(UserPayload { user: updated }))
}
