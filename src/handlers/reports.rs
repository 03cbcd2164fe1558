use crate::auth::AuthUser;
use crate::db::models::{Priority, Report, ReportDraft, ReportFilter, ReportKind, ReportStats, ReportStatus, Role};
use crate::error::{ApiResponse, AppError, AppJson, AppQuery, AppResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

fn parse_opt<T: std::str::FromStr<Err = String>>(
    raw: Option<&str>,
    errors: &mut Vec<String>,
) -> Option<T> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn required(value: &str, field: &str, errors: &mut Vec<String>) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{field} is required"));
    }
    value.to_string()
}

pub async fn create_report(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<CreateReportRequest>,
) -> AppResult<(StatusCode, ApiResponse<Report>)> {
    let mut errors = Vec::new();
    let category = required(&req.category, "Category", &mut errors);
    let location = required(&req.location, "Location", &mut errors);
    let description = required(&req.description, "Description", &mut errors);
    let kind: Option<ReportKind> = parse_opt(req.kind.as_deref(), &mut errors);
    let priority: Option<Priority> = parse_opt(req.priority.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let draft = ReportDraft {
        kind: kind.unwrap_or_default(),
        category,
        location,
        description,
        priority: priority.unwrap_or_default(),
    };
    let report = state.db.create_report(user.id(), &draft)?;
    tracing::info!(reference = %report.reference, kind = %report.kind, user = %user.0.email, "report filed");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Report submitted successfully", report),
    ))
}

/// Students see their own reports; admins and staff see everything.
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<ReportQuery>,
) -> AppResult<ApiResponse<Vec<Report>>> {
    let mut errors = Vec::new();
    let status: Option<ReportStatus> = parse_opt(query.status.as_deref(), &mut errors);
    let kind: Option<ReportKind> = parse_opt(query.kind.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let filter = ReportFilter {
        user_id: (!user.is_privileged()).then(|| user.id().to_string()),
        status,
        kind,
    };
    Ok(ApiResponse::data(state.db.list_reports(&filter)?))
}

pub async fn report_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<ApiResponse<ReportStats>> {
    user.require_role(&[Role::Admin, Role::Staff])?;
    Ok(ApiResponse::data(state.db.report_stats()?))
}

pub async fn get_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Report>> {
    let report = state
        .db
        .get_report(&id)?
        .filter(|r| user.is_privileged() || r.user_id == user.id())
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;
    Ok(ApiResponse::data(report))
}

pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<StatusRequest>,
) -> AppResult<ApiResponse<Report>> {
    user.require_role(&[Role::Admin, Role::Staff])?;
    let status: ReportStatus = req
        .status
        .parse()
        .map_err(|e: String| AppError::Validation(vec![e]))?;
    let report = state
        .db
        .update_report_status(&id, status)?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;
    tracing::info!(reference = %report.reference, status = %report.status, by = %user.0.email, "report status changed");
    Ok(ApiResponse::with_message("Report status updated", report))
}
