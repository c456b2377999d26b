use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::lifecycle::engine::Action;
use crate::lifecycle::scan::QrPayload;
use crate::model::leave_request::{LeaveResponse, Status};
use crate::service::{LeaveService, ListQuery, ScanResult, Verdict};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date")]
    pub from_date: Option<String>,
    #[schema(example = "2026-01-05", format = "date")]
    pub to_date: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveFilter {
    #[schema(example = "student@example.com")]
    /// Filter by student (ignored for students, who only see their own)
    pub student_email: Option<String>,
    #[schema(example = "pending")]
    /// Filter by status: pending, approved, rejected or completed
    pub status: Option<String>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    #[schema(example = 50)]
    /// Items per page, at most 100
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 50)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Decoded QR text exactly as read from the pass
    #[schema(example = r#"{"id":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","email":"student@example.com","from":"2026-01-01","to":"2026-01-05","approvedAt":null}"#)]
    pub payload: String,
}

#[derive(Serialize, ToSchema)]
pub struct ScanResponse {
    /// approved, moved_out, completed or already_completed
    #[schema(example = "moved_out")]
    pub outcome: &'static str,
    #[schema(example = "Movement changed: IN → OUT")]
    pub message: &'static str,
    pub request: LeaveResponse,
}

#[derive(Serialize, ToSchema)]
pub struct PassResponse {
    /// Text to encode in the QR image
    pub payload: String,
    pub pass: QrPayload,
}

fn outcome_name(result: ScanResult) -> &'static str {
    match result {
        ScanResult::Applied(Action::ScanApprove) => "approved",
        ScanResult::Applied(Action::ScanExit) => "moved_out",
        ScanResult::Applied(Action::ScanReturn) => "completed",
        ScanResult::Applied(_) => "updated",
        ScanResult::AlreadyCompleted => "already_completed",
    }
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/requests",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn list_requests(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let query = query.into_inner();

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<Status>()
                .map_err(|_| AppError::Validation(format!("Unknown status '{}'", s)))
        })
        .transpose()?;

    let page = service
        .list(
            &auth.actor(),
            ListQuery {
                student_email: query.student_email,
                status,
                page: query.page,
                per_page: query.per_page,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: page.data.iter().map(LeaveResponse::from).collect(),
        page: page.page,
        per_page: page.per_page,
        total: page.total,
    }))
}

/* =========================
Create leave request (student)
========================= */
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Missing or invalid dates, or caller is not a student"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_request(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let leave = service
        .create(
            &auth.actor(),
            payload.from_date.as_deref(),
            payload.to_date.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Created().json(LeaveResponse::from(&leave)))
}

/* =========================
Get one leave request
========================= */
#[utoipa::path(
    get,
    path = "/api/requests/{request_id}",
    params(
        ("request_id" = String, Path, description = "ID of the leave request")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Request belongs to another student"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "error": "Request 42 not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_request(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let leave = service.get(&auth.actor(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(&leave)))
}

async fn decide(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
    verdict: Verdict,
) -> actix_web::Result<HttpResponse> {
    let leave = service
        .decide(&auth.actor(), &path.into_inner(), verdict)
        .await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(&leave)))
}

/* =========================
Approve leave (warden)
========================= */
#[utoipa::path(
    put,
    path = "/api/requests/{request_id}/approve",
    params(
        ("request_id" = String, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved, movement IN", body = LeaveResponse),
        (status = 400, description = "Request already decided or caller is not a warden"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_request(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    decide(auth, service, path, Verdict::Approve).await
}

/* =========================
Reject leave (warden)
========================= */
#[utoipa::path(
    put,
    path = "/api/requests/{request_id}/reject",
    params(
        ("request_id" = String, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveResponse),
        (status = 400, description = "Request already decided or caller is not a warden"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request changed concurrently")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_request(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    decide(auth, service, path, Verdict::Reject).await
}

/* =========================
Delete leave request
========================= */
#[utoipa::path(
    delete,
    path = "/api/requests/{request_id}",
    params(
        ("request_id" = String, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 200, description = "Request deleted", body = Object, example = json!({
            "message": "Request deleted successfully"
        })),
        (status = 400, description = "Students can only delete pending requests"),
        (status = 403, description = "Request belongs to another student"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_request(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    service.remove(&auth.actor(), &path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Request deleted successfully"
    })))
}

/* =========================
QR pass for an approved request (owning student)
========================= */
#[utoipa::path(
    get,
    path = "/api/requests/{request_id}/pass",
    params(
        ("request_id" = String, Path, description = "ID of the approved leave request")
    ),
    responses(
        (status = 200, description = "Pass text to render as QR", body = PassResponse),
        (status = 400, description = "Request is not approved"),
        (status = 403, description = "Caller is not the requesting student"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_pass(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let pass = service.issue_pass(&auth.actor(), &path.into_inner()).await?;
    let payload = pass.to_text()?;

    Ok(HttpResponse::Ok().json(PassResponse { payload, pass }))
}

/* =========================
Scan a pass (security)
========================= */
#[utoipa::path(
    post,
    path = "/api/requests/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan applied, or request already completed", body = ScanResponse),
        (status = 400, description = "Caller cannot scan, or the request cannot move from its state"),
        (status = 409, description = "Request changed concurrently, rescan"),
        (status = 422, description = "Unreadable or unknown pass, rescan", body = Object, example = json!({
            "error": "Invalid QR code - request not found",
            "rescan": true
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Scan"
)]
pub async fn scan_pass(
    auth: AuthUser,
    service: web::Data<LeaveService>,
    body: web::Json<ScanRequest>,
) -> actix_web::Result<impl Responder> {
    let outcome = service.apply_scan(&auth.actor(), &body.payload).await?;

    Ok(HttpResponse::Ok().json(ScanResponse {
        outcome: outcome_name(outcome.result),
        message: outcome.message,
        request: LeaveResponse::from(&outcome.request),
    }))
}
