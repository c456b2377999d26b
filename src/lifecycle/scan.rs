//! QR pass handling: building the pass text for a student and turning a
//! scanned pass back into a lifecycle action.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::lifecycle::engine::Action;
use crate::model::leave_request::{LeaveRequest, LeaveState, Movement};
use crate::model::user::normalize_email;

pub const ALREADY_COMPLETED: &str = "This request is already completed";

/// Content of a QR pass. Only `id` and `email` carry authority; the rest is
/// printed on the pass for the guard's benefit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[schema(example = "1b4e28ba-2fa1-11d2-883f-0016d3cca427")]
    pub id: String,
    #[schema(example = "student@example.com")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "2026-01-01")]
    pub from: Option<String>,
    #[serde(default)]
    #[schema(example = "2026-01-05")]
    pub to: Option<String>,
    #[serde(default)]
    #[schema(example = "2026-01-01T09:00:00+00:00")]
    pub approved_at: Option<String>,
}

impl QrPayload {
    pub fn for_leave(leave: &LeaveRequest) -> Self {
        QrPayload {
            id: leave.id.clone(),
            email: leave.student_email.clone(),
            from: Some(leave.from_date.format("%Y-%m-%d").to_string()),
            to: Some(leave.to_date.format("%Y-%m-%d").to_string()),
            approved_at: leave.approved_at.map(|at| at.to_rfc3339()),
        }
    }

    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(e.to_string()))
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScanIntent {
    Apply(Action),
    AlreadyCompleted,
}

/// Read decoded QR text. Anything that is not a pass asks for a rescan.
pub fn parse(text: &str) -> Result<QrPayload> {
    let payload: QrPayload =
        serde_json::from_str(text.trim()).map_err(|_| AppError::InvalidPayload)?;

    if payload.id.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::InvalidPayload);
    }

    Ok(payload)
}

/// Map a pass onto what should happen to the stored request.
///
/// Only the stored record decides the action; whatever state the pass text
/// claims is ignored. Returns the matched record alongside the intent.
pub fn interpret<'a>(
    payload: &QrPayload,
    stored: Option<&'a LeaveRequest>,
) -> Result<(ScanIntent, &'a LeaveRequest)> {
    let leave = stored.ok_or(AppError::PayloadMismatch)?;

    if leave.id != payload.id.trim() || leave.student_email != normalize_email(&payload.email) {
        return Err(AppError::PayloadMismatch);
    }

    let intent = match leave.state {
        LeaveState::Pending | LeaveState::Rejected => ScanIntent::Apply(Action::ScanApprove),
        LeaveState::Approved {
            movement: Movement::In,
        } => ScanIntent::Apply(Action::ScanExit),
        LeaveState::Approved {
            movement: Movement::Out,
        } => ScanIntent::Apply(Action::ScanReturn),
        LeaveState::Completed => ScanIntent::AlreadyCompleted,
    };

    Ok((intent, leave))
}

/// What the guard sees after a scan was applied.
pub fn outcome_message(action: Action) -> &'static str {
    match action {
        Action::ScanApprove => "Request approved and marked IN",
        Action::ScanExit => "Movement changed: IN → OUT",
        Action::ScanReturn => "Request completed - student returned",
        _ => "Request updated",
    }
}
