use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Movement {
    #[default]
    In,
    Out,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
    Completed,
}

/// Lifecycle position of a leave request.
///
/// Movement only exists while the request is approved, so a pending request
/// that is "out" cannot be built.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LeaveState {
    Pending,
    Approved { movement: Movement },
    Rejected,
    Completed,
}

impl LeaveState {
    pub fn status(&self) -> Status {
        match self {
            LeaveState::Pending => Status::Pending,
            LeaveState::Approved { .. } => Status::Approved,
            LeaveState::Rejected => Status::Rejected,
            LeaveState::Completed => Status::Completed,
        }
    }

    /// Flattened movement; `in` for every state but an approved request that is out.
    pub fn movement(&self) -> Movement {
        match self {
            LeaveState::Approved { movement } => *movement,
            _ => Movement::In,
        }
    }

    /// Rebuild the state from its stored columns. Rejects combinations the
    /// lifecycle never produces.
    pub fn from_parts(status: Status, movement: Movement) -> Option<Self> {
        match (status, movement) {
            (Status::Pending, Movement::In) => Some(LeaveState::Pending),
            (Status::Approved, movement) => Some(LeaveState::Approved { movement }),
            (Status::Rejected, Movement::In) => Some(LeaveState::Rejected),
            (Status::Completed, Movement::In) => Some(LeaveState::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: String,
    pub student_email: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub state: LeaveState,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Raw `leave_requests` row.
#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRow {
    pub id: String,
    pub student_email: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub status: String,
    pub movement: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = AppError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status: Status = row
            .status
            .parse()
            .map_err(|_| AppError::Internal(format!("Unknown status '{}' on {}", row.status, row.id)))?;
        let movement: Movement = row.movement.parse().map_err(|_| {
            AppError::Internal(format!("Unknown movement '{}' on {}", row.movement, row.id))
        })?;
        let state = LeaveState::from_parts(status, movement).ok_or_else(|| {
            AppError::Internal(format!(
                "Inconsistent lifecycle {}/{} on {}",
                status, movement, row.id
            ))
        })?;

        Ok(LeaveRequest {
            id: row.id,
            student_email: row.student_email,
            from_date: row.from_date,
            to_date: row.to_date,
            state,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    #[schema(example = "1b4e28ba-2fa1-11d2-883f-0016d3cca427")]
    pub id: String,
    #[schema(example = "student@example.com", format = "email")]
    pub student_email: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    pub status: Status,
    pub movement: Movement,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(example = "warden@example.com")]
    pub approved_by: Option<String>,
    #[schema(example = "2026-01-01T08:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<&LeaveRequest> for LeaveResponse {
    fn from(leave: &LeaveRequest) -> Self {
        LeaveResponse {
            id: leave.id.clone(),
            student_email: leave.student_email.clone(),
            from_date: leave.from_date,
            to_date: leave.to_date,
            status: leave.state.status(),
            movement: leave.state.movement(),
            approved_at: leave.approved_at,
            approved_by: leave.approved_by.clone(),
            created_at: leave.created_at,
            updated_at: leave.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, movement: &str) -> LeaveRow {
        let now = Utc::now();
        LeaveRow {
            id: "abc".into(),
            student_email: "student@example.com".into(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            status: status.into(),
            movement: movement.into(),
            approved_at: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[test]
    fn flattening_keeps_movement_in_outside_approval() {
        for state in [LeaveState::Pending, LeaveState::Rejected, LeaveState::Completed] {
            assert_eq!(state.movement(), Movement::In);
        }
        let out = LeaveState::Approved { movement: Movement::Out };
        assert_eq!(out.status(), Status::Approved);
        assert_eq!(out.movement(), Movement::Out);
    }

    #[test]
    fn row_decodes_into_state() {
        let leave = LeaveRequest::try_from(row("approved", "out")).unwrap();
        assert_eq!(leave.state, LeaveState::Approved { movement: Movement::Out });

        let leave = LeaveRequest::try_from(row("completed", "in")).unwrap();
        assert_eq!(leave.state, LeaveState::Completed);
    }

    #[test]
    fn row_with_illegal_combination_is_rejected() {
        assert!(LeaveRequest::try_from(row("pending", "out")).is_err());
        assert!(LeaveRequest::try_from(row("rejected", "out")).is_err());
        assert!(LeaveRequest::try_from(row("cancelled", "in")).is_err());
    }

    #[test]
    fn response_uses_camel_case_wire_names() {
        let leave = LeaveRequest::try_from(row("pending", "in")).unwrap();
        let json = serde_json::to_value(LeaveResponse::from(&leave)).unwrap();
        assert_eq!(json["studentEmail"], "student@example.com");
        assert_eq!(json["fromDate"], "2024-01-01");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["movement"], "in");
        assert!(json["approvedAt"].is_null());
    }
}
