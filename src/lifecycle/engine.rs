//! Leave-request lifecycle.
//!
//! Every legal transition lives in [`TRANSITIONS`], keyed by the acting
//! role, the current state and the requested action. Nothing here touches
//! storage: callers pass the record and the clock in and persist whatever
//! [`Decision`] comes back.

use chrono::{DateTime, NaiveDate, Utc};
use strum_macros::Display;

use crate::error::{AppError, Result};
use crate::model::leave_request::{LeaveRequest, LeaveState, Movement};
use crate::model::role::Role;
use crate::model::user::normalize_email;

/// Caller identity as established by authentication.
#[derive(Debug, Clone)]
pub struct Actor {
    pub role: Role,
    /// Normalized email
    pub email: String,
}

impl Actor {
    pub fn new(role: Role, email: &str) -> Self {
        Actor {
            role,
            email: normalize_email(email),
        }
    }

    fn owns(&self, leave: &LeaveRequest) -> bool {
        self.email == leave.student_email
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    Approve,
    Reject,
    /// Scan of a pass that has not been approved yet
    ScanApprove,
    ScanExit,
    ScanReturn,
    Delete,
}

impl Action {
    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            Action::ScanApprove | Action::ScanExit | Action::ScanReturn
        )
    }
}

#[derive(Debug, Copy, Clone)]
enum FromState {
    Any,
    Exactly(LeaveState),
}

impl FromState {
    fn matches(&self, state: &LeaveState) -> bool {
        match self {
            FromState::Any => true,
            FromState::Exactly(s) => s == state,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Target {
    State(LeaveState),
    Removed,
}

#[derive(Debug)]
struct Transition {
    role: Role,
    from: FromState,
    action: Action,
    to: Target,
}

const APPROVED_IN: LeaveState = LeaveState::Approved {
    movement: Movement::In,
};
const APPROVED_OUT: LeaveState = LeaveState::Approved {
    movement: Movement::Out,
};

const fn rule(role: Role, from: FromState, action: Action, to: Target) -> Transition {
    Transition {
        role,
        from,
        action,
        to,
    }
}

static TRANSITIONS: &[Transition] = &[
    rule(Role::Warden, FromState::Exactly(LeaveState::Pending), Action::Approve, Target::State(APPROVED_IN)),
    rule(Role::Warden, FromState::Exactly(LeaveState::Pending), Action::Reject, Target::State(LeaveState::Rejected)),
    rule(Role::Security, FromState::Exactly(LeaveState::Pending), Action::ScanApprove, Target::State(APPROVED_IN)),
    rule(Role::Security, FromState::Exactly(APPROVED_IN), Action::ScanExit, Target::State(APPROVED_OUT)),
    rule(Role::Security, FromState::Exactly(APPROVED_OUT), Action::ScanReturn, Target::State(LeaveState::Completed)),
    rule(Role::Student, FromState::Exactly(LeaveState::Pending), Action::Delete, Target::Removed),
    rule(Role::Warden, FromState::Any, Action::Delete, Target::Removed),
    rule(Role::Security, FromState::Any, Action::Delete, Target::Removed),
];

/// Switches that narrow the table without editing it.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Whether a scan may approve a request no warden has decided on yet.
    pub auto_approve_on_scan: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            auto_approve_on_scan: true,
        }
    }
}

impl Policy {
    fn permits(&self, action: Action) -> bool {
        action != Action::ScanApprove || self.auto_approve_on_scan
    }
}

/// Outcome of a legal transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Update(LeaveRequest),
    Remove,
}

pub fn lookup(role: Role, state: &LeaveState, action: Action, policy: &Policy) -> Option<Target> {
    if !policy.permits(action) {
        return None;
    }

    TRANSITIONS
        .iter()
        .find(|t| t.role == role && t.action == action && t.from.matches(state))
        .map(|t| t.to)
}

/// True if the role holds any scan transition at all.
pub fn can_scan(role: Role) -> bool {
    TRANSITIONS
        .iter()
        .any(|t| t.role == role && t.action.is_scan())
}

/// Validate and build a new pending request for a student.
pub fn create(
    actor: &Actor,
    id: String,
    from_date: Option<&str>,
    to_date: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LeaveRequest> {
    if actor.role != Role::Student {
        return Err(AppError::InvalidTransition(format!(
            "Only students can create leave requests (role: {})",
            actor.role
        )));
    }

    let (from_raw, to_raw) = match (non_blank(from_date), non_blank(to_date)) {
        (Some(f), Some(t)) => (f, t),
        _ => {
            return Err(AppError::Validation(
                "From date and to date are required".into(),
            ));
        }
    };

    let from_date = parse_date(from_raw)?;
    let to_date = parse_date(to_raw)?;

    if from_date > to_date {
        return Err(AppError::Validation(
            "fromDate cannot be after toDate".into(),
        ));
    }

    Ok(LeaveRequest {
        id,
        student_email: normalize_email(&actor.email),
        from_date,
        to_date,
        state: LeaveState::Pending,
        approved_at: None,
        approved_by: None,
        created_at: now,
        updated_at: now,
        version: 0,
    })
}

/// Students may only see their own requests.
pub fn authorize_read(actor: &Actor, leave: &LeaveRequest) -> Result<()> {
    if !actor.role.is_privileged() && !actor.owns(leave) {
        return Err(AppError::AccessDenied("Access denied".into()));
    }
    Ok(())
}

/// Decide what `action` by `actor` does to `leave`.
///
/// The returned record is `leave` moved to its next state; `version` is left
/// as read so the store can compare against it.
pub fn decide(
    actor: &Actor,
    leave: &LeaveRequest,
    action: Action,
    policy: &Policy,
    now: DateTime<Utc>,
) -> Result<Decision> {
    authorize_read(actor, leave)?;

    let target = lookup(actor.role, &leave.state, action, policy).ok_or_else(|| {
        AppError::InvalidTransition(format!(
            "Cannot {} a {} request (role: {})",
            action,
            leave.state.status(),
            actor.role
        ))
    })?;

    match target {
        Target::Removed => Ok(Decision::Remove),
        Target::State(next) => {
            let mut updated = leave.clone();
            updated.state = next;
            updated.updated_at = now;

            if matches!(next, LeaveState::Approved { .. }) && updated.approved_at.is_none() {
                updated.approved_at = Some(now);
                updated.approved_by = Some(actor.email.clone());
            }

            Ok(Decision::Update(updated))
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::Status;
    use chrono::Duration;
    use strum::IntoEnumIterator;

    const ALL_STATES: [LeaveState; 5] = [
        LeaveState::Pending,
        APPROVED_IN,
        APPROVED_OUT,
        LeaveState::Rejected,
        LeaveState::Completed,
    ];

    const ALL_ACTIONS: [Action; 6] = [
        Action::Approve,
        Action::Reject,
        Action::ScanApprove,
        Action::ScanExit,
        Action::ScanReturn,
        Action::Delete,
    ];

    fn student() -> Actor {
        Actor::new(Role::Student, "student@x.com")
    }

    fn warden() -> Actor {
        Actor::new(Role::Warden, "warden@x.com")
    }

    fn security() -> Actor {
        Actor::new(Role::Security, "security@x.com")
    }

    fn pending() -> LeaveRequest {
        create(
            &student(),
            "req-1".into(),
            Some("2024-01-01"),
            Some("2024-01-05"),
            Utc::now(),
        )
        .unwrap()
    }

    fn with_state(state: LeaveState) -> LeaveRequest {
        LeaveRequest {
            state,
            ..pending()
        }
    }

    fn apply(actor: &Actor, leave: &LeaveRequest, action: Action) -> Result<LeaveRequest> {
        match decide(actor, leave, action, &Policy::default(), Utc::now())? {
            Decision::Update(next) => Ok(next),
            Decision::Remove => panic!("unexpected removal"),
        }
    }

    #[test]
    fn create_starts_pending_and_in() {
        let leave = pending();
        assert_eq!(leave.state, LeaveState::Pending);
        assert_eq!(leave.state.status(), Status::Pending);
        assert_eq!(leave.state.movement(), Movement::In);
        assert_eq!(leave.student_email, "student@x.com");
        assert_eq!(leave.from_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(leave.approved_at.is_none());
        assert!(leave.approved_by.is_none());
    }

    #[test]
    fn create_requires_both_dates() {
        let err = create(&student(), "x".into(), None, Some("2024-01-05"), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create(&student(), "x".into(), Some("2024-01-01"), Some("  "), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_rejects_bad_or_reversed_dates() {
        let err = create(&student(), "x".into(), Some("01/01/2024"), Some("2024-01-05"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create(&student(), "x".into(), Some("2024-01-06"), Some("2024-01-05"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn only_students_create() {
        for actor in [warden(), security()] {
            let err = create(&actor, "x".into(), Some("2024-01-01"), Some("2024-01-05"), Utc::now())
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn warden_approval_sets_bookkeeping() {
        let now = Utc::now();
        let decided = decide(&warden(), &pending(), Action::Approve, &Policy::default(), now).unwrap();
        let Decision::Update(leave) = decided else {
            panic!("expected update");
        };
        assert_eq!(leave.state, APPROVED_IN);
        assert_eq!(leave.approved_at, Some(now));
        assert_eq!(leave.approved_by.as_deref(), Some("warden@x.com"));
        assert_eq!(leave.updated_at, now);
    }

    #[test]
    fn warden_rejection_is_terminal() {
        let rejected = apply(&warden(), &pending(), Action::Reject).unwrap();
        assert_eq!(rejected.state, LeaveState::Rejected);
        assert!(rejected.approved_at.is_none());

        for action in ALL_ACTIONS.into_iter().filter(|a| *a != Action::Delete) {
            for actor in [student(), warden(), security()] {
                assert!(decide(&actor, &rejected, action, &Policy::default(), Utc::now()).is_err());
            }
        }
    }

    #[test]
    fn approving_twice_is_invalid() {
        let approved = apply(&warden(), &pending(), Action::Approve).unwrap();
        let err = apply(&warden(), &approved, Action::Approve).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn full_movement_cycle_keeps_approval() {
        let approved = apply(&warden(), &pending(), Action::Approve).unwrap();
        let out = apply(&security(), &approved, Action::ScanExit).unwrap();
        assert_eq!(out.state, APPROVED_OUT);

        let later = Utc::now() + Duration::hours(3);
        let Decision::Update(done) =
            decide(&security(), &out, Action::ScanReturn, &Policy::default(), later).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(done.state, LeaveState::Completed);
        assert_eq!(done.state.movement(), Movement::In);
        assert_eq!(done.approved_at, approved.approved_at);
        assert_eq!(done.approved_by, approved.approved_by);
        assert_eq!(done.updated_at, later);
    }

    #[test]
    fn scan_approval_credits_security() {
        let leave = apply(&security(), &pending(), Action::ScanApprove).unwrap();
        assert_eq!(leave.state, APPROVED_IN);
        assert_eq!(leave.approved_by.as_deref(), Some("security@x.com"));
    }

    #[test]
    fn scan_approval_can_be_switched_off() {
        let policy = Policy {
            auto_approve_on_scan: false,
        };
        let err = decide(&security(), &pending(), Action::ScanApprove, &policy, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(can_scan(Role::Security));
    }

    #[test]
    fn scan_approval_never_revives_rejected() {
        let rejected = with_state(LeaveState::Rejected);
        let err = apply(&security(), &rejected, Action::ScanApprove).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn students_cannot_touch_others_requests() {
        let other = Actor::new(Role::Student, "other@x.com");
        let leave = pending();
        assert!(matches!(
            authorize_read(&other, &leave).unwrap_err(),
            AppError::AccessDenied(_)
        ));
        for action in ALL_ACTIONS {
            let err = decide(&other, &leave, action, &Policy::default(), Utc::now()).unwrap_err();
            assert!(matches!(err, AppError::AccessDenied(_)));
        }
    }

    #[test]
    fn owner_deletes_only_while_pending() {
        let decision = decide(&student(), &pending(), Action::Delete, &Policy::default(), Utc::now());
        assert_eq!(decision.unwrap(), Decision::Remove);

        for state in [APPROVED_IN, APPROVED_OUT, LeaveState::Rejected, LeaveState::Completed] {
            let err = decide(&student(), &with_state(state), Action::Delete, &Policy::default(), Utc::now())
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn staff_delete_anything() {
        for actor in [warden(), security()] {
            for state in ALL_STATES {
                let decision =
                    decide(&actor, &with_state(state), Action::Delete, &Policy::default(), Utc::now());
                assert_eq!(decision.unwrap(), Decision::Remove);
            }
        }
    }

    #[test]
    fn only_security_scans() {
        assert!(can_scan(Role::Security));
        assert!(!can_scan(Role::Warden));
        assert!(!can_scan(Role::Student));
    }

    #[test]
    fn every_unlisted_triple_is_refused() {
        let allowed = |role: Role, state: LeaveState, action: Action| -> bool {
            match (role, action) {
                (Role::Warden | Role::Security, Action::Delete) => true,
                (Role::Student, Action::Delete) => state == LeaveState::Pending,
                (Role::Warden, Action::Approve | Action::Reject) => state == LeaveState::Pending,
                (Role::Security, Action::ScanApprove) => state == LeaveState::Pending,
                (Role::Security, Action::ScanExit) => state == APPROVED_IN,
                (Role::Security, Action::ScanReturn) => state == APPROVED_OUT,
                _ => false,
            }
        };

        for role in Role::iter() {
            let actor = Actor::new(role, "student@x.com");
            for state in ALL_STATES {
                let leave = with_state(state);
                for action in ALL_ACTIONS {
                    let result = decide(&actor, &leave, action, &Policy::default(), Utc::now());
                    if allowed(role, state, action) {
                        assert!(result.is_ok(), "{role} {action} on {state:?}");
                    } else {
                        assert!(
                            matches!(result, Err(AppError::InvalidTransition(_))),
                            "{role} {action} on {state:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn action_names_read_naturally() {
        assert_eq!(Action::ScanExit.to_string(), "scan-exit");
        assert_eq!(Action::Approve.to_string(), "approve");
    }
}
