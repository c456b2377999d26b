use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::lifecycle::engine::{self, Action, Actor, Decision, Policy};
use crate::lifecycle::scan::{self, QrPayload, ScanIntent};
use crate::model::leave_request::{LeaveRequest, LeaveState, Status};
use crate::model::role::Role;
use crate::model::user::normalize_email;
use crate::store::{LeaveFilter, Store};
use crate::utils::request_cache::RequestCache;

/// A warden's ruling on a pending request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl From<Verdict> for Action {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approve => Action::Approve,
            Verdict::Reject => Action::Reject,
        }
    }
}

#[derive(Debug, Default)]
pub struct ListQuery {
    pub student_email: Option<String>,
    pub status: Option<Status>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug)]
pub struct Page {
    pub data: Vec<LeaveRequest>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScanResult {
    Applied(Action),
    AlreadyCompleted,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub request: LeaveRequest,
    pub message: &'static str,
}

/// Entry points for everything that reads or changes a leave request.
///
/// Each mutation re-reads the stored row, lets the engine decide, and writes
/// conditionally on the version it read. The cache only serves plain reads.
#[derive(Clone)]
pub struct LeaveService {
    store: Store,
    cache: RequestCache,
    policy: Policy,
}

impl LeaveService {
    pub fn new(store: Store, cache: RequestCache, policy: Policy) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        from_date: Option<&str>,
        to_date: Option<&str>,
    ) -> Result<LeaveRequest> {
        let leave = engine::create(
            actor,
            Uuid::new_v4().to_string(),
            from_date,
            to_date,
            Utc::now(),
        )?;

        self.store.insert_leave(&leave).await?;
        self.cache.invalidate(&leave.id).await;

        info!(request_id = %leave.id, email = %leave.student_email, "Leave request created");
        Ok(leave)
    }

    pub async fn get(&self, actor: &Actor, id: &str) -> Result<LeaveRequest> {
        let leave = self
            .cache
            .get_or_load(id, || self.store.fetch_leave(id))
            .await?
            .ok_or_else(|| not_found(id))?;

        engine::authorize_read(actor, &leave)?;
        Ok(leave)
    }

    /// Students always see only their own requests, whatever they filter on.
    pub async fn list(&self, actor: &Actor, query: ListQuery) -> Result<Page> {
        let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);

        let student_email = if actor.role == Role::Student {
            Some(actor.email.clone())
        } else {
            query.student_email.as_deref().map(normalize_email)
        };

        let filter = LeaveFilter {
            student_email,
            status: query.status,
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        };

        let (data, total) = self.store.list_leaves(&filter).await?;
        Ok(Page {
            data,
            page,
            per_page,
            total,
        })
    }

    pub async fn decide(&self, actor: &Actor, id: &str, verdict: Verdict) -> Result<LeaveRequest> {
        let leave = self.load_fresh(id).await?;
        match self.apply(actor, &leave, verdict.into()).await? {
            Some(updated) => Ok(updated),
            None => Err(AppError::Internal("verdict removed a request".into())),
        }
    }

    pub async fn apply_scan(&self, actor: &Actor, text: &str) -> Result<ScanOutcome> {
        if !engine::can_scan(actor.role) {
            return Err(AppError::InvalidTransition(format!(
                "Cannot scan passes (role: {})",
                actor.role
            )));
        }

        let payload = scan::parse(text).inspect_err(|_| {
            debug!(scanned_by = %actor.email, "Unreadable pass scanned");
        })?;
        let stored = self.store.fetch_leave(payload.id.trim()).await?;

        let (intent, leave) = scan::interpret(&payload, stored.as_ref()).inspect_err(|_| {
            warn!(request_id = %payload.id, scanned_by = %actor.email, "Pass does not match a stored request");
        })?;

        match intent {
            ScanIntent::AlreadyCompleted => Ok(ScanOutcome {
                result: ScanResult::AlreadyCompleted,
                request: leave.clone(),
                message: scan::ALREADY_COMPLETED,
            }),
            ScanIntent::Apply(action) => {
                let updated = self
                    .apply(actor, leave, action)
                    .await?
                    .ok_or_else(|| AppError::Internal("scan removed a request".into()))?;

                Ok(ScanOutcome {
                    result: ScanResult::Applied(action),
                    request: updated,
                    message: scan::outcome_message(action),
                })
            }
        }
    }

    pub async fn remove(&self, actor: &Actor, id: &str) -> Result<()> {
        let leave = self.load_fresh(id).await?;
        match self.apply(actor, &leave, Action::Delete).await? {
            None => Ok(()),
            Some(_) => Err(AppError::Internal("delete kept a request".into())),
        }
    }

    /// Pass text for the owning student's approved request.
    pub async fn issue_pass(&self, actor: &Actor, id: &str) -> Result<QrPayload> {
        let leave = self.get(actor, id).await?;

        if actor.role != Role::Student {
            return Err(AppError::AccessDenied(
                "Only the requesting student can display a pass".into(),
            ));
        }

        if !matches!(leave.state, LeaveState::Approved { .. }) {
            return Err(AppError::InvalidTransition(format!(
                "No pass for a {} request",
                leave.state.status()
            )));
        }

        Ok(QrPayload::for_leave(&leave))
    }

    async fn load_fresh(&self, id: &str) -> Result<LeaveRequest> {
        self.store
            .fetch_leave(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Run one engine decision against `leave` and persist it.
    /// `None` means the request was removed.
    async fn apply(
        &self,
        actor: &Actor,
        leave: &LeaveRequest,
        action: Action,
    ) -> Result<Option<LeaveRequest>> {
        let decision = engine::decide(actor, leave, action, &self.policy, Utc::now()).inspect_err(|e| {
            info!(request_id = %leave.id, role = %actor.role, %action, error = %e, "Transition refused");
        })?;

        let outcome = match decision {
            Decision::Update(next) => Some(self.store.update_leave(&next).await?),
            Decision::Remove => {
                self.store.delete_leave(&leave.id, leave.version).await?;
                None
            }
        };

        self.cache.invalidate(&leave.id).await;

        match &outcome {
            Some(updated) => info!(
                request_id = %leave.id,
                role = %actor.role,
                %action,
                from = %leave.state.status(),
                to = %updated.state.status(),
                movement = %updated.state.movement(),
                "Transition applied"
            ),
            None => info!(request_id = %leave.id, role = %actor.role, "Leave request removed"),
        }

        Ok(outcome)
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Request {} not found", id))
}
