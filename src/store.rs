use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::model::leave_request::{LeaveRequest, LeaveRow, Status};
use crate::model::role::Role;
use crate::model::user::{User, UserRow};

const LEAVE_COLUMNS: &str = "id, student_email, from_date, to_date, status, movement, \
     approved_at, approved_by, created_at, updated_at, version";

#[derive(Debug, Default)]
pub struct LeaveFilter {
    pub student_email: Option<String>,
    pub status: Option<Status>,
    pub limit: u32,
    pub offset: u32,
}

/// Persistence for users and leave requests.
///
/// Leave rows are never overwritten blindly: every write names the version
/// it was decided against.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Leave requests

    pub async fn insert_leave(&self, leave: &LeaveRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_requests
                (id, student_email, from_date, to_date, status, movement,
                 approved_at, approved_by, created_at, updated_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&leave.id)
        .bind(&leave.student_email)
        .bind(leave.from_date)
        .bind(leave.to_date)
        .bind(leave.state.status().to_string())
        .bind(leave.state.movement().to_string())
        .bind(leave.approved_at)
        .bind(&leave.approved_by)
        .bind(leave.created_at)
        .bind(leave.updated_at)
        .bind(leave.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_leave(&self, id: &str) -> Result<Option<LeaveRequest>> {
        let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);

        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    pub async fn list_leaves(&self, filter: &LeaveFilter) -> Result<(Vec<LeaveRequest>, i64)> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        if let Some(email) = filter.student_email.as_ref() {
            where_sql.push_str(" AND student_email = ?");
            args.push(email.clone());
        }

        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(status.to_string());
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = count_q.bind(arg);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {} FROM leave_requests{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            LEAVE_COLUMNS, where_sql
        );
        let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql);
        for arg in args {
            data_q = data_q.bind(arg);
        }

        let rows = data_q
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        let leaves = rows
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((leaves, total))
    }

    /// Persist `next` if the stored row is still at `next.version`.
    /// Returns the stored record with its bumped version.
    pub async fn update_leave(&self, next: &LeaveRequest) -> Result<LeaveRequest> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, movement = ?, approved_at = ?, approved_by = ?,
                updated_at = ?, version = version + 1
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(next.state.status().to_string())
        .bind(next.state.movement().to_string())
        .bind(next.approved_at)
        .bind(&next.approved_by)
        .bind(next.updated_at)
        .bind(&next.id)
        .bind(next.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentUpdate);
        }

        Ok(LeaveRequest {
            version: next.version + 1,
            ..next.clone()
        })
    }

    pub async fn delete_leave(&self, id: &str, version: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND version = ?")
            .bind(id)
            .bind(version)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentUpdate);
        }

        Ok(())
    }

    // Users

    pub async fn insert_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"INSERT INTO users (email, name, password, role, created_at) VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                email: email.to_string(),
                name: name.to_string(),
                password: password_hash.to_string(),
                role,
                created_at: now,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::Conflict("Email already registered".into()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, password, role, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::lifecycle::engine::{self, Action, Actor, Decision, Policy};
    use crate::model::leave_request::{LeaveState, Movement};

    async fn store_with_leave(email: &str) -> (Store, LeaveRequest) {
        let store = Store::new(memory_pool().await);
        let leave = engine::create(
            &Actor::new(Role::Student, email),
            uuid::Uuid::new_v4().to_string(),
            Some("2024-01-01"),
            Some("2024-01-05"),
            Utc::now(),
        )
        .unwrap();
        store.insert_leave(&leave).await.unwrap();
        (store, leave)
    }

    fn approve(leave: &LeaveRequest) -> LeaveRequest {
        let warden = Actor::new(Role::Warden, "warden@x.com");
        match engine::decide(&warden, leave, Action::Approve, &Policy::default(), Utc::now()).unwrap() {
            Decision::Update(next) => next,
            Decision::Remove => unreachable!(),
        }
    }

    #[actix_web::test]
    async fn leave_round_trips_through_sqlite() {
        let (store, leave) = store_with_leave("student@x.com").await;
        let fetched = store.fetch_leave(&leave.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, leave.id);
        assert_eq!(fetched.state, LeaveState::Pending);
        assert_eq!(fetched.from_date, leave.from_date);
        assert_eq!(fetched.version, 0);

        assert!(store.fetch_leave("missing").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn update_bumps_version_and_stores_state() {
        let (store, leave) = store_with_leave("student@x.com").await;
        let saved = store.update_leave(&approve(&leave)).await.unwrap();
        assert_eq!(saved.version, 1);

        let fetched = store.fetch_leave(&leave.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, LeaveState::Approved { movement: Movement::In });
        assert_eq!(fetched.approved_by.as_deref(), Some("warden@x.com"));
        assert_eq!(fetched.version, 1);
    }

    #[actix_web::test]
    async fn stale_write_is_refused() {
        let (store, leave) = store_with_leave("student@x.com").await;
        let first = approve(&leave);
        let racing = approve(&leave);

        store.update_leave(&first).await.unwrap();
        let err = store.update_leave(&racing).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrentUpdate));

        let err = store.delete_leave(&leave.id, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrentUpdate));
        store.delete_leave(&leave.id, 1).await.unwrap();
        assert!(store.fetch_leave(&leave.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn list_filters_by_student_and_status() {
        let (store, first) = store_with_leave("a@x.com").await;
        let second = engine::create(
            &Actor::new(Role::Student, "b@x.com"),
            "second".into(),
            Some("2024-02-01"),
            Some("2024-02-02"),
            Utc::now(),
        )
        .unwrap();
        store.insert_leave(&second).await.unwrap();
        store.update_leave(&approve(&first)).await.unwrap();

        let all = LeaveFilter {
            limit: 10,
            ..Default::default()
        };
        let (leaves, total) = store.list_leaves(&all).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(leaves.len(), 2);

        let only_b = LeaveFilter {
            student_email: Some("b@x.com".into()),
            limit: 10,
            ..Default::default()
        };
        let (leaves, total) = store.list_leaves(&only_b).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(leaves[0].id, "second");

        let approved = LeaveFilter {
            status: Some(Status::Approved),
            limit: 10,
            ..Default::default()
        };
        let (leaves, _) = store.list_leaves(&approved).await.unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].id, first.id);
    }

    #[actix_web::test]
    async fn duplicate_email_is_a_conflict() {
        let store = Store::new(memory_pool().await);
        store
            .insert_user("w@x.com", "Warden", "hash", Role::Warden)
            .await
            .unwrap();
        assert!(store.email_exists("w@x.com").await.unwrap());

        let err = store
            .insert_user("w@x.com", "Other", "hash", Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let user = store.find_user_by_email("w@x.com").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Warden);
        assert_eq!(user.name, "Warden");
    }
}
