use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::SqlitePool;
use std::sync::RwLock;

use crate::model::user::normalize_email;

/// Expected capacity and false-positive rate.
/// A hostel rarely has more than a few thousand accounts.
const FILTER_CAPACITY: usize = 20_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static EMAIL_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Check if an email might be registered (false positives possible).
/// A poisoned filter answers "maybe" so the caller falls back to the database.
pub fn might_exist(email: &str) -> bool {
    let email = normalize_email(email);
    match EMAIL_FILTER.read() {
        Ok(filter) => filter.contains(&email),
        Err(_) => true,
    }
}

/// Insert a single email into the filter
pub fn insert(email: &str) {
    let email = normalize_email(email);
    if let Ok(mut filter) = EMAIL_FILTER.write() {
        filter.add(&email);
    }
}

/// Warm up the email filter using streaming + batching
pub async fn warmup_email_filter(pool: &SqlitePool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT email FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (email,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize_email(&email));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch)?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch)?;
    }

    log::info!("Email filter warmup complete: {} users", total);
    Ok(())
}

/// Insert a batch of normalized emails
fn insert_batch(emails: &[String]) -> Result<()> {
    let mut filter = EMAIL_FILTER
        .write()
        .map_err(|_| anyhow!("email filter poisoned"))?;

    for email in emails {
        filter.add(email);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::model::role::Role;
    use crate::store::Store;

    #[test]
    fn inserted_emails_are_found_case_insensitively() {
        insert("Filter.Test@Example.com");
        assert!(might_exist("filter.test@example.com"));
        assert!(might_exist("  FILTER.TEST@EXAMPLE.COM"));
    }

    #[actix_web::test]
    async fn warmup_loads_existing_users() {
        let store = Store::new(memory_pool().await);
        store
            .insert_user("warm.one@example.com", "One", "hash", Role::Student)
            .await
            .unwrap();
        store
            .insert_user("warm.two@example.com", "Two", "hash", Role::Warden)
            .await
            .unwrap();

        warmup_email_filter(store.pool(), 1).await.unwrap();
        assert!(might_exist("warm.one@example.com"));
        assert!(might_exist("warm.two@example.com"));
    }
}
