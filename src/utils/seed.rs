use anyhow::Result;

use crate::auth::handlers::create_user;
use crate::model::role::Role;
use crate::store::Store;

const DEFAULT_USERS: [(&str, &str, &str, Role); 3] = [
    ("student@example.com", "student123", "Student One", Role::Student),
    ("warden@example.com", "warden123", "Warden", Role::Warden),
    ("security@example.com", "security123", "Security", Role::Security),
];

/// Insert the demo accounts that are missing. Returns how many were created.
pub async fn seed_default_users(store: &Store) -> Result<usize> {
    let mut created = 0;

    for (email, password, name, role) in DEFAULT_USERS {
        if store.email_exists(email).await? {
            log::info!("User {} already exists, skipping", email);
            continue;
        }

        create_user(store, email, password, name, role).await?;
        log::info!("Created user: {} ({})", email, role);
        created += 1;
    }

    Ok(created)
}
