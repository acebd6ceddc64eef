use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreResult, Role};

/// Persisted user account. Covers the three actor kinds: end customers,
/// travel-agency web-service accounts and administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    /// Stored lowercased; lookups are case-insensitive.
    pub email: String,
    pub first_names: String,
    pub last_names: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
    pub role: Role,
}

impl UserAccount {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_names, self.last_names);
        let full = full.trim().to_string();
        if full.is_empty() {
            "cliente".to_string()
        } else {
            full
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Account lookup and creation. The agency checkout path uses
/// `create_customer` to materialize end-customer accounts on the fly.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<UserAccount>>;

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<UserAccount>>;

    /// Creates an enabled Customer account. The email is expected to be
    /// normalized already; a duplicate email is a `Conflict`.
    async fn create_customer(
        &self,
        email: &str,
        first_names: &str,
        last_names: &str,
        password_hash: &str,
    ) -> CoreResult<UserAccount>;
}
