//! Identity resolution and first-sight provisioning.
//!
//! Maps an external subject to its local [`Principal`]. Unknown subjects are
//! provisioned with the display name the authority reports, truncated to
//! [`MAX_DISPLAY_NAME_CHARS`]. A subject the authority does not vouch for is
//! never provisioned.
//!
//! The authority's answer is memoised in `auth_display_names` only until the
//! subject has a row, so a failed insert can be retried without asking the
//! authority again.
//!
//! Two first requests for the same subject race on the `users.external_id`
//! unique constraint. The loser is denied for that one call; its next call
//! takes the fast path.

use crate::cache::{CacheRegion, RegionStats};
use crate::errors::QsError;
use crate::models::Principal;
use crate::observability::metrics;
use crate::repositories::{StoreError, UserRepository};
use crate::services::authority_client::AuthorityClient;
use common::text::{truncate_chars, MAX_DISPLAY_NAME_CHARS};
use std::sync::Arc;
use tracing::instrument;

pub const REGION_AUTH_DISPLAY_NAMES: &str = "auth_display_names";

pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    authority: Arc<dyn AuthorityClient>,
    /// Authority display names by subject.
    display_names: CacheRegion<String, String>,
}

impl IdentityResolver {
    pub fn new(
        users: Arc<dyn UserRepository>,
        authority: Arc<dyn AuthorityClient>,
        max_entries: u64,
    ) -> Self {
        Self {
            users,
            authority,
            display_names: CacheRegion::new(REGION_AUTH_DISPLAY_NAMES, max_entries),
        }
    }

    /// Resolve `external_subject_id`, provisioning a local identity on first
    /// sight.
    ///
    /// # Errors
    ///
    /// `QsError::AccessDenied` when the store fails, the authority cannot
    /// confirm the subject, or the insert is refused.
    #[instrument(skip_all)]
    pub async fn resolve(&self, external_subject_id: &str) -> Result<Principal, QsError> {
        let existing = self
            .users
            .find_by_external_id(external_subject_id)
            .await
            .map_err(|e| {
                tracing::warn!(target: "qs.auth.identity", error = %e, "Identity lookup failed");
                QsError::AccessDenied
            })?;

        if let Some(principal) = existing {
            return Ok(principal);
        }

        let full_name = self.authority_display_name(external_subject_id).await?;
        let display_name = truncate_chars(&full_name, MAX_DISPLAY_NAME_CHARS);

        match self.users.insert(external_subject_id, &display_name).await {
            Ok(principal) => {
                self.display_names.invalidate(&external_subject_id.to_string());
                metrics::record_provisioning("created");
                tracing::info!(
                    target: "qs.auth.identity",
                    user_id = principal.local_id,
                    "Provisioned new identity"
                );
                Ok(principal)
            }
            Err(StoreError::Conflict(_)) => {
                self.display_names.invalidate(&external_subject_id.to_string());
                metrics::record_provisioning("insert_failed");
                tracing::info!(target: "qs.auth.identity", "Concurrent provisioning won by another request");
                Err(QsError::AccessDenied)
            }
            Err(e) => {
                metrics::record_provisioning("insert_failed");
                tracing::warn!(target: "qs.auth.identity", error = %e, "Identity insert failed");
                Err(QsError::AccessDenied)
            }
        }
    }

    pub fn stats(&self) -> RegionStats {
        self.display_names.stats()
    }

    async fn authority_display_name(&self, subject: &str) -> Result<String, QsError> {
        let key = subject.to_string();
        if let Some(name) = self.display_names.get(&key) {
            return Ok(name);
        }

        let ticket = self.display_names.begin_fill();
        let name = self.authority.fetch_display_name(subject).await.map_err(|e| {
            metrics::record_provisioning("authority_failed");
            tracing::warn!(target: "qs.auth.identity", error = %e, "Authority could not confirm subject");
            QsError::AccessDenied
        })?;

        self.display_names.fill(key, name.clone(), ticket);
        Ok(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_REGION_CAPACITY;
    use crate::repositories::InMemoryStore;
    use crate::services::authority_client::mock::MockAuthorityClient;
    use std::time::Duration;

    fn resolver(
        store: &Arc<InMemoryStore>,
        authority: &Arc<MockAuthorityClient>,
    ) -> IdentityResolver {
        IdentityResolver::new(store.clone(), authority.clone(), DEFAULT_REGION_CAPACITY)
    }

    #[tokio::test]
    async fn test_known_subject_takes_fast_path() {
        let store = Arc::new(InMemoryStore::new());
        let seeded = store.seed_user("ext-1", "Alice");
        let authority = Arc::new(MockAuthorityClient::returning("Ignored"));

        let principal = resolver(&store, &authority).resolve("ext-1").await.unwrap();

        assert_eq!(principal, seeded);
        assert_eq!(authority.call_count(), 0);
    }

    #[tokio::test]
    async fn test_new_subject_is_provisioned_with_truncated_name() {
        let store = Arc::new(InMemoryStore::new());
        let authority = Arc::new(MockAuthorityClient::returning(
            "Long Name Exceeding Thirty Two Characters!!",
        ));
        let resolver = resolver(&store, &authority);

        let principal = resolver.resolve("ext-99").await.unwrap();

        assert_eq!(principal.external_subject_id, "ext-99");
        assert_eq!(principal.display_name, "Long Name Exceeding Thirty Two C");
        assert_eq!(principal.display_name.chars().count(), 32);
        assert_eq!(store.user_count(), 1);
        assert_eq!(resolver.stats().entries, 0);

        // Second call finds the row.
        assert_eq!(resolver.resolve("ext-99").await.unwrap(), principal);
        assert_eq!(authority.call_count(), 1);
    }

    #[tokio::test]
    async fn test_subject_unknown_to_authority_is_denied_and_not_provisioned() {
        let store = Arc::new(InMemoryStore::new());
        let authority = Arc::new(MockAuthorityClient::not_found());

        let result = resolver(&store, &authority).resolve("ext-ghost").await;

        assert_eq!(result, Err(QsError::AccessDenied));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_denied() {
        let store = Arc::new(InMemoryStore::new());
        let authority = Arc::new(MockAuthorityClient::unavailable());

        let result = resolver(&store, &authority).resolve("ext-2").await;

        assert_eq!(result, Err(QsError::AccessDenied));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_denied() {
        let store = Arc::new(InMemoryStore::new());
        store.set_unavailable(true);
        let authority = Arc::new(MockAuthorityClient::returning("Alice"));

        let result = resolver(&store, &authority).resolve("ext-1").await;

        assert_eq!(result, Err(QsError::AccessDenied));
        assert_eq!(authority.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_authority_name_memoised() {
        let store = Arc::new(InMemoryStore::new());
        let authority = Arc::new(MockAuthorityClient::returning("Alice"));
        let resolver = resolver(&store, &authority);

        store.fail_operation("users.insert", true);
        assert_eq!(resolver.resolve("ext-1").await, Err(QsError::AccessDenied));

        store.fail_operation("users.insert", false);
        let principal = resolver.resolve("ext-1").await.unwrap();

        assert_eq!(principal.display_name, "Alice");
        assert_eq!(authority.call_count(), 1);
        assert_eq!(resolver.stats().hits, 1);
        assert_eq!(resolver.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_sight_provisions_exactly_once() {
        let store = Arc::new(InMemoryStore::new());
        let authority =
            Arc::new(MockAuthorityClient::returning("Racer").with_delay(Duration::from_millis(50)));
        let resolver = resolver(&store, &authority);

        let (first, second) = tokio::join!(resolver.resolve("ext-7"), resolver.resolve("ext-7"));

        assert_eq!(store.user_count(), 1);
        let outcomes = [first, second];
        assert!(outcomes.iter().any(Result::is_ok));
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert_eq!(*e, QsError::AccessDenied);
            }
        }
    }
}
