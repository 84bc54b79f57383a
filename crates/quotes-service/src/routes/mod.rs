//! HTTP routes for the quotes service.
//!
//! Defines the Axum router and application state.

use crate::auth::{Authorizer, IdentityResolver, TokenVerifier};
use crate::cache::{GroupCache, MembershipCache, RegionStats};
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth};
use crate::repositories::{GroupRepository, MembershipRepository, UserRepository};
use crate::services::{AuthorityClient, GroupService, MemberService, UserService};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub verifier: Arc<TokenVerifier>,
    pub identity: Arc<IdentityResolver>,
    pub authorizer: Arc<Authorizer>,
    pub group_cache: Arc<GroupCache>,
    pub membership_cache: Arc<MembershipCache>,
    pub group_service: Arc<GroupService>,
    pub member_service: Arc<MemberService>,
    pub user_service: Arc<UserService>,
}

impl AppState {
    /// Wire caches, resolvers and services over the given stores. Every
    /// cache region is bounded to `cache_max_entries` entries.
    pub fn new(
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
        memberships: Arc<dyn MembershipRepository>,
        verifier: Arc<TokenVerifier>,
        authority: Arc<dyn AuthorityClient>,
        cache_max_entries: u64,
    ) -> Self {
        let group_cache = Arc::new(GroupCache::new(groups, cache_max_entries));
        let membership_cache = Arc::new(MembershipCache::new(memberships, cache_max_entries));

        Self {
            identity: Arc::new(IdentityResolver::new(
                Arc::clone(&users),
                authority,
                cache_max_entries,
            )),
            authorizer: Arc::new(Authorizer::new(Arc::clone(&membership_cache))),
            group_service: Arc::new(GroupService::new(
                Arc::clone(&group_cache),
                Arc::clone(&membership_cache),
                Arc::clone(&users),
            )),
            member_service: Arc::new(MemberService::new(
                Arc::clone(&membership_cache),
                Arc::clone(&users),
            )),
            user_service: Arc::new(UserService::new(Arc::clone(&users))),
            users,
            verifier,
            group_cache,
            membership_cache,
        }
    }

    /// Statistics of every cache region, for the telemetry sweep.
    pub fn cache_stats(&self) -> Vec<RegionStats> {
        let mut stats = self.membership_cache.stats();
        stats.extend(self.group_cache.stats());
        stats.push(self.identity.stats());
        stats
    }
}

/// Build the application routes.
///
/// - `/health` and `/metrics` are public
/// - `/users/*` and `/groups/*` require a bearer token; the resolved
///   `Principal` is placed in request extensions
/// - TraceLayer for request logging, 30 second request timeout
/// - HTTP metrics middleware records every response (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
        .route("/groups", post(handlers::create_group))
        .route("/groups/me", get(handlers::get_my_groups))
        .route("/groups/invite", post(handlers::join_group))
        .route(
            "/groups/:id",
            get(handlers::get_group).patch(handlers::update_group),
        )
        .route(
            "/groups/:id/users",
            get(handlers::list_members).post(handlers::add_member),
        )
        .route(
            "/groups/:id/users/me",
            patch(handlers::update_my_membership).delete(handlers::leave_group),
        )
        .route("/groups/:id/users/:user_id", get(handlers::get_member))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
