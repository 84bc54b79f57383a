//! Key-set cache for the authority's public signing keys.
//!
//! Fetches the JWKS document from the authority and keeps the parsed keys in
//! memory, replacing them wholesale on every successful refresh.
//!
//! # Refresh rules
//!
//! - A fresh cache holding the requested `kid` answers without I/O.
//! - A cold cache, an expired cache (TTL, default 24h) or a `kid` miss
//!   triggers a refresh.
//! - Two fetch budgets. Cold, expired and explicit refreshes share
//!   `max_refreshes_per_hour` attempts per rolling hour. Refreshes caused by
//!   a `kid` missing from a fresh set draw from a separate
//!   `max_kid_miss_refreshes_per_minute` budget, so tokens with made-up key
//!   ids cannot hold back a rotation for longer than a minute. Past either
//!   limit, lookups are answered from what is cached.
//! - A failed refresh keeps the previous keys. Only a cold cache turns a
//!   failed refresh into `KeyNotFound`.
//! - Concurrent lookups needing a refresh share one fetch: the refresh lock
//!   is paired with a generation counter, and a waiter that sees the
//!   generation moved while it queued reuses that outcome.
//!
//! # Security
//!
//! - Each key carries its own algorithm; the verifier never trusts the token
//!   header to choose one
//! - HTTPS should be used in production (enforced by deployment config)

use crate::observability::metrics;
use common::jwt::decode_ed25519_public_key_jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default key-set lifetime (24 hours).
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::from_secs(24 * 3600);

/// Default ceiling on fetch attempts per rolling hour.
pub const DEFAULT_MAX_REFRESHES_PER_HOUR: u32 = 10;

/// Default ceiling on `kid`-miss fetch attempts per rolling minute.
pub const DEFAULT_MAX_KID_MISS_REFRESHES_PER_MINUTE: u32 = 10;

/// Default timeout for one JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const REFRESH_WINDOW: Duration = Duration::from_secs(3600);
const KID_MISS_WINDOW: Duration = Duration::from_secs(60);

/// Key-set failures. Internal to the auth module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetError {
    #[error("signing key not found")]
    KeyNotFound,

    #[error("key set fetch failed: {0}")]
    FetchFailed(String),

    #[error("key set refresh rate limit reached")]
    RateLimited,
}

/// A verification key from the authority's key set. Never mutated.
pub struct SigningKey {
    pub key_id: String,
    pub algorithm: Algorithm,
    decoding_key: DecodingKey,
    pub fetched_at: Instant,
}

impl SigningKey {
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// JSON Web Key as published by the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA` or `OKP`.
    pub kty: String,

    /// Keys without a `kid` cannot be selected and are skipped.
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// OKP curve, `Ed25519` only.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Key-set cache settings.
#[derive(Debug, Clone)]
pub struct KeySetConfig {
    pub jwks_url: String,
    pub ttl: Duration,
    pub max_refreshes_per_hour: u32,
    pub max_kid_miss_refreshes_per_minute: u32,
    pub fetch_timeout: Duration,
}

impl KeySetConfig {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            ttl: DEFAULT_KEY_SET_TTL,
            max_refreshes_per_hour: DEFAULT_MAX_REFRESHES_PER_HOUR,
            max_kid_miss_refreshes_per_minute: DEFAULT_MAX_KID_MISS_REFRESHES_PER_MINUTE,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Sliding-window limit on fetch attempts.
struct FetchBudget {
    name: &'static str,
    window: Duration,
    limit: usize,
    recent: parking_lot::Mutex<VecDeque<Instant>>,
}

impl FetchBudget {
    fn new(name: &'static str, window: Duration, limit: u32) -> Self {
        Self {
            name,
            window,
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
            recent: parking_lot::Mutex::new(VecDeque::new()),
        }
    }

    fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut recent = self.recent.lock();
        while recent
            .front()
            .is_some_and(|at| now.duration_since(*at) >= self.window)
        {
            recent.pop_front();
        }

        if recent.len() >= self.limit {
            return false;
        }
        recent.push_back(now);
        true
    }
}

struct CachedKeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
}

/// Cache of the authority's signing keys.
pub struct KeySetCache {
    config: KeySetConfig,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedKeySet>>,
    refresh_lock: Mutex<()>,
    /// Advanced after every completed fetch attempt.
    refresh_generation: AtomicU64,
    refresh_budget: FetchBudget,
    kid_miss_budget: FetchBudget,
}

impl KeySetCache {
    pub fn new(config: KeySetConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "qs.auth.key_set", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        let refresh_budget =
            FetchBudget::new("hourly", REFRESH_WINDOW, config.max_refreshes_per_hour);
        let kid_miss_budget = FetchBudget::new(
            "kid_miss",
            KID_MISS_WINDOW,
            config.max_kid_miss_refreshes_per_minute,
        );

        Self {
            config,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            refresh_budget,
            kid_miss_budget,
        }
    }

    /// Resolve a key id to a verification key.
    ///
    /// # Errors
    ///
    /// `KeySetError::KeyNotFound` when the key is neither cached nor
    /// obtainable from the authority.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeySetError> {
        let observed_generation = self.refresh_generation.load(Ordering::SeqCst);

        let budget = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) if cached.fetched_at.elapsed() < self.config.ttl => {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(Arc::clone(key));
                    }
                    tracing::debug!(target: "qs.auth.key_set", kid = %kid, "Key not in fresh key set, refreshing");
                    &self.kid_miss_budget
                }
                Some(_) => {
                    tracing::debug!(target: "qs.auth.key_set", "Key set expired, refreshing");
                    &self.refresh_budget
                }
                None => &self.refresh_budget,
            }
        };

        if let Err(e) = self.refresh_coalesced(observed_generation, budget).await {
            tracing::debug!(target: "qs.auth.key_set", error = %e, "Refresh failed, using cached keys");
        }

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid))
            .map(Arc::clone)
            .ok_or_else(|| {
                tracing::debug!(target: "qs.auth.key_set", kid = %kid, "Key not found after refresh");
                KeySetError::KeyNotFound
            })
    }

    /// Fetch the key set now, subject to the hourly ceiling. Used by the
    /// background refresher.
    ///
    /// Returns the number of usable keys loaded.
    ///
    /// # Errors
    ///
    /// `RateLimited` past the ceiling, `FetchFailed` when the authority
    /// cannot be reached or returns an unusable document. Cached keys are
    /// kept in both cases.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked(&self.refresh_budget).await
    }

    /// Number of keys currently cached, fresh or not.
    pub async fn cached_key_count(&self) -> usize {
        self.cache
            .read()
            .await
            .as_ref()
            .map_or(0, |cached| cached.keys.len())
    }

    async fn refresh_coalesced(
        &self,
        observed_generation: u64,
        budget: &FetchBudget,
    ) -> Result<usize, KeySetError> {
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != observed_generation {
            tracing::debug!(target: "qs.auth.key_set", "Key set refreshed while waiting, reusing result");
            return Ok(self.cached_key_count().await);
        }

        self.refresh_locked(budget).await
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self, budget: &FetchBudget) -> Result<usize, KeySetError> {
        if !budget.try_acquire() {
            tracing::warn!(
                target: "qs.auth.key_set",
                budget = budget.name,
                limit = budget.limit,
                window_seconds = budget.window.as_secs(),
                "Key set refresh rate limit reached, serving cached keys"
            );
            metrics::record_key_set_fetch("rate_limited", Duration::ZERO);
            return Err(KeySetError::RateLimited);
        }

        let start = Instant::now();
        let result = self.fetch().await;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(keys) => {
                metrics::record_key_set_fetch("success", start.elapsed());
                let count = keys.len();
                *self.cache.write().await = Some(CachedKeySet {
                    keys,
                    fetched_at: Instant::now(),
                });
                tracing::info!(target: "qs.auth.key_set", key_count = count, "Key set refreshed");
                Ok(count)
            }
            Err(e) => {
                metrics::record_key_set_fetch("error", start.elapsed());
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<HashMap<String, Arc<SigningKey>>, KeySetError> {
        tracing::debug!(target: "qs.auth.key_set", url = %self.config.jwks_url, "Fetching key set");

        let response = self
            .http_client
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "qs.auth.key_set", error = %e, "Failed to fetch key set");
                KeySetError::FetchFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "qs.auth.key_set",
                status = %response.status(),
                "Key set endpoint returned error"
            );
            return Err(KeySetError::FetchFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "qs.auth.key_set", error = %e, "Failed to parse key set");
            KeySetError::FetchFailed(e.to_string())
        })?;

        let fetched_at = Instant::now();
        let keys: HashMap<String, Arc<SigningKey>> = jwks
            .keys
            .iter()
            .filter_map(|jwk| parse_jwk(jwk, fetched_at))
            .map(|key| (key.key_id.clone(), Arc::new(key)))
            .collect();

        if keys.is_empty() {
            tracing::error!(target: "qs.auth.key_set", "Key set contains no usable keys");
            return Err(KeySetError::FetchFailed("no usable keys".to_string()));
        }

        Ok(keys)
    }
}

/// Turn one JWK into a [`SigningKey`]. Unsupported or incomplete keys yield
/// `None`.
pub fn parse_jwk(jwk: &Jwk, fetched_at: Instant) -> Option<SigningKey> {
    let Some(kid) = jwk.kid.as_deref().filter(|k| !k.is_empty()) else {
        tracing::debug!(target: "qs.auth.key_set", kty = %jwk.kty, "Skipping JWK without kid");
        return None;
    };

    let parsed = match jwk.kty.as_str() {
        "RSA" => parse_rsa(jwk),
        "OKP" => parse_ed25519(jwk),
        other => {
            tracing::debug!(target: "qs.auth.key_set", kid = %kid, kty = %other, "Skipping unsupported JWK type");
            None
        }
    };

    parsed.map(|(algorithm, decoding_key)| SigningKey {
        key_id: kid.to_string(),
        algorithm,
        decoding_key,
        fetched_at,
    })
}

fn parse_rsa(jwk: &Jwk) -> Option<(Algorithm, DecodingKey)> {
    let algorithm = match jwk.alg.as_deref() {
        None | Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some(other) => {
            tracing::debug!(target: "qs.auth.key_set", alg = %other, "Skipping RSA JWK with unsupported alg");
            return None;
        }
    };

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::debug!(target: "qs.auth.key_set", "Skipping RSA JWK missing n or e");
        return None;
    };

    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| {
            tracing::debug!(target: "qs.auth.key_set", error = %err, "Invalid RSA JWK components");
        })
        .ok()
        .map(|key| (algorithm, key))
}

fn parse_ed25519(jwk: &Jwk) -> Option<(Algorithm, DecodingKey)> {
    if jwk.crv.as_deref().is_some_and(|crv| crv != "Ed25519") {
        tracing::debug!(target: "qs.auth.key_set", "Skipping OKP JWK with unsupported curve");
        return None;
    }
    if jwk.alg.as_deref().is_some_and(|alg| alg != "EdDSA") {
        tracing::debug!(target: "qs.auth.key_set", "Skipping OKP JWK with unsupported alg");
        return None;
    }

    let x = jwk.x.as_deref()?;
    let public_key_bytes = decode_ed25519_public_key_jwk(x)
        .map_err(|e| {
            tracing::debug!(target: "qs.auth.key_set", error = %e, "Invalid Ed25519 JWK encoding");
        })
        .ok()?;

    Some((Algorithm::EdDSA, DecodingKey::from_ed_der(&public_key_bytes)))
}
