//! Key-set refresh background task.
//!
//! Refreshes the signing keys on a fixed interval so a rotated key is
//! usually known before the first token signed with it arrives. The first
//! tick fires immediately, warming the cache at startup.
//!
//! Refreshes count against the key set's hourly fetch ceiling. Failures are
//! logged and the cached keys stay in use.

use crate::auth::KeySetCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Run until `cancel_token` is cancelled.
#[instrument(skip_all, name = "qs.task.key_set_refresher")]
pub async fn start_key_set_refresher(
    key_set: Arc<KeySetCache>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "qs.task.key_set_refresher",
        interval_seconds = interval.as_secs(),
        "Starting key set refresher task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match key_set.refresh().await {
                    Ok(count) => {
                        tracing::debug!(target: "qs.task.key_set_refresher", key_count = count, "Key set refreshed");
                    }
                    Err(e) => {
                        warn!(target: "qs.task.key_set_refresher", error = %e, "Key set refresh failed, keeping cached keys");
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(target: "qs.task.key_set_refresher", "Key set refresher received shutdown signal, exiting");
                break;
            }
        }
    }

    info!(target: "qs.task.key_set_refresher", "Key set refresher task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::KeySetConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JWKS: &str = r#"{"keys":[{"kty":"OKP","kid":"ed-1","crv":"Ed25519","alg":"EdDSA","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}]}"#;

    #[tokio::test]
    async fn test_refresher_warms_cache_and_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
            .mount(&server)
            .await;

        let key_set = Arc::new(KeySetCache::new(KeySetConfig::new(format!(
            "{}/jwks",
            server.uri()
        ))));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(start_key_set_refresher(
            Arc::clone(&key_set),
            Duration::from_secs(3600),
            cancel_token.clone(),
        ));

        for _ in 0..50 {
            if key_set.cached_key_count().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(key_set.cached_key_count().await, 1);

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should stop after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresher_survives_failing_authority() {
        let key_set = Arc::new(KeySetCache::new(KeySetConfig::new(
            "http://127.0.0.1:1/jwks",
        )));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(start_key_set_refresher(
            Arc::clone(&key_set),
            Duration::from_millis(10),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should stop after cancellation")
            .unwrap();
        assert_eq!(key_set.cached_key_count().await, 0);
    }
}
