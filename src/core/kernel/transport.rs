use crate::core::config::{ClientConfig, ConfigError, TransportStrategy};
use crate::core::errors::BeyondhError;
use crate::core::types::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

/// Transport trait for delivering prepared requests
///
/// A transport POSTs the request body to the configured endpoint and hands
/// back the raw response. It never retries and never interprets the body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, BeyondhError>;
}

/// Implementation of `Transport` using reqwest
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Build the HTTP client for a configuration
    ///
    /// With a pooled strategy the idle pool is capped at the same ceiling as
    /// the in-flight limit. No client-wide timeout is set: the caller's
    /// per-call deadline is the only one applied.
    pub fn new(config: &ClientConfig) -> Result<Self, BeyondhError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::InvalidConfiguration(format!(
                "invalid base_url '{}': {}",
                config.base_url, e
            ))
        })?;

        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let TransportStrategy::Pooled { max_connections } = config.transport {
            builder = builder.pool_max_idle_per_host(max_connections);
        }
        let client = builder.build().map_err(|e| {
            ConfigError::InvalidConfiguration(format!(
                "Failed to build HTTP client: {}",
                e
            ))
        })?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.call().method(), url = %self.base_url))]
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, BeyondhError> {
        let response = self
            .client
            .post(self.base_url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}

/// Caps the number of requests in flight through the inner transport.
///
/// Callers beyond the ceiling wait for a slot instead of opening new sockets.
/// A slot is returned when its request finishes or is cancelled.
pub struct PooledTransport<T> {
    inner: T,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl<T> std::fmt::Debug for PooledTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTransport")
            .field("capacity", &self.capacity)
            .field("available", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PooledTransport<T> {
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a request
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for PooledTransport<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, BeyondhError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BeyondhError::PoolClosed)?;
        self.inner.send(request).await
    }
}

/// Build the transport selected by the configuration
pub fn build_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>, BeyondhError> {
    let http = ReqwestTransport::new(config)?;
    Ok(match config.transport {
        TransportStrategy::Pooled { max_connections } => {
            Arc::new(PooledTransport::new(http, max_connections))
        }
        TransportStrategy::Simple => Arc::new(http),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Call;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowTransport {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl SlowTransport {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, BeyondhError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ApiResponse::new(StatusCode::OK, HeaderMap::new(), "{}"))
        }
    }

    fn request() -> ApiRequest {
        ApiRequest::new(Call::new("Security.GetRoles")).unwrap()
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_capacity() {
        let pool = Arc::new(PooledTransport::new(
            SlowTransport::new(Duration::from_millis(20)),
            4,
        ));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.send(&request()).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_ok());
        }

        assert_eq!(pool.inner().calls.load(Ordering::SeqCst), 20);
        assert_eq!(pool.inner().peak.load(Ordering::SeqCst), 4);
        assert_eq!(pool.available(), pool.capacity());
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_slot() {
        let pool = PooledTransport::new(SlowTransport::new(Duration::from_secs(5)), 1);

        let req = request();
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pool.send(&req)).await;
        assert!(timed_out.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_build_transport_rejects_bad_url() {
        let config = ClientConfig::new("CH1".to_string(), "K1".to_string()).base_url("::nope::");
        assert!(build_transport(&config).is_err());
    }

    #[test]
    fn test_build_transport_for_each_strategy() {
        let pooled = ClientConfig::new("CH1".to_string(), "K1".to_string()).pool_size(8);
        assert!(build_transport(&pooled).is_ok());

        let simple = pooled.transport(TransportStrategy::Simple);
        assert!(build_transport(&simple).is_ok());
    }
}
