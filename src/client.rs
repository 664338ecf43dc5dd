use crate::core::config::{ClientConfig, ConfigError, TransportStrategy};
use crate::core::errors::BeyondhError;
use crate::core::kernel::{
    build_transport, BodyRefactor, Clock, EnvelopeBuilder, LogSink, Middleware, PayloadLogging,
    Pipeline, TracingSink, Transport, BODY_REFACTOR, PAYLOAD_LOGGING,
};
use crate::core::types::{ApiRequest, ApiResponse, Call};
use crate::resources::{Bill, Ota, Security};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Builder for creating [`BeyondhClient`] instances
///
/// Every dependency of the client is injected here; anything not supplied is
/// derived from the configuration.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    log_sink: Option<Arc<dyn LogSink>>,
    clock: Option<Arc<dyn Clock>>,
    stages: Vec<Arc<dyn Middleware>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            log_sink: None,
            clock: None,
            stages: Vec::new(),
        }
    }

    /// Use a custom transport instead of the one the configuration selects
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Log exchanged payloads to `sink`
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Add a stage after the body rewrite, so it sees the signed request.
    ///
    /// The built-in stage names are reserved; `build` rejects a stage that
    /// reuses one.
    pub fn with_middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Validate the configuration and assemble the client
    pub fn build(self) -> Result<BeyondhClient, BeyondhError> {
        let Self {
            config,
            transport,
            log_sink,
            clock,
            stages,
        } = self;

        config.validate()?;
        if let Some(stage) = stages
            .iter()
            .find(|s| [BODY_REFACTOR, PAYLOAD_LOGGING].contains(&s.name()))
        {
            return Err(ConfigError::InvalidConfiguration(format!(
                "stage name '{}' is reserved",
                stage.name()
            ))
            .into());
        }

        let mut envelopes = EnvelopeBuilder::from_config(&config);
        if let Some(clock) = clock {
            envelopes = envelopes.with_clock(clock);
        }

        let mut pipeline =
            Pipeline::new().with(Arc::new(BodyRefactor::new(envelopes, config.domain.as_deref())?));
        for stage in stages {
            pipeline.push(stage);
        }

        let log_sink = log_sink.or_else(|| {
            config
                .log_payloads
                .then(|| Arc::new(TracingSink) as Arc<dyn LogSink>)
        });
        if let Some(sink) = log_sink {
            pipeline.push(Arc::new(PayloadLogging::new(sink)));
        }

        let transport = match transport {
            Some(transport) => transport,
            None => build_transport(&config)?,
        };

        Ok(BeyondhClient {
            config,
            pipeline: Arc::new(pipeline),
            transport,
        })
    }
}

/// Entry point for every call to the open API
///
/// Owns one pipeline and one transport. Cloning shares both, so clones draw
/// from the same connection ceiling.
#[derive(Clone)]
pub struct BeyondhClient {
    config: ClientConfig,
    pipeline: Arc<Pipeline>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for BeyondhClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeyondhClient")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl BeyondhClient {
    /// Create a client with the transport and stages the configuration selects
    pub fn new(config: ClientConfig) -> Result<Self, BeyondhError> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Sign and send a call, bounded by the configured request timeout
    pub async fn post(&self, call: Call) -> Result<ApiResponse, BeyondhError> {
        self.post_with_deadline(call, self.config.request_timeout)
            .await
    }

    /// Sign and send a call, giving up after `deadline`
    ///
    /// The deadline covers waiting for a pooled connection as well as the
    /// exchange itself. Nothing is retried.
    #[instrument(skip(self, call), fields(method = %call.method()))]
    pub async fn post_with_deadline(
        &self,
        call: Call,
        deadline: Duration,
    ) -> Result<ApiResponse, BeyondhError> {
        let request = self.pipeline.prepare(ApiRequest::new(call)?)?;

        let response = tokio::time::timeout(deadline, self.transport.send(&request))
            .await
            .map_err(|_| BeyondhError::Timeout(deadline))??;

        Ok(self.pipeline.complete(&request, response))
    }

    /// Point the client at a new endpoint and/or transport strategy.
    ///
    /// The transport is rebuilt from the updated configuration; the pipeline
    /// is kept as-is. On error the client is left unchanged.
    pub fn reconfigure(
        &mut self,
        base_url: Option<String>,
        strategy: Option<TransportStrategy>,
    ) -> Result<(), BeyondhError> {
        let mut config = self.config.clone();
        if let Some(base_url) = base_url {
            config.base_url = base_url;
        }
        if let Some(strategy) = strategy {
            config.transport = strategy;
        }
        config.validate()?;

        self.transport = build_transport(&config)?;
        self.config = config;
        Ok(())
    }

    /// Swap the transport without touching configuration or pipeline
    pub fn replace_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = transport;
    }

    pub fn bill(&self) -> Bill<'_> {
        Bill::new(self)
    }

    pub fn security(&self) -> Security<'_> {
        Security::new(self)
    }

    pub fn ota(&self) -> Ota<'_> {
        Ota::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough(&'static str);

    impl Middleware for Passthrough {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("CH1".to_string(), "K1".to_string())
    }

    #[test]
    fn test_construction_fails_fast_on_bad_config() {
        let err = BeyondhClient::new(ClientConfig::new("CH1".to_string(), String::new()))
            .unwrap_err();
        assert!(matches!(err, BeyondhError::Config(_)));
    }

    #[test]
    fn test_default_pipeline() {
        let client = BeyondhClient::new(config()).unwrap();
        assert_eq!(client.pipeline().names(), vec![BODY_REFACTOR]);

        let logged = BeyondhClient::new(config().log_payloads(true)).unwrap();
        assert_eq!(logged.pipeline().names(), vec![BODY_REFACTOR, PAYLOAD_LOGGING]);
    }

    #[test]
    fn test_extra_stage_cannot_take_a_reserved_name() {
        for reserved in [BODY_REFACTOR, PAYLOAD_LOGGING] {
            let err = BeyondhClient::builder(config())
                .with_middleware(Arc::new(Passthrough(reserved)))
                .build()
                .unwrap_err();
            assert!(
                matches!(err, BeyondhError::Config(ConfigError::InvalidConfiguration(_))),
                "got {:?}",
                err
            );
        }

        let client = BeyondhClient::builder(config())
            .with_middleware(Arc::new(Passthrough("audit")))
            .build()
            .unwrap();
        assert_eq!(client.pipeline().names(), vec![BODY_REFACTOR, "audit"]);
    }

    #[test]
    fn test_reserved_name_cannot_drop_signing() {
        let err = BeyondhClient::builder(config())
            .with_middleware(Arc::new(Passthrough(BODY_REFACTOR)))
            .build();
        assert!(err.is_err());

        let client = BeyondhClient::new(config()).unwrap();
        let request = client
            .pipeline()
            .prepare(ApiRequest::new(Call::new("A.B")).unwrap())
            .unwrap();
        assert!(request.is_signed());
    }

    #[test]
    fn test_reconfigure_keeps_pipeline() {
        let mut client = BeyondhClient::new(config().log_payloads(true)).unwrap();
        let pipeline = Arc::clone(client.pipeline());

        client
            .reconfigure(
                Some("https://staging.example.com".to_string()),
                Some(TransportStrategy::Pooled { max_connections: 5 }),
            )
            .unwrap();

        assert!(Arc::ptr_eq(&pipeline, client.pipeline()));
        assert_eq!(client.pipeline().names(), vec![BODY_REFACTOR, PAYLOAD_LOGGING]);
        assert_eq!(client.config().base_url, "https://staging.example.com");
        assert_eq!(
            client.config().transport,
            TransportStrategy::Pooled { max_connections: 5 }
        );
    }

    #[test]
    fn test_failed_reconfigure_leaves_client_unchanged() {
        let mut client = BeyondhClient::new(config()).unwrap();
        assert!(client
            .reconfigure(None, Some(TransportStrategy::Pooled { max_connections: 0 }))
            .is_err());
        assert_eq!(client.config().transport, TransportStrategy::default());
    }
}
