use crate::core::config::ConfigError;
use crate::core::errors::BeyondhError;
use crate::core::kernel::envelope::EnvelopeBuilder;
use crate::core::types::{ApiRequest, ApiResponse};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub const BODY_REFACTOR: &str = "body_refactor";
pub const PAYLOAD_LOGGING: &str = "payload_logging";

/// Tenant header attached when a domain is configured
pub const DOMAIN_HEADER: &str = "domain";

/// A pipeline stage.
///
/// `transform` runs before the request is transmitted, `observe` after the
/// response arrives. Stages hold shared configuration only, never per-call
/// state.
pub trait Middleware: Send + Sync {
    /// Unique stage name; pushing a stage with an existing name replaces it
    fn name(&self) -> &'static str;

    fn transform(&self, request: ApiRequest) -> Result<ApiRequest, BeyondhError> {
        Ok(request)
    }

    fn observe(&self, _request: &ApiRequest, response: ApiResponse) -> ApiResponse {
        response
    }
}

/// Ordered chain of stages applied to every call.
///
/// Transforms run in insertion order; observers run in reverse, so the first
/// stage pushed is the outermost.
#[derive(Default, Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage, or replace the stage already registered under its name
    pub fn push(&mut self, stage: Arc<dyn Middleware>) {
        match self.stages.iter().position(|s| s.name() == stage.name()) {
            Some(index) => self.stages[index] = stage,
            None => self.stages.push(stage),
        }
    }

    pub fn with(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.push(stage);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every transform, in order
    pub fn prepare(&self, request: ApiRequest) -> Result<ApiRequest, BeyondhError> {
        self.stages
            .iter()
            .try_fold(request, |request, stage| stage.transform(request))
    }

    /// Run every observer, in reverse order
    pub fn complete(&self, request: &ApiRequest, response: ApiResponse) -> ApiResponse {
        self.stages
            .iter()
            .rev()
            .fold(response, |response, stage| stage.observe(request, response))
    }
}

/// Replaces the raw call body with the signed envelope and adds the tenant header.
#[derive(Debug)]
pub struct BodyRefactor {
    envelopes: EnvelopeBuilder,
    domain: Option<HeaderValue>,
}

impl BodyRefactor {
    pub fn new(envelopes: EnvelopeBuilder, domain: Option<&str>) -> Result<Self, ConfigError> {
        let domain = domain
            .filter(|d| !d.is_empty())
            .map(|d| {
                HeaderValue::from_str(d).map_err(|e| {
                    ConfigError::InvalidConfiguration(format!("invalid domain header: {}", e))
                })
            })
            .transpose()?;
        Ok(Self { envelopes, domain })
    }
}

impl Middleware for BodyRefactor {
    fn name(&self) -> &'static str {
        BODY_REFACTOR
    }

    fn transform(&self, mut request: ApiRequest) -> Result<ApiRequest, BeyondhError> {
        if let Some(domain) = &self.domain {
            request
                .headers
                .insert(HeaderName::from_static(DOMAIN_HEADER), domain.clone());
        }
        // Sign once; a request that already carries an envelope is left alone
        if !request.is_signed() {
            let envelope = self.envelopes.build(request.call())?;
            request.attach_envelope(envelope)?;
        }
        Ok(request)
    }
}

/// Destination for exchanged payloads. Failures are reported but never
/// affect the call.
pub trait LogSink: Send + Sync {
    fn record_request(&self, method: &str, body: &[u8]) -> anyhow::Result<()>;

    fn record_response(&self, method: &str, status: StatusCode, body: &[u8]) -> anyhow::Result<()>;
}

/// Writes payloads as `tracing` debug events under the `beyondh::payload` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record_request(&self, method: &str, body: &[u8]) -> anyhow::Result<()> {
        debug!(
            target: "beyondh::payload",
            method,
            body = %String::from_utf8_lossy(body),
            "outgoing request"
        );
        Ok(())
    }

    fn record_response(&self, method: &str, status: StatusCode, body: &[u8]) -> anyhow::Result<()> {
        debug!(
            target: "beyondh::payload",
            method,
            status = status.as_u16(),
            body = %String::from_utf8_lossy(body),
            "incoming response"
        );
        Ok(())
    }
}

/// Best-effort payload logging stage
pub struct PayloadLogging {
    sink: Arc<dyn LogSink>,
}

impl PayloadLogging {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for PayloadLogging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadLogging").finish_non_exhaustive()
    }
}

fn best_effort(method: &str, record: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(record)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(method, error = %e, "payload logging failed"),
        Err(_) => warn!(method, "payload log sink panicked"),
    }
}

impl Middleware for PayloadLogging {
    fn name(&self) -> &'static str {
        PAYLOAD_LOGGING
    }

    fn transform(&self, request: ApiRequest) -> Result<ApiRequest, BeyondhError> {
        let method = request.call().method();
        best_effort(method, || self.sink.record_request(method, &request.body));
        Ok(request)
    }

    fn observe(&self, request: &ApiRequest, response: ApiResponse) -> ApiResponse {
        let method = request.call().method();
        best_effort(method, || {
            self.sink
                .record_response(method, response.status, &response.body)
        });
        response
    }
}
