use crate::core::config::ClientConfig;
use crate::core::errors::BeyondhError;
use crate::core::kernel::canonical::{canonicalize, is_empty_value};
use crate::core::kernel::signer::{DigestSigner, Signer};
use crate::core::types::{Call, Envelope};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Envelope `Timestamp` layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which top-level content fields are dropped before `BizContent` is encoded.
///
/// Envelope metadata is always filtered with the canonical empty rule; this
/// policy only concerns the business content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    /// Drop `null` fields only; `false`, `0` and `""` are sent as-is
    #[default]
    NullOnly,
    /// Drop every field the canonicalizer considers empty
    Empty,
}

impl ContentFilter {
    pub fn apply(self, content: &Map<String, Value>) -> Map<String, Value> {
        content
            .iter()
            .filter(|(_, value)| match self {
                Self::NullOnly => !value.is_null(),
                Self::Empty => !is_empty_value(value),
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Source of envelope timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
    pub fn parse(timestamp: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Canonical string of every non-`Sign` envelope field
pub fn canonical_string(envelope: &Envelope) -> String {
    let fields = envelope.signing_fields();
    canonicalize(fields.iter().map(|(k, v)| (*k, v)))
}

/// Recompute the signature over an envelope and compare it with `Sign`
pub fn verify(envelope: &Envelope, signer: &dyn Signer) -> bool {
    envelope.sign_type == signer.sign_type() && signer.sign(&canonical_string(envelope)) == envelope.sign
}

/// Turns calls into signed envelopes. A fresh envelope is built for every call.
#[derive(Clone)]
pub struct EnvelopeBuilder {
    channel_key: String,
    signer: Arc<dyn Signer>,
    content_filter: ContentFilter,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeBuilder")
            .field("channel_key", &self.channel_key)
            .field("sign_type", &self.signer.sign_type())
            .field("content_filter", &self.content_filter)
            .finish_non_exhaustive()
    }
}

impl EnvelopeBuilder {
    pub fn new(channel_key: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            channel_key: channel_key.into(),
            signer,
            content_filter: ContentFilter::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let signer = DigestSigner::new(config.secret_key.clone(), config.sign_type);
        Self::new(config.channel_key.clone(), Arc::new(signer))
            .with_content_filter(config.content_filter)
    }

    pub fn with_content_filter(mut self, content_filter: ContentFilter) -> Self {
        self.content_filter = content_filter;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// Build and sign an envelope stamped with the current time
    pub fn build(&self, call: &Call) -> Result<Envelope, BeyondhError> {
        self.build_at(call, self.clock.now())
    }

    /// Build and sign an envelope stamped with `at`
    pub fn build_at(&self, call: &Call, at: NaiveDateTime) -> Result<Envelope, BeyondhError> {
        if call.method().trim().is_empty() {
            return Err(BeyondhError::InvalidCall("method name is empty".to_string()));
        }

        let content = self.content_filter.apply(call.content());
        // An empty map still encodes as `{}`, which the server expects over `[]`
        let biz_content = serde_json::to_string(&content)?;

        let mut envelope = Envelope {
            channel_key: self.channel_key.clone(),
            method: call.method().to_string(),
            biz_content,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            sign_type: self.signer.sign_type(),
            format: Envelope::FORMAT.to_string(),
            charset: Envelope::CHARSET.to_string(),
            version: Envelope::VERSION.to_string(),
            sign: String::new(),
        };
        envelope.sign = self.signer.sign(&canonical_string(&envelope));
        Ok(envelope)
    }
}
