/// Beyondh Kernel - the outbound request pipeline shared by every resource client
///
/// Every call made through the SDK goes through the same four steps: the raw
/// call is canonicalized, signed, wrapped into an envelope and dispatched over
/// a bounded transport. Exchanged payloads can optionally be logged.
///
/// # Architecture
///
/// ## Signing
/// - `canonical`: the `key=value&...` rule shared with the server
/// - `Signer` / `DigestSigner`: MD5 or SHA-256 over canonical string + secret
/// - `EnvelopeBuilder`: call → signed `Envelope`, fresh timestamp per call
///
/// ## Pipeline
/// - `Pipeline`: ordered stages, transforms in order, observers in reverse
/// - `BodyRefactor`: swaps the raw call body for the signed envelope
/// - `PayloadLogging`: best-effort request/response logging
///
/// ## Transport
/// - `Transport`: single `send` operation returning the raw response
/// - `ReqwestTransport`: HTTP POST to the configured endpoint
/// - `PooledTransport`: in-flight ceiling backed by a semaphore
///
/// # Example
///
/// ```rust,no_run
/// use beyondh::core::kernel::*;
/// use beyondh::core::types::Call;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = EnvelopeBuilder::new("channel", Arc::new(DigestSigner::md5("secret".to_string())));
/// let envelope = builder.build(&Call::new("Bill.GetBillBalance").param("OrgId", 1001))?;
/// assert!(verify(&envelope, builder.signer()));
/// # Ok(())
/// # }
/// ```
pub mod canonical;
pub mod envelope;
pub mod middleware;
pub mod signer;
pub mod transport;

pub use canonical::{canonicalize, is_empty_value, BOOL_TRUE_REPR};
pub use envelope::{
    canonical_string, verify, Clock, ContentFilter, EnvelopeBuilder, FixedClock, SystemClock,
    TIMESTAMP_FORMAT,
};
pub use middleware::{
    BodyRefactor, LogSink, Middleware, PayloadLogging, Pipeline, TracingSink, BODY_REFACTOR,
    DOMAIN_HEADER, PAYLOAD_LOGGING,
};
pub use signer::{sign_canonical, DigestSigner, Signer};
pub use transport::{build_transport, PooledTransport, ReqwestTransport, Transport};
