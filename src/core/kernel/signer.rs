use crate::core::types::SignType;
use md5::Md5;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

/// Signer trait for envelope authentication
///
/// Implementations turn a canonical string into the value carried in the
/// envelope's `Sign` field. Signing is pure: no I/O, no shared state.
pub trait Signer: Send + Sync {
    /// Algorithm recorded in the envelope's `SignType` field
    fn sign_type(&self) -> SignType;

    /// Sign a canonical string
    fn sign(&self, canonical: &str) -> String;
}

/// Digest `canonical + secret` with the given algorithm, uppercase hex.
///
/// The secret is appended without a separator; an empty secret signs the
/// bare canonical string.
pub fn sign_canonical(canonical: &str, secret: &str, sign_type: SignType) -> String {
    match sign_type {
        SignType::Md5 => digest_upper_hex::<Md5>(canonical, secret),
        SignType::Sha256 => digest_upper_hex::<Sha256>(canonical, secret),
    }
}

fn digest_upper_hex<D: Digest>(canonical: &str, secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Shared-secret digest signer used by the open API
pub struct DigestSigner {
    secret_key: Secret<String>,
    sign_type: SignType,
}

impl DigestSigner {
    pub fn new(secret_key: Secret<String>, sign_type: SignType) -> Self {
        Self {
            secret_key,
            sign_type,
        }
    }

    pub fn md5(secret_key: String) -> Self {
        Self::new(Secret::new(secret_key), SignType::Md5)
    }

    pub fn sha256(secret_key: String) -> Self {
        Self::new(Secret::new(secret_key), SignType::Sha256)
    }
}

impl std::fmt::Debug for DigestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestSigner")
            .field("sign_type", &self.sign_type)
            .finish_non_exhaustive()
    }
}

impl Signer for DigestSigner {
    fn sign_type(&self) -> SignType {
        self.sign_type
    }

    fn sign(&self, canonical: &str) -> String {
        sign_canonical(canonical, self.secret_key.expose_secret(), self.sign_type)
    }
}
