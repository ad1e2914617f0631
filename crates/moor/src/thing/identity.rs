//! Thing identity and signing configuration.

use jsonwebtoken::{Algorithm, EncodingKey};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, SigningError};
use crate::types::Realm;

/// Signing algorithm for proof-of-possession tokens.
///
/// The algorithm is an explicit per-device configuration choice and is
/// never inferred from the key material. No single algorithm is
/// privileged by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlg {
    /// ECDSA over P-256 with SHA-256.
    Es256,
    /// ECDSA over P-384 with SHA-384.
    Es384,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    Rs512,
    /// RSASSA-PSS with SHA-256.
    Ps256,
    /// RSASSA-PSS with SHA-384.
    Ps384,
    /// RSASSA-PSS with SHA-512.
    Ps512,
    /// Ed25519.
    EdDsa,
}

impl SigningAlg {
    pub(crate) fn as_algorithm(self) -> Algorithm {
        match self {
            SigningAlg::Es256 => Algorithm::ES256,
            SigningAlg::Es384 => Algorithm::ES384,
            SigningAlg::Rs256 => Algorithm::RS256,
            SigningAlg::Rs384 => Algorithm::RS384,
            SigningAlg::Rs512 => Algorithm::RS512,
            SigningAlg::Ps256 => Algorithm::PS256,
            SigningAlg::Ps384 => Algorithm::PS384,
            SigningAlg::Ps512 => Algorithm::PS512,
            SigningAlg::EdDsa => Algorithm::EdDSA,
        }
    }
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigningAlg::Es256 => "ES256",
            SigningAlg::Es384 => "ES384",
            SigningAlg::Rs256 => "RS256",
            SigningAlg::Rs384 => "RS384",
            SigningAlg::Rs512 => "RS512",
            SigningAlg::Ps256 => "PS256",
            SigningAlg::Ps384 => "PS384",
            SigningAlg::Ps512 => "PS512",
            SigningAlg::EdDsa => "EdDSA",
        };
        write!(f, "{}", name)
    }
}

/// A private signing key with its algorithm and key identifier.
///
/// # Security
///
/// The key material is never exposed in Debug output.
#[derive(Clone)]
pub struct SigningKey {
    alg: SigningAlg,
    key_id: String,
    encoding: EncodingKey,
}

impl SigningKey {
    /// Load a signing key from PEM-encoded key material.
    ///
    /// The PEM family must match the algorithm family: EC keys for
    /// `Es*`, RSA keys for `Rs*`/`Ps*`, Ed25519 keys for `EdDsa`.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the PEM cannot be parsed as a key of
    /// the configured family.
    pub fn from_pem(alg: SigningAlg, key_id: impl Into<String>, pem: &[u8]) -> Result<Self, Error> {
        let encoding = match alg {
            SigningAlg::Es256 | SigningAlg::Es384 => EncodingKey::from_ec_pem(pem),
            SigningAlg::Rs256
            | SigningAlg::Rs384
            | SigningAlg::Rs512
            | SigningAlg::Ps256
            | SigningAlg::Ps384
            | SigningAlg::Ps512 => EncodingKey::from_rsa_pem(pem),
            SigningAlg::EdDsa => EncodingKey::from_ed_pem(pem),
        }
        .map_err(|e| SigningError::InvalidKey {
            message: e.to_string(),
        })?;

        Ok(Self {
            alg,
            key_id: key_id.into(),
            encoding,
        })
    }

    /// Returns the configured algorithm.
    pub fn alg(&self) -> SigningAlg {
        self.alg
    }

    /// Returns the key identifier sent in token headers.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("alg", &self.alg)
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// The identity of one thing.
///
/// Owned exclusively by the [`ThingSession`](crate::ThingSession) that
/// represents the device; identities are never shared across sessions.
///
/// # Example
///
/// ```no_run
/// use moor::{Realm, SigningAlg, SigningKey, ThingIdentity};
///
/// # fn example() -> Result<(), moor::Error> {
/// let pem = std::fs::read("thing.key.pem").expect("key file");
/// let key = SigningKey::from_pem(SigningAlg::Es256, "pop.cnf", &pem)?;
/// let identity = ThingIdentity::new("sensor-17", Realm::new("/edge")?)
///     .with_key(key)
///     .with_custom_claim("serialNumber", "BCM-17-0042".into());
/// # Ok(())
/// # }
/// ```
pub struct ThingIdentity {
    name: String,
    realm: Realm,
    secret: Option<String>,
    key: Option<SigningKey>,
    custom_claims: Map<String, Value>,
}

impl ThingIdentity {
    /// Create a new identity with no credentials attached.
    pub fn new(name: impl Into<String>, realm: Realm) -> Self {
        Self {
            name: name.into(),
            realm,
            secret: None,
            key: None,
            custom_claims: Map::new(),
        }
    }

    /// Attach a secret for password-collecting trees.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Attach a signing key for proof-of-possession trees.
    pub fn with_key(mut self, key: SigningKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Attach a custom claim included in every proof-of-possession token.
    pub fn with_custom_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.custom_claims.insert(name.into(), value);
        self
    }

    /// Returns the thing's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the thing's realm.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub(crate) fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub(crate) fn key(&self) -> Option<&SigningKey> {
        self.key.as_ref()
    }

    pub(crate) fn custom_claims(&self) -> &Map<String, Value> {
        &self.custom_claims
    }
}

// Intentionally hide the secret in Debug output
impl fmt::Debug for ThingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThingIdentity")
            .field("name", &self.name)
            .field("realm", &self.realm)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("key", &self.key)
            .finish()
    }
}
