//! Proof-of-possession token construction.

use chrono::Utc;
use jsonwebtoken::Header;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, SigningError};

use super::identity::{SigningKey, ThingIdentity};

/// Lifetime of a proof-of-possession token. The token only needs to
/// outlive the round that carries it.
const POP_LIFETIME_SECS: i64 = 300;

#[derive(Serialize)]
struct PopClaims<'a> {
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    nonce: &'a str,
    #[serde(flatten)]
    custom: &'a Map<String, Value>,
}

/// Sign a server challenge with the identity's key.
///
/// The resulting JWT binds the challenge (`nonce`), the thing (`sub`),
/// its realm (`aud`) and any custom claims configured on the identity;
/// the header carries the configured algorithm and key id.
pub(crate) fn sign_challenge(
    identity: &ThingIdentity,
    key: &SigningKey,
    challenge: &str,
) -> Result<String, Error> {
    let now = Utc::now().timestamp();
    let claims = PopClaims {
        sub: identity.name(),
        aud: identity.realm().as_str(),
        iat: now,
        exp: now + POP_LIFETIME_SECS,
        nonce: challenge,
        custom: identity.custom_claims(),
    };

    let mut header = Header::new(key.alg().as_algorithm());
    header.kid = Some(key.key_id().to_string());

    jsonwebtoken::encode(&header, &claims, key.encoding())
        .map_err(|e| SigningError::from(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Realm;
    use crate::SigningAlg;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use p256::pkcs8::{EncodePrivateKey, LineEnding};

    fn test_key() -> SigningKey {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        SigningKey::from_pem(SigningAlg::Es256, "pop.cnf", pem.as_bytes()).unwrap()
    }

    fn decode_part(part: &str) -> Value {
        let bytes = URL_SAFE_NO_PAD.decode(part).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn token_binds_challenge_and_identity() {
        let identity = ThingIdentity::new("sensor-17", Realm::new("/edge").unwrap())
            .with_custom_claim("serialNumber", "BCM-17-0042".into());
        let key = test_key();

        let token = sign_challenge(&identity, &key, "nonce-1234").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_part(parts[0]);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["kid"], "pop.cnf");

        let claims = decode_part(parts[1]);
        assert_eq!(claims["sub"], "sensor-17");
        assert_eq!(claims["aud"], "/edge");
        assert_eq!(claims["nonce"], "nonce-1234");
        assert_eq!(claims["serialNumber"], "BCM-17-0042");
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn tokens_for_different_challenges_differ() {
        let identity = ThingIdentity::new("sensor-17", Realm::root());
        let key = test_key();

        let a = sign_challenge(&identity, &key, "nonce-a").unwrap();
        let b = sign_challenge(&identity, &key, "nonce-b").unwrap();
        assert_ne!(a, b);
    }
}
