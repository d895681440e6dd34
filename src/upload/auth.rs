use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

/// Decides whether a bearer credential grants admin access.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> bool;
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

#[derive(Deserialize)]
struct TokenClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Verifies compact HS256 JWS tokens against a shared secret.
///
/// Only `alg: HS256` is accepted. An `exp` claim, when present, must lie in
/// the future. With an empty secret every token is rejected.
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(String::into_bytes).unwrap_or_default(),
        }
    }

    fn check(&self, token: &str, now: i64) -> Result<(), &'static str> {
        if self.secret.is_empty() {
            return Err("no admin secret configured");
        }

        let (signing_input, signature) = token.rsplit_once('.').ok_or("not a compact token")?;
        let (header, claims) = signing_input.split_once('.').ok_or("not a compact token")?;
        if claims.contains('.') {
            return Err("not a compact token");
        }

        let header: TokenHeader = decode_json(header).ok_or("unreadable header")?;
        if header.alg != "HS256" {
            return Err("unsupported alg");
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| "unreadable signature")?;
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|_| "bad secret")?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| "signature mismatch")?;

        let claims: TokenClaims = decode_json(claims).ok_or("unreadable claims")?;
        if let Some(exp) = claims.exp {
            if exp <= now {
                return Err("expired");
            }
        }

        Ok(())
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[async_trait]
impl AuthVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str) -> bool {
        match self.check(token, chrono::Utc::now().timestamp()) {
            Ok(()) => true,
            Err(reason) => {
                debug!("Gallery/Auth: token rejected ({})", reason);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sign `claims` as an HS256 compact token.
    pub(crate) fn sign(secret: &str, claims: serde_json::Value) -> String {
        sign_with_alg(secret, "HS256", claims)
    }

    fn sign_with_alg(secret: &str, alg: &str, claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(serde_json::json!({ "alg": alg, "typ": "JWT" }).to_string());
        let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{}.{}", header, claims);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", signing_input, signature)
    }

    pub(crate) fn admin_token(secret: &str) -> String {
        sign(secret, serde_json::json!({ "sub": "admin" }))
    }

    fn verifier(secret: &str) -> HmacTokenVerifier {
        HmacTokenVerifier::new(Some(secret.to_string()))
    }

    #[tokio::test]
    async fn test_accepts_signed_token() {
        assert!(verifier("s3cret").verify(&admin_token("s3cret")).await);
    }

    #[tokio::test]
    async fn test_rejects_wrong_secret_and_garbage() {
        let v = verifier("s3cret");
        assert!(!v.verify(&admin_token("other")).await);
        assert!(!v.verify("").await);
        assert!(!v.verify("a.b").await);
        assert!(!v.verify("a.b.c.d").await);
    }

    #[tokio::test]
    async fn test_rejects_other_alg() {
        let token = sign_with_alg("s3cret", "none", serde_json::json!({}));
        assert!(!verifier("s3cret").verify(&token).await);
    }

    #[tokio::test]
    async fn test_rejects_tampered_claims() {
        let token = admin_token("s3cret");
        let parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":"mallory"}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(!verifier("s3cret").verify(&tampered).await);
    }

    #[test]
    fn test_honours_exp() {
        let v = verifier("s3cret");
        let token = sign("s3cret", serde_json::json!({ "exp": 1_000 }));
        assert_eq!(v.check(&token, 999), Ok(()));
        assert_eq!(v.check(&token, 1_000), Err("expired"));
    }

    #[tokio::test]
    async fn test_missing_secret_rejects_everything() {
        let v = HmacTokenVerifier::new(None);
        assert!(!v.verify(&admin_token("")).await);
        assert!(!HmacTokenVerifier::new(Some(String::new())).verify("x.y.z").await);
    }
}
