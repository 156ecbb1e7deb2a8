//! Access-token inspection
//!
//! Tokens are issued elsewhere and handed to the tool. Only the JWT payload is
//! decoded here to find out who is signed in, whether the token was issued to
//! an application and when it expires. Signatures are never verified; the
//! APIs do that.

use crate::error::{M365Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Decoded claims of a JWT access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    claims: Value,
}

impl AccessToken {
    /// Decode the payload segment of a JWT
    pub fn parse(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| M365Error::AuthError("Access token is not a JWT".into()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| M365Error::AuthError(format!("Invalid access token payload: {}", e)))?;

        let claims: Value = serde_json::from_slice(&bytes)?;
        if !claims.is_object() {
            return Err(M365Error::AuthError(
                "Access token payload is not a JSON object".into(),
            ));
        }

        Ok(Self { claims })
    }

    fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(|v| v.as_str())
    }

    /// Signed-in user's name, `None` for app-only tokens
    pub fn user_name(&self) -> Option<&str> {
        self.claim_str("upn")
            .or_else(|| self.claim_str("unique_name"))
            .or_else(|| self.claim_str("preferred_username"))
    }

    /// True when the token was issued to an application rather than a user
    pub fn is_app_only(&self) -> bool {
        if let Some(idtyp) = self.claim_str("idtyp") {
            return idtyp == "app";
        }
        self.claims.get("scp").is_none() && self.claims.get("roles").is_some()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.claim_str("tid")
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.claims.get("exp").and_then(|v| v.as_i64())?;
        Utc.timestamp_opt(exp, 0).single()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false)
    }
}
