//! Token service: HMAC-signed access tokens for agents and operators.
//!
//! Tokens are minted from a shared registration secret and validated on
//! every request. A token is `<base64url(claims json)>.<base64url(hmac)>`
//! signed with HMAC-SHA256. Validation is synchronous and stateless; it
//! never touches the WAL lock.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::OrchestratorError;

type HmacSha256 = Hmac<Sha256>;

/// Who a token acts as.
///
/// Encoded in claims as `"operator"` or `"agent:<id>"` so an agent
/// literally named "operator" cannot forge operator scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Subject {
    /// Unscoped token: any registry/job operation, never agent polling.
    Operator,
    /// Token scoped to a single agent identity.
    Agent(String),
}

impl Subject {
    /// Returns `true` for operator tokens.
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator)
    }

    /// Returns the agent identity for agent-scoped tokens.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Operator => None,
            Self::Agent(id) => Some(id),
        }
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::Operator => "operator".to_string(),
            Subject::Agent(id) => format!("agent:{id}"),
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "operator" {
            return Ok(Self::Operator);
        }
        match value.strip_prefix("agent:") {
            Some(id) if !id.is_empty() => Ok(Self::Agent(id.to_string())),
            _ => Err(format!("invalid token subject: {value}")),
        }
    }
}

/// Validated claims carried by a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token subject: operator or a specific agent.
    pub subject: Subject,
    /// When the token was minted.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being accepted.
    pub expiry: DateTime<Utc>,
}

impl Claims {
    /// Returns `true` if this token may act on the given agent's
    /// commands and events. Operator tokens never may — agents poll
    /// with their own identity.
    #[must_use]
    pub fn can_act_for_agent(&self, agent_id: &str) -> bool {
        self.subject.agent_id() == Some(agent_id)
    }
}

/// Mints and validates signed access tokens.
#[derive(Clone)]
pub struct TokenService {
    signing_key: Vec<u8>,
    registration_secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of logs.
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service.
    #[must_use]
    pub fn new(signing_secret: &str, registration_secret: &str, ttl_secs: u64) -> Self {
        Self {
            signing_key: signing_secret.as_bytes().to_vec(),
            registration_secret: registration_secret.to_string(),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    /// Mints a token, optionally scoped to a single agent identity.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Auth`] if `registration_secret` does
    /// not match the configured value, or
    /// [`OrchestratorError::InvalidRequest`] on an empty agent id.
    pub fn mint(
        &self,
        registration_secret: &str,
        agent_id: Option<&str>,
    ) -> Result<String, OrchestratorError> {
        if registration_secret != self.registration_secret {
            return Err(OrchestratorError::Auth(
                "registration secret rejected".to_string(),
            ));
        }

        let subject = match agent_id {
            Some(id) if id.trim().is_empty() => {
                return Err(OrchestratorError::InvalidRequest(
                    "agent_id must not be empty".to_string(),
                ));
            }
            Some(id) => Subject::Agent(id.to_string()),
            None => Subject::Operator,
        };

        let now = Utc::now();
        let claims = Claims {
            subject,
            issued_at: now,
            expiry: now + self.ttl,
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|e| OrchestratorError::Internal(format!("claims encoding failed: {e}")))?;
        let signature = self.sign(&payload)?;

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Auth`] if the token is malformed,
    /// the signature does not verify, or the token is expired.
    pub fn validate(&self, token: &str) -> Result<Claims, OrchestratorError> {
        let (payload_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| OrchestratorError::Auth("malformed token".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| OrchestratorError::Auth("malformed token payload".to_string()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| OrchestratorError::Auth("malformed token signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| OrchestratorError::Internal(format!("hmac init failed: {e}")))?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| OrchestratorError::Auth("invalid token signature".to_string()))?;

        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| OrchestratorError::Auth("invalid token claims".to_string()))?;

        if claims.expiry <= Utc::now() {
            return Err(OrchestratorError::Auth("token expired".to_string()));
        }

        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, OrchestratorError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| OrchestratorError::Internal(format!("hmac init failed: {e}")))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_service() -> TokenService {
        TokenService::new("signing-key", "reg-secret", 3600)
    }

    #[test]
    fn operator_token_round_trips() {
        let service = make_service();
        let token = service.mint("reg-secret", None);
        let Ok(token) = token else {
            panic!("mint failed");
        };
        let claims = service.validate(&token);
        let Ok(claims) = claims else {
            panic!("validate failed");
        };
        assert!(claims.subject.is_operator());
        assert!(!claims.can_act_for_agent("agent-1"));
    }

    #[test]
    fn agent_token_is_scoped() {
        let service = make_service();
        let token = service.mint("reg-secret", Some("agent-1"));
        let Ok(token) = token else {
            panic!("mint failed");
        };
        let claims = service.validate(&token);
        let Ok(claims) = claims else {
            panic!("validate failed");
        };
        assert!(claims.can_act_for_agent("agent-1"));
        assert!(!claims.can_act_for_agent("agent-2"));
        assert!(!claims.subject.is_operator());
    }

    #[test]
    fn wrong_registration_secret_is_rejected() {
        let service = make_service();
        let result = service.mint("wrong", None);
        assert!(matches!(result, Err(OrchestratorError::Auth(_))));
    }

    #[test]
    fn empty_agent_id_is_rejected() {
        let service = make_service();
        let result = service.mint("reg-secret", Some("  "));
        assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = make_service();
        let token = service.mint("reg-secret", Some("agent-1")).ok();
        let Some(token) = token else {
            panic!("mint failed");
        };
        let tampered = format!("A{token}");
        assert!(matches!(
            service.validate(&tampered),
            Err(OrchestratorError::Auth(_))
        ));
    }

    #[test]
    fn foreign_signing_key_is_rejected() {
        let service = make_service();
        let other = TokenService::new("other-key", "reg-secret", 3600);
        let token = other.mint("reg-secret", None).ok();
        let Some(token) = token else {
            panic!("mint failed");
        };
        assert!(matches!(
            service.validate(&token),
            Err(OrchestratorError::Auth(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new("signing-key", "reg-secret", 0);
        let token = service.mint("reg-secret", None).ok();
        let Some(token) = token else {
            panic!("mint failed");
        };
        assert!(matches!(
            service.validate(&token),
            Err(OrchestratorError::Auth(_))
        ));
    }

    #[test]
    fn agent_named_operator_cannot_forge_scope() {
        let service = make_service();
        let token = service.mint("reg-secret", Some("operator")).ok();
        let Some(token) = token else {
            panic!("mint failed");
        };
        let claims = service.validate(&token).ok();
        let Some(claims) = claims else {
            panic!("validate failed");
        };
        assert!(!claims.subject.is_operator());
        assert!(claims.can_act_for_agent("operator"));
    }
}
