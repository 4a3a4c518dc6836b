//! Bearer-token authentication for the publishing trigger.

use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

/// Secrets a trigger may present. Unset or empty values never match.
#[derive(Debug, Clone, Default)]
pub struct TriggerSecrets {
    /// Shared secret of the external cron scheduler.
    pub cron_secret: Option<String>,
    /// Privileged backend key.
    pub service_role_key: Option<String>,
    /// Public key; accepted only as a deprecated fallback.
    pub anon_key: Option<String>,
}

impl TriggerSecrets {
    pub fn is_empty(&self) -> bool {
        [&self.cron_secret, &self.service_role_key, &self.anon_key]
            .iter()
            .all(|s| s.as_deref().map_or(true, str::is_empty))
    }
}

/// Which secret the caller authenticated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCredential {
    CronSecret,
    ServiceRole,
    AnonKey,
}

impl TriggerCredential {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerCredential::CronSecret => "cron_secret",
            TriggerCredential::ServiceRole => "service_role",
            TriggerCredential::AnonKey => "anon_key",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerAuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone)]
pub struct TriggerAuthenticator {
    secrets: TriggerSecrets,
}

fn matches_secret(token: &str, secret: &Option<String>) -> bool {
    match secret.as_deref() {
        Some(secret) if !secret.is_empty() => token.as_bytes().ct_eq(secret.as_bytes()).into(),
        _ => false,
    }
}

impl TriggerAuthenticator {
    pub fn new(secrets: TriggerSecrets) -> Self {
        if secrets.is_empty() {
            warn!("No trigger secrets configured, every publishing request will be rejected");
        }
        Self { secrets }
    }

    /// Checks an `Authorization` header value.
    ///
    /// The token is compared against the cron secret, then the service-role
    /// key, then the anonymous key.
    pub fn authorize(
        &self,
        authorization: Option<&str>,
    ) -> Result<TriggerCredential, TriggerAuthError> {
        let header = authorization.ok_or(TriggerAuthError::MissingHeader)?;
        let (scheme, token) = header
            .trim()
            .split_once(' ')
            .ok_or(TriggerAuthError::MalformedHeader)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(TriggerAuthError::MalformedHeader);
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(TriggerAuthError::MalformedHeader);
        }

        if matches_secret(token, &self.secrets.cron_secret) {
            Ok(TriggerCredential::CronSecret)
        } else if matches_secret(token, &self.secrets.service_role_key) {
            Ok(TriggerCredential::ServiceRole)
        } else if matches_secret(token, &self.secrets.anon_key) {
            warn!("Publishing triggered with the anonymous key, configure a cron secret instead");
            Ok(TriggerCredential::AnonKey)
        } else {
            Err(TriggerAuthError::InvalidToken)
        }
    }
}
