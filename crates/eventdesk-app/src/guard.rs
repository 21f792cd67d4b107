// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Current-user token as cached by the sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthToken {
    /// Reads a cached token. A missing file means nobody is signed in.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read token cache {}", path.display()))?;
        let token = serde_json::from_str(&raw).with_context(|| {
            format!(
                "parse token cache {}; sign in again to refresh it",
                path.display()
            )
        })?;
        Ok(Some(token))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create token directory {}", parent.display()))?;
        }
        let encoded = serde_json::to_string_pretty(self).context("encode token")?;
        fs::write(path, encoded).with_context(|| format!("write token cache {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    MissingToken,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow { subject: String },
    Redirect { to: String, reason: RedirectReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_route: String,
    expiry_skew: Duration,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_ROUTE, Duration::ZERO)
    }
}

impl RouteGuard {
    pub fn new(login_route: impl Into<String>, expiry_skew: Duration) -> Self {
        Self {
            login_route: login_route.into(),
            expiry_skew,
        }
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Tokens that expire within the skew window are already treated as
    /// expired, as are tokens whose window reaches past the earliest
    /// representable instant.
    pub fn check(&self, token: Option<&AuthToken>, now: OffsetDateTime) -> GuardDecision {
        let Some(token) = token else {
            debug!(route = %self.login_route, "no cached token; redirecting");
            return self.redirect(RedirectReason::MissingToken);
        };
        let usable_until = token.expires_at.checked_sub(self.expiry_skew);
        if usable_until.is_none_or(|until| until <= now) {
            warn!(subject = %token.subject, expires_at = %token.expires_at, "cached token expired; redirecting");
            return self.redirect(RedirectReason::Expired);
        }
        GuardDecision::Allow {
            subject: token.subject.clone(),
        }
    }

    fn redirect(&self, reason: RedirectReason) -> GuardDecision {
        GuardDecision::Redirect {
            to: self.login_route.clone(),
            reason,
        }
    }
}
