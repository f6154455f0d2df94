// src/identity.rs

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use axum::http::HeaderMap;
use std::fmt;

pub const ANONYMOUS_USER: &str = "system:anonymous";

/// Caller identity, extracted once per request and never modified afterwards.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RequestIdentity {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub groups: Vec<String>,
}

impl fmt::Debug for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdentity")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("groups", &self.groups)
            .finish()
    }
}

impl RequestIdentity {
    /// Identity used when authentication is disabled.
    pub fn anonymous() -> Self {
        Self {
            token: None,
            user_id: Some(ANONYMOUS_USER.to_string()),
            groups: Vec::new(),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_none() && self.user_id.as_deref() == Some(ANONYMOUS_USER)
    }

    /// Reads the bearer token and trusted user/group headers.
    ///
    /// Fails with [`AppError::IdentityMissing`] when neither a token nor a user id is present.
    pub fn from_headers(headers: &HeaderMap, auth: &AuthConfig) -> Result<Self> {
        let token = header_value(headers, &auth.token_header).and_then(|raw| {
            let token = strip_prefix_ignore_case(raw, &auth.token_prefix).trim();
            (!token.is_empty()).then(|| token.to_string())
        });

        let user_id = header_value(headers, &auth.user_id_header).map(str::to_string);

        let groups = header_value(headers, &auth.groups_header)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if token.is_none() && user_id.is_none() {
            return Err(AppError::IdentityMissing);
        }

        Ok(Self {
            token,
            user_id,
            groups,
        })
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Strips the scheme prefix. The header value arrives trimmed, so `"Bearer "`
/// also matches a bare `"Bearer"` and leaves an empty credential.
fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> &'a str {
    let scheme = prefix.trim_end();
    if scheme.is_empty() || value.len() < scheme.len() || !value.is_char_boundary(scheme.len()) {
        return value;
    }
    let (head, rest) = value.split_at(scheme.len());
    let separated =
        scheme.len() == prefix.len() || rest.is_empty() || rest.starts_with(char::is_whitespace);
    if head.eq_ignore_ascii_case(scheme) && separated {
        rest
    } else {
        value
    }
}
