//! # Git Credentials
//!
//! Basic-auth credentials for the configuration repository remote and the
//! helpers that keep them out of logs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Username and token sent as HTTP basic credentials on clone and push.
///
/// The token is wiped when the value is dropped and never printed by `Debug`.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct GitCredentials {
    username: String,
    token: String,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl GitCredentials {
    #[must_use]
    pub fn new(username: String, token: String) -> Self {
        Self { username, token }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Value for git's `http.extraHeader`, or `None` when no token is configured.
    ///
    /// GitHub accepts the token as password for any username, so an empty
    /// username is sent as-is.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        if !self.has_token() {
            return None;
        }
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.token));
        Some(format!("Authorization: Basic {encoded}"))
    }
}

/// Strip any `user:password@` userinfo from a URL before it is logged.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = url[authority_start..]
        .find('/')
        .map_or(url.len(), |i| authority_start + i);
    match url[authority_start..authority_end].rfind('@') {
        Some(at) => format!(
            "{}***@{}",
            &url[..authority_start],
            &url[authority_start + at + 1..]
        ),
        None => url.to_string(),
    }
}
