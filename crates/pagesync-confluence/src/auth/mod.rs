//! Authentication for the Confluence REST API.
//!
//! The credential shape is an explicit tagged union; the client dispatches on
//! the tag to build the `Authorization` header for each request.

mod jwt;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

/// Credentials used to authenticate REST requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// HTTP Basic with an account email and API token.
    Basic {
        /// Account email or username.
        email: String,
        /// API token or password.
        api_token: String,
    },
    /// Bearer token (OAuth 2.0 access token or personal access token).
    OAuth2 {
        /// Access token.
        access_token: String,
    },
    /// Atlassian Connect JWT signed with a shared secret (HS256).
    Jwt {
        /// Issuer claim (the app key).
        issuer: String,
        /// Shared secret used for signing.
        secret: String,
        /// Token lifetime in seconds.
        expiry_seconds: u64,
    },
}

impl Authentication {
    /// Build the `Authorization` header value for one request.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, PUT, DELETE)
    /// * `path` - Request path relative to the server base URL
    /// * `query` - Query parameters sent with the request
    pub(crate) fn header(&self, method: &str, path: &str, query: &[(&str, String)]) -> String {
        match self {
            Self::Basic { email, api_token } => {
                let encoded = BASE64_STANDARD.encode(format!("{email}:{api_token}"));
                format!("Basic {encoded}")
            }
            Self::OAuth2 { access_token } => format!("Bearer {access_token}"),
            Self::Jwt {
                issuer,
                secret,
                expiry_seconds,
            } => {
                let token = jwt::sign(
                    &jwt::Claims::new(issuer, method, path, query, jwt::now(), *expiry_seconds),
                    secret,
                );
                format!("JWT {token}")
            }
        }
    }

    /// Short name of the credential kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::OAuth2 { .. } => "oauth2",
            Self::Jwt { .. } => "jwt",
        }
    }
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets never reach logs.
        f.debug_struct("Authentication")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}
