//! Stream Endpoint
//!
//! Validated WebSocket URL carrying the access token as a `token` query
//! parameter. The token never appears in `Display` or `Debug` output.

use std::fmt;

use url::Url;

/// Default streaming endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://ws.finnhub.io";

const TOKEN_PARAM: &str = "token";

/// Invalid endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// URL could not be parsed.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// URL scheme is not `ws` or `wss`.
    #[error("unsupported endpoint scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
    /// URL has no host.
    #[error("endpoint URL has no host")]
    MissingHost,
    /// Access token is empty.
    #[error("access token cannot be empty")]
    EmptyToken,
}

/// Connection target for the quote stream.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Build the endpoint from a base URL and access token.
    ///
    /// Any `token` parameter already present on `base` is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, not a WebSocket URL, has no
    /// host, or the token is empty.
    pub fn new(base: &str, token: &str) -> Result<Self, EndpointError> {
        if token.trim().is_empty() {
            return Err(EndpointError::EmptyToken);
        }

        let mut url = Url::parse(base.trim())?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(EndpointError::MissingHost);
        }

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != TOKEN_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &retained {
                query.append_pair(key, value);
            }
            query.append_pair(TOKEN_PARAM, token.trim());
        }

        Ok(Self { url })
    }

    /// Full URL including the token. Do not log.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// URL without query string, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.redacted())
            .field("token", &"[REDACTED]")
            .finish()
    }
}
