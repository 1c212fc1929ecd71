//! Request identity rotation
//!
//! An identity is the full set of browser-like headers a worker presents to
//! the upstream. The pool is immutable once built and is shared by every
//! worker through an `Arc`; picking an identity needs no locking.

mod pool;

pub use pool::builtin_identities;

use crate::config::IdentityEntry;
use crate::ConfigError;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION,
    EXPIRES, PRAGMA, REFERER, USER_AGENT,
};

/// A realistic client identity
///
/// `Accept-Encoding` is deliberately absent: the HTTP client negotiates
/// compression itself, and a hand-set header would switch off transparent
/// decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub referer: String,
    pub accept: String,
    pub accept_language: String,
    pub cache_control: String,
}

impl Identity {
    /// Renders the identity as request headers
    ///
    /// The identity's own `Cache-Control` is validated, then replaced by the
    /// no-cache triple so responses are never served from an intermediary cache.
    pub fn to_header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        insert(&mut headers, USER_AGENT, &self.user_agent)?;
        insert(&mut headers, REFERER, &self.referer)?;
        insert(&mut headers, ACCEPT, &self.accept)?;
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language)?;
        insert(&mut headers, CONNECTION, "keep-alive")?;
        insert(&mut headers, CACHE_CONTROL, &self.cache_control)?;
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        insert(&mut headers, PRAGMA, "no-cache")?;
        insert(&mut headers, EXPIRES, "0")?;
        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), ConfigError> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| ConfigError::InvalidHeader(format!("{}: '{}'", name, value)))?;
    headers.insert(name, value);
    Ok(())
}

impl From<&IdentityEntry> for Identity {
    fn from(entry: &IdentityEntry) -> Self {
        Self {
            user_agent: entry.user_agent.clone(),
            referer: entry.referer.clone(),
            accept: entry.accept.clone(),
            accept_language: entry.accept_language.clone(),
            cache_control: entry.cache_control.clone(),
        }
    }
}

/// Immutable pool of identities with uniform random selection
#[derive(Debug, Clone)]
pub struct IdentityRotator {
    pool: Vec<Identity>,
}

impl IdentityRotator {
    /// Creates a rotator over the given pool
    ///
    /// Every identity is rendered once up front so a bad header value is a
    /// startup error rather than a per-request one.
    pub fn new(pool: Vec<Identity>) -> Result<Self, ConfigError> {
        if pool.is_empty() {
            return Err(ConfigError::Validation(
                "identity pool cannot be empty".to_string(),
            ));
        }
        for identity in &pool {
            identity.to_header_map()?;
        }
        Ok(Self { pool })
    }

    /// Builds the rotator from configured identities, falling back to the built-in pool
    pub fn from_entries(entries: &[IdentityEntry]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            Ok(Self::default())
        } else {
            Self::new(entries.iter().map(Identity::from).collect())
        }
    }

    /// Picks an identity uniformly at random
    pub fn next(&self) -> &Identity {
        self.next_from(&mut rand::thread_rng())
    }

    /// Picks an identity using the supplied RNG (seed it for deterministic selection)
    pub fn next_from<R: Rng>(&self, rng: &mut R) -> &Identity {
        &self.pool[rng.gen_range(0..self.pool.len())]
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl Default for IdentityRotator {
    fn default() -> Self {
        Self {
            pool: builtin_identities(),
        }
    }
}
