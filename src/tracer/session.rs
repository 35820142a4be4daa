//! Trace sessions and the session registry.

use std::collections::HashMap;
use std::fmt;

use axum::body::Bytes;
use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes in a session identifier.
pub const SESSION_ID_BYTES: usize = 32;

/// Fills a buffer with the random bytes behind a session id.
pub type IdSource = fn(&mut [u8]) -> Result<(), rand::Error>;

/// The operating system's CSPRNG.
pub fn os_random(bytes: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(bytes)
}

/// Error raised when the random source cannot produce an identifier.
#[derive(Debug, thiserror::Error)]
#[error("could not generate session id: {0}")]
pub struct SessionIdError(#[from] rand::Error);

/// Hex-encoded identifier of a captured trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from the OS CSPRNG.
    ///
    /// Fails rather than falling back to a weaker source; a guessable id
    /// would let any client read another client's trace.
    pub fn generate() -> Result<Self, SessionIdError> {
        Self::generate_from(os_random)
    }

    /// Generate an identifier from `source`.
    pub fn generate_from(source: IdSource) -> Result<Self, SessionIdError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        source(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header value form.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completed captures by session id.
///
/// Not synchronized on its own: the coordinator keeps it behind its
/// readers-writer lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    traces: HashMap<SessionId, Bytes>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SessionId, trace: Bytes) {
        self.traces.insert(id, trace);
    }

    /// Look up a session by its raw header value.
    pub fn get(&self, id: &str) -> Option<Bytes> {
        if id.is_empty() {
            return None;
        }
        // Bytes clones are reference counted.
        self.traces.get(id).cloned()
    }

    /// Drop every session.
    pub fn clear(&mut self) {
        self.traces = HashMap::new();
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl std::borrow::Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_hex_and_unique() {
        let a = SessionId::generate().unwrap();
        let b = SessionId::generate().unwrap();

        assert_eq!(a.as_str().len(), SESSION_ID_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(a.to_header_value().unwrap().to_str().unwrap(), a.as_str());
    }

    #[test]
    fn ids_come_from_the_given_source() {
        fn sevens(bytes: &mut [u8]) -> Result<(), rand::Error> {
            bytes.fill(0x77);
            Ok(())
        }

        let id = SessionId::generate_from(sevens).unwrap();
        assert_eq!(id.as_str(), "77".repeat(SESSION_ID_BYTES));
        let header = id.to_header_value().unwrap();
        assert_eq!(header.len(), SESSION_ID_BYTES * 2);
    }

    #[test]
    fn source_failure_yields_no_id() {
        fn exhausted(_bytes: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy unavailable")))
        }

        let err = SessionId::generate_from(exhausted).unwrap_err();
        assert!(err.to_string().starts_with("could not generate session id"));
    }

    #[test]
    fn registry_lookup_and_clear() {
        let mut registry = SessionRegistry::new();
        let id = SessionId::generate().unwrap();
        registry.insert(id.clone(), Bytes::from_static(b"trace"));

        assert_eq!(registry.get(id.as_str()).as_deref(), Some(&b"trace"[..]));
        assert!(registry.get("bogus").is_none());
        assert!(registry.get("").is_none());

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get(id.as_str()).is_none());
    }
}
