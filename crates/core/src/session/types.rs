//! Types for the session module.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::surface::Surface;

/// What is known about a token's validity.
///
/// Only probing the surface moves a token out of `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenValidity {
    Unknown,
    Valid,
    Invalid,
}

/// Opaque credential material (cookies) exported from an authenticated surface.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    bytes: Vec<u8>,
    validity: TokenValidity,
}

impl SessionToken {
    /// Wraps exported bytes. Validity starts out unknown.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            validity: TokenValidity::Unknown,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn validity(&self) -> TokenValidity {
        self.validity
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn mark(&mut self, validity: TokenValidity) {
        self.validity = validity;
    }

    /// Returns the token marked as valid.
    pub fn into_valid(mut self) -> Self {
        self.validity = TokenValidity::Valid;
        self
    }
}

// Token bytes are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("len", &self.bytes.len())
            .field("validity", &self.validity)
            .finish()
    }
}

/// An authenticated surface ready for the acquisition phase.
#[derive(Clone)]
pub struct EstablishedSession {
    pub surface: Arc<dyn Surface>,
    pub token: SessionToken,
    /// Whether a persisted token was accepted (no credentials were typed).
    pub reused: bool,
}

impl fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("surface", &self.surface.id())
            .field("token", &self.token)
            .field("reused", &self.reused)
            .finish()
    }
}
