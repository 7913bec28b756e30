//! Calling contexts
//!
//! A [`LockContext`] is the unit of ownership: the registry files tokens
//! under its [`ContextId`], and a release only succeeds from the context
//! that acquired. Contexts are passed explicitly to every manager call, so
//! one task can act for several contexts and several tasks can share one.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of a calling context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Explicit execution context for lock calls.
///
/// Cloning keeps the same id and cancellation token.
#[derive(Debug, Clone)]
pub struct LockContext {
    id: ContextId,
    name: Option<Arc<str>>,
    cancellation: CancellationToken,
}

impl LockContext {
    /// Create an anonymous context with its own cancellation token.
    pub fn new() -> Self {
        Self {
            id: ContextId::new(),
            name: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a context with a human-readable name for logs.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// A new context, with its own id, cancelled whenever this one is.
    pub fn child(&self) -> Self {
        Self {
            id: ContextId::new(),
            name: self.name.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Context id
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Context name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Cancellation token observed by acquisition waits
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel any acquisition waiting on behalf of this context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called here or
    /// on a parent.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Default for LockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
