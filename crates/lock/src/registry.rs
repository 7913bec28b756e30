//! Local ownership bookkeeping
//!
//! Maps each context to the tokens it believes it holds. The registry is
//! never proof of exclusivity; only the store's current value is. It exists
//! so a release can tell the store which token to compare against.

use std::collections::HashMap;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::context::ContextId;
use crate::handle::OwnershipToken;

/// Two-level map `context -> (key -> token)`
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    contexts: DashMap<ContextId, HashMap<String, OwnershipToken>>,
}

impl OwnershipRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `token` for `key`, returning the entry it replaced.
    pub fn record(
        &self,
        context: ContextId,
        key: &str,
        token: OwnershipToken,
    ) -> Option<OwnershipToken> {
        self.contexts
            .entry(context)
            .or_default()
            .insert(key.to_owned(), token)
    }

    /// Token recorded for `key`.
    pub fn token(&self, context: ContextId, key: &str) -> Option<OwnershipToken> {
        self.contexts.get(&context)?.get(key).cloned()
    }

    /// Remove and return the token for `key`.
    pub fn take(&self, context: ContextId, key: &str) -> Option<OwnershipToken> {
        self.take_where(context, key, |_| true)
    }

    /// Remove the entry for `key` only if it still holds `token`.
    pub fn take_if(&self, context: ContextId, key: &str, token: &OwnershipToken) -> bool {
        self.take_where(context, key, |current| current == token)
            .is_some()
    }

    fn take_where(
        &self,
        context: ContextId,
        key: &str,
        matches: impl FnOnce(&OwnershipToken) -> bool,
    ) -> Option<OwnershipToken> {
        let Entry::Occupied(mut entry) = self.contexts.entry(context) else {
            return None;
        };

        let keys = entry.get_mut();
        if !keys.get(key).is_some_and(matches) {
            return None;
        }
        let token = keys.remove(key);
        if keys.is_empty() {
            entry.remove();
        }
        token
    }

    /// Keys held by `context`, sorted.
    pub fn held_keys(&self, context: ContextId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .contexts
            .get(&context)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Total number of entries across all contexts.
    pub fn len(&self) -> usize {
        self.contexts.iter().map(|keys| keys.len()).sum()
    }

    /// Returns `true` if no context holds anything.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Number of contexts with at least one entry.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_replaces_instead_of_merging() {
        let registry = OwnershipRegistry::new();
        let ctx = ContextId::new();
        let first = OwnershipToken::generate();
        let second = OwnershipToken::generate();

        assert_eq!(registry.record(ctx, "k", first.clone()), None);
        assert_eq!(registry.record(ctx, "k", second.clone()), Some(first));
        assert_eq!(registry.token(ctx, "k"), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn one_context_can_hold_many_keys() {
        let registry = OwnershipRegistry::new();
        let ctx = ContextId::new();
        registry.record(ctx, "b", OwnershipToken::generate());
        registry.record(ctx, "a", OwnershipToken::generate());

        assert_eq!(registry.held_keys(ctx), vec!["a".to_owned(), "b".to_owned()]);
        assert!(registry.take(ctx, "a").is_some());
        assert_eq!(registry.held_keys(ctx), vec!["b".to_owned()]);
    }

    #[test]
    fn contexts_are_isolated() {
        let registry = OwnershipRegistry::new();
        let a = ContextId::new();
        let b = ContextId::new();
        registry.record(a, "k", OwnershipToken::generate());

        assert_eq!(registry.token(b, "k"), None);
        assert_eq!(registry.take(b, "k"), None);
        assert!(registry.token(a, "k").is_some());
    }

    #[test]
    fn take_if_only_removes_a_matching_token() {
        let registry = OwnershipRegistry::new();
        let ctx = ContextId::new();
        let stale = OwnershipToken::generate();
        let current = OwnershipToken::generate();
        registry.record(ctx, "k", current.clone());

        assert!(!registry.take_if(ctx, "k", &stale));
        assert_eq!(registry.token(ctx, "k"), Some(current.clone()));
        assert!(registry.take_if(ctx, "k", &current));
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_contexts_are_dropped() {
        let registry = OwnershipRegistry::new();
        let ctx = ContextId::new();
        registry.record(ctx, "k", OwnershipToken::generate());
        assert_eq!(registry.context_count(), 1);

        registry.take(ctx, "k");
        assert_eq!(registry.context_count(), 0);
    }
}
