//! Explicit per-request storage for context values.
//!
//! A [`RequestScope`] stands for one logical request or render pass. It owns
//! one slot per [`ContextKey`] that was set in it and drops them all when the
//! scope itself is dropped or [cleared](RequestScope::clear). Handing a fresh
//! scope to the next request is what makes earlier values invisible to it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasherDefault, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;

use crate::context::{ContextId, ContextKey};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

// Context ids are sequential counters; spread them across all 64 bits so
// the high bits hashbrown uses for its control tags differ between keys.
const ID_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Default)]
struct IdHasher(u64);

impl Hasher for IdHasher {
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 << 8) | u64::from(*b);
        }
        self.0 = self.0.wrapping_mul(ID_MIX);
    }

    #[inline(always)]
    fn write_u64(&mut self, id: u64) {
        self.0 = id.wrapping_mul(ID_MIX);
    }

    #[inline(always)]
    fn finish(&self) -> u64 {
        self.0
    }
}

type SlotMap = HashMap<ContextId, Slot, BuildHasherDefault<IdHasher>>;

struct Slot {
    name: Arc<str>,
    value: Box<dyn Any + Send + Sync>,
}

/// Process-unique identity of one request scope, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Serializable summary of which contexts a scope currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeSnapshot {
    pub scope: ScopeId,
    pub contexts: Vec<String>,
}

/// Store for the context values of one request.
///
/// Writing requires `&mut self`, so within a request the borrow checker keeps
/// setters and getters sequential. Separate requests own separate scopes.
pub struct RequestScope {
    id: ScopeId,
    slots: SlotMap,
}

impl RequestScope {
    pub fn new() -> Self {
        let id = ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(scope = %id, "opened request scope");
        Self {
            id,
            slots: SlotMap::default(),
        }
    }

    /// Open a fresh scope, run `f` against it and drop it afterwards.
    pub fn run<R>(f: impl FnOnce(&mut RequestScope) -> R) -> R {
        let mut scope = RequestScope::new();
        f(&mut scope)
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Slot for `key`, created by `init` the first time it is asked for.
    ///
    /// `init` runs at most once per key for the lifetime of this scope; a
    /// value stored through [`ContextKey::set`] also counts as initialized.
    pub fn memoize<T, F>(&mut self, key: &ContextKey<T>, init: F) -> &mut T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let scope = self.id;
        let slot = self.slots.entry(key.id()).or_insert_with(|| {
            tracing::debug!(%scope, context = %key.name(), id = %key.id(), "initializing memoized context");
            Slot {
                name: key.shared_name(),
                value: Box::new(init()),
            }
        });
        slot.value
            .downcast_mut()
            .expect("context slots are only written through their own typed key")
    }

    /// Remove and return the value for `key`; afterwards the key reads as unset.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>) -> Option<T> {
        let slot = self.slots.remove(&key.id())?;
        slot.value.downcast().ok().map(|boxed| *boxed)
    }

    pub fn contains<T>(&self, key: &ContextKey<T>) -> bool {
        self.slots.contains_key(&key.id())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of all contexts set in this scope, sorted.
    pub fn context_names(&self) -> Vec<String> {
        self.slots
            .values()
            .map(|slot| slot.name.to_string())
            .sorted()
            .collect()
    }

    /// Drop every value, leaving the scope as it was when opened.
    pub fn clear(&mut self) {
        tracing::debug!(scope = %self.id, dropped = self.slots.len(), "cleared request scope");
        self.slots.clear();
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            scope: self.id,
            contexts: self.context_names(),
        }
    }

    pub(crate) fn slot<T: 'static>(&self, id: ContextId) -> Option<&T> {
        self.slots
            .get(&id)
            .and_then(|slot| slot.value.downcast_ref())
    }

    pub(crate) fn insert_slot<T: Send + Sync + 'static>(&mut self, id: ContextId, name: Arc<str>, value: T) {
        self.slots.insert(
            id,
            Slot {
                name,
                value: Box::new(value),
            },
        );
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        tracing::trace!(scope = %self.id, dropped = self.slots.len(), "closed request scope");
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.id)
            .field("contexts", &self.context_names())
            .finish()
    }
}
