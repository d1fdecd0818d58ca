//! Typed context keys and the getter/setter pair handed out by [`make_context`].
//!
//! A key only names a slot; the value itself lives in the [`RequestScope`]
//! the caller passes in, so two requests holding the same key never observe
//! each other's values.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::{ContextError, Result};
use crate::scope::RequestScope;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one context factory invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Handle to one request-scoped value of type `T`.
///
/// Identity comes from the [`ContextId`] allocated in [`ContextKey::new`],
/// never from `name`: two keys built with the same name address different
/// slots. Clones share the identity of the original.
pub struct ContextKey<T> {
    id: ContextId,
    name: Arc<str>,
    // `fn() -> T` keeps the key `Send + Sync` whatever `T` is.
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ContextKey<T> {
    /// Allocate a fresh key. `T` must be storable in a [`RequestScope`].
    ///
    /// ```compile_fail
    /// use request_context::ContextKey;
    /// let key = ContextKey::<std::rc::Rc<u8>>::new("shared");
    /// ```
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let key = Self {
            id: ContextId::next(),
            name: name.into(),
            _marker: PhantomData,
        };
        tracing::trace!(context = %key.name, id = %key.id, "created context key");
        key
    }
}

impl<T> ContextKey<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Diagnostic label, used in error messages and logs only.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn unset_error(&self) -> ContextError {
        ContextError::Unset {
            name: self.name.to_string(),
        }
    }

    /// Split into the getter/setter pair; both halves address the same slot.
    pub fn split(self) -> (ContextGetter<T>, ContextSetter<T>) {
        let getter = ContextGetter { key: self.clone() };
        (getter, ContextSetter { key: self })
    }
}

impl<T: Send + Sync + 'static> ContextKey<T> {
    /// Value stored for this key in `scope`.
    ///
    /// Fails with [`ContextError::Unset`] if nothing was set in this scope.
    /// Any stored value counts as set, including `0`, `false`, `""` or `None`.
    pub fn get<'s>(&self, scope: &'s RequestScope) -> Result<&'s T> {
        match scope.slot::<T>(self.id) {
            Some(value) => Ok(value),
            None => {
                tracing::debug!(
                    scope = %scope.id(),
                    context = %self.name,
                    id = %self.id,
                    "context read before it was set"
                );
                Err(self.unset_error())
            }
        }
    }

    pub fn try_get<'s>(&self, scope: &'s RequestScope) -> Option<&'s T> {
        scope.slot::<T>(self.id)
    }

    pub fn get_cloned(&self, scope: &RequestScope) -> Result<T>
    where
        T: Clone,
    {
        self.get(scope).cloned()
    }

    /// Store `value` in `scope`, overwriting any earlier value.
    pub fn set(&self, scope: &mut RequestScope, value: T) {
        tracing::trace!(scope = %scope.id(), context = %self.name, id = %self.id, "set context");
        scope.insert_slot(self.id, self.shared_name(), value);
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for ContextKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Read half of a context created by [`make_context`].
pub struct ContextGetter<T> {
    key: ContextKey<T>,
}

impl<T: Send + Sync + 'static> ContextGetter<T> {
    pub fn get<'s>(&self, scope: &'s RequestScope) -> Result<&'s T> {
        self.key.get(scope)
    }

    pub fn try_get<'s>(&self, scope: &'s RequestScope) -> Option<&'s T> {
        self.key.try_get(scope)
    }

    pub fn get_cloned(&self, scope: &RequestScope) -> Result<T>
    where
        T: Clone,
    {
        self.key.get_cloned(scope)
    }
}

impl<T> ContextGetter<T> {
    pub fn key(&self) -> &ContextKey<T> {
        &self.key
    }
}

impl<T> Clone for ContextGetter<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone() }
    }
}

impl<T> fmt::Debug for ContextGetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextGetter").field(&self.key).finish()
    }
}

/// Write half of a context created by [`make_context`].
pub struct ContextSetter<T> {
    key: ContextKey<T>,
}

impl<T: Send + Sync + 'static> ContextSetter<T> {
    pub fn set(&self, scope: &mut RequestScope, value: T) {
        self.key.set(scope, value)
    }
}

impl<T> ContextSetter<T> {
    pub fn key(&self) -> &ContextKey<T> {
        &self.key
    }
}

impl<T> Clone for ContextSetter<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone() }
    }
}

impl<T> fmt::Debug for ContextSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextSetter").field(&self.key).finish()
    }
}

/// Create a new context and return its getter and setter.
///
/// Every call produces a fresh identity, so calling this twice with the same
/// `name` yields two independent contexts.
///
/// Values must be `Send + Sync + 'static`; anything else is rejected here:
///
/// ```compile_fail
/// use request_context::make_context;
/// let (get, set) = make_context::<std::rc::Rc<u8>>("x");
/// ```
pub fn make_context<T: Send + Sync + 'static>(
    name: impl Into<Arc<str>>,
) -> (ContextGetter<T>, ContextSetter<T>) {
    ContextKey::new(name).split()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_same_name_have_distinct_ids() {
        let a = ContextKey::<u32>::new("userId");
        let b = ContextKey::<u32>::new("userId");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn split_halves_share_identity() {
        let (get, set) = make_context::<String>("locale");
        assert_eq!(get.key(), set.key());
        assert_eq!(get.key().name(), "locale");
    }

    #[test]
    fn falsy_values_count_as_set() {
        let mut scope = RequestScope::new();
        let (get_n, set_n) = make_context::<i64>("n");
        let (get_b, set_b) = make_context::<bool>("b");
        let (get_s, set_s) = make_context::<String>("s");
        let (get_o, set_o) = make_context::<Option<u8>>("o");

        set_n.set(&mut scope, 0);
        set_b.set(&mut scope, false);
        set_s.set(&mut scope, String::new());
        set_o.set(&mut scope, None);

        assert_eq!(get_n.get(&scope), Ok(&0));
        assert_eq!(get_b.get(&scope), Ok(&false));
        assert_eq!(get_s.get(&scope).map(String::as_str), Ok(""));
        assert_eq!(get_o.get(&scope), Ok(&None));
    }

    #[test]
    fn unset_read_reports_name() {
        let scope = RequestScope::new();
        let (get, _set) = make_context::<u64>("userId");
        let err = get.get(&scope).unwrap_err();
        assert_eq!(err, ContextError::Unset { name: "userId".into() });
        assert!(get.try_get(&scope).is_none());
    }

    #[test]
    fn key_debug_names_value_type() {
        let key = ContextKey::<u16>::new("port");
        let dbg = format!("{key:?}");
        assert!(dbg.contains("port"));
        assert!(dbg.contains("u16"));
    }
}
