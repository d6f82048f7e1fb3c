//! Per-run transaction contexts.
//!
//! While a unit-of-work closure runs it receives a [`UnitContext`], which
//! resolves a resource to the [`TxContext`] carrying that resource's live
//! transaction. The underlying map only lives for one run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::transaction::{Component, ContextKey, Transaction};

/// A transaction begun during a run, tagged with its coordination key.
pub(crate) struct ActiveTransaction {
    pub(crate) key: ContextKey,
    pub(crate) handle: Mutex<Box<dyn Transaction>>,
}

impl ActiveTransaction {
    /// Exclusive access without locking; the coordinator owns the map
    /// outside of the execution phase.
    pub(crate) fn handle_mut(&mut self) -> &mut dyn Transaction {
        &mut **self.handle.get_mut()
    }
}

/// Coordination key to active transaction, plus begin order.
#[derive(Default)]
pub(crate) struct ContextMap {
    index: HashMap<ContextKey, usize>,
    active: Vec<ActiveTransaction>,
}

impl ContextMap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn contains(&self, key: &ContextKey) -> bool {
        self.index.contains_key(key)
    }

    /// Record a freshly begun transaction. Keys already present are ignored.
    pub(crate) fn insert(&mut self, key: ContextKey, handle: Box<dyn Transaction>) {
        if self.contains(&key) {
            return;
        }
        self.index.insert(key.clone(), self.active.len());
        self.active.push(ActiveTransaction {
            key,
            handle: Mutex::new(handle),
        });
    }

    pub(crate) fn get(&self, key: &ContextKey) -> Option<&Mutex<Box<dyn Transaction>>> {
        self.index.get(key).map(|&i| &self.active[i].handle)
    }

    /// Active transactions in begin order.
    pub(crate) fn active_mut(&mut self) -> &mut [ActiveTransaction] {
        &mut self.active
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.active.iter().map(|tx| &tx.key)
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }
}

/// Lookup handed to a unit-of-work closure.
///
/// `C` is the caller's base context, passed to
/// [`UnitOfWork::run_with`](crate::unit::UnitOfWork::run_with) and carried
/// into every [`TxContext`].
pub struct UnitContext<'a, C: ?Sized = ()> {
    base: &'a C,
    members: &'a [Arc<dyn Component>],
    map: &'a ContextMap,
}

impl<'a, C: ?Sized> UnitContext<'a, C> {
    pub(crate) fn new(base: &'a C, members: &'a [Arc<dyn Component>], map: &'a ContextMap) -> Self {
        Self { base, members, map }
    }

    /// Resolve the transaction context of a resource.
    ///
    /// Components that are not part of this unit of work get a context
    /// without a transaction, even if their key matches a member's.
    pub fn context(&self, component: &dyn Component) -> TxContext<'a, C> {
        let key = ContextKey::of(component);
        let identity = ContextKey::identity(component);
        let is_member = self
            .members
            .iter()
            .any(|m| ContextKey::identity(m.as_ref()) == identity);

        let handle = if is_member { self.map.get(&key) } else { None };
        TxContext {
            base: self.base,
            key,
            handle,
        }
    }

    /// Resolve a transaction context directly by coordination key.
    pub fn context_for_key(&self, key: &ContextKey) -> TxContext<'a, C> {
        TxContext {
            base: self.base,
            key: key.clone(),
            handle: self.map.get(key),
        }
    }

    /// The caller's base context.
    pub fn base(&self) -> &'a C {
        self.base
    }

    /// Keys of the transactions begun for this run, in begin order.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.map.keys()
    }

    /// Number of transactions begun for this run.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }
}

impl<C: ?Sized> fmt::Debug for UnitContext<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitContext")
            .field("keys", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Execution context of one resource within a run.
///
/// Carries the resource's transaction when one was begun. Resources must
/// fall back to non-transactional behavior when it is absent.
pub struct TxContext<'a, C: ?Sized = ()> {
    base: &'a C,
    key: ContextKey,
    handle: Option<&'a Mutex<Box<dyn Transaction>>>,
}

impl<'a, C: ?Sized> TxContext<'a, C> {
    /// The caller's base context.
    pub fn base(&self) -> &'a C {
        self.base
    }

    /// Coordination key of the resource.
    pub fn key(&self) -> &ContextKey {
        &self.key
    }

    /// Check if a transaction was begun for the resource.
    pub fn is_transactional(&self) -> bool {
        self.handle.is_some()
    }

    /// Borrow the resource's transaction as its concrete type.
    ///
    /// Returns `None` when no transaction was begun or the handle is of
    /// another type. Resources sharing a key share the handle, so holding
    /// this guard while asking for the same handle again deadlocks.
    pub fn transaction<T: Transaction>(&self) -> Option<MappedMutexGuard<'a, T>> {
        let guard = self.handle?.lock();
        MutexGuard::try_map(guard, |tx| (**tx).downcast_mut::<T>()).ok()
    }

    /// Run `f` against the resource's transaction, whatever its type.
    pub fn with_transaction<R>(&self, f: impl FnOnce(&mut dyn Transaction) -> R) -> Option<R> {
        let handle = self.handle?;
        let mut guard = handle.lock();
        Some(f(&mut **guard))
    }
}

impl<C: ?Sized> fmt::Debug for TxContext<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxContext")
            .field("key", &self.key)
            .field("transactional", &self.is_transactional())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transaction::{BoxError, NopTransaction, Transactional};

    struct Counter {
        value: u32,
    }

    impl Transaction for Counter {
        fn commit(&mut self) -> Result<(), BoxError> {
            Ok(())
        }

        fn rollback(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    struct Repo;

    impl Transactional for Repo {
        fn begin(&self) -> Result<Box<dyn Transaction>, BoxError> {
            Ok(Box::new(Counter { value: 0 }))
        }
    }

    impl Component for Repo {
        fn as_transactional(&self) -> Option<&dyn Transactional> {
            Some(self)
        }
    }

    fn setup(members: &[Arc<dyn Component>]) -> ContextMap {
        let mut map = ContextMap::with_capacity(members.len());
        for m in members {
            let tx = m.as_transactional().unwrap().begin().unwrap();
            map.insert(ContextKey::of(m.as_ref()), tx);
        }
        map
    }

    #[test]
    fn test_context_map_insert_once() {
        let mut map = ContextMap::default();
        map.insert(ContextKey::shared("db"), Box::new(Counter { value: 1 }));
        map.insert(ContextKey::shared("db"), Box::new(Counter { value: 2 }));
        map.insert(ContextKey::shared("cache"), Box::new(NopTransaction));

        assert_eq!(map.len(), 2);
        let first = map.get(&ContextKey::shared("db")).unwrap().lock();
        assert_eq!(first.downcast_ref::<Counter>().unwrap().value, 1);
        drop(first);

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec![ContextKey::shared("db"), ContextKey::shared("cache")]);
    }

    #[test]
    fn test_lookup_member() {
        let repo = Arc::new(Repo);
        let members: Vec<Arc<dyn Component>> = vec![repo.clone()];
        let map = setup(&members);
        let unit = UnitContext::new(&(), &members, &map);

        let ctx = unit.context(&*repo);
        assert!(ctx.is_transactional());
        ctx.transaction::<Counter>().unwrap().value += 7;
        assert_eq!(ctx.transaction::<Counter>().unwrap().value, 7);

        // Wrong concrete type.
        assert!(ctx.transaction::<NopTransaction>().is_none());
    }

    #[test]
    fn test_lookup_non_member() {
        let member = Arc::new(Repo);
        let outsider = Arc::new(Repo);
        let members: Vec<Arc<dyn Component>> = vec![member];
        let map = setup(&members);
        let unit = UnitContext::new(&(), &members, &map);

        let ctx = unit.context(&*outsider);
        assert!(!ctx.is_transactional());
        assert!(ctx.transaction::<Counter>().is_none());
        assert!(ctx.with_transaction(|tx| tx.commit().is_ok()).is_none());
    }

    #[test]
    fn test_base_context() {
        let repo = Arc::new(Repo);
        let members: Vec<Arc<dyn Component>> = vec![repo.clone()];
        let map = setup(&members);
        let deadline = "2026-01-01T00:00:00Z".to_string();
        let unit = UnitContext::new(&deadline, &members, &map);

        assert_eq!(unit.base(), &deadline);
        assert_eq!(unit.context(&*repo).base(), &deadline);
        assert_eq!(unit.len(), 1);
        assert!(!unit.is_empty());
    }

    #[test]
    fn test_context_for_key() {
        let mut map = ContextMap::default();
        map.insert(ContextKey::shared("db"), Box::new(NopTransaction));
        let unit = UnitContext::new(&(), &[], &map);

        assert!(unit.context_for_key(&ContextKey::shared("db")).is_transactional());
        assert!(!unit.context_for_key(&ContextKey::shared("cache")).is_transactional());
    }
}
