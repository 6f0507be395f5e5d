//! Native function bridge
//!
//! Host closures become script callables through a [`Binding`] embedded in
//! the callable itself, so dispatch needs no shared lookup table. Each context
//! keeps a [`Registry`] of weak references to the bindings it created, so it
//! can unbind them on `unregister` and at teardown. A binding dies with its
//! callable: once no host handle pins it and no script value refers to it.

pub mod call;
pub mod function;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub use call::trampoline;
pub use function::{Binding, HostFunction, ScriptFunction};

use crate::engine::Session;
use crate::error::Result;
use crate::gc::{PinAllocator, PinHandle, PinId, PinOwner};

/// Bindings created by one context, keyed by the pin of their callable
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: HashMap<PinId, Weak<Binding>>,
}

impl Registry {
    pub(crate) fn insert(&mut self, id: PinId, binding: &Arc<Binding>) {
        self.prune();
        self.entries.insert(id, Arc::downgrade(binding));
    }

    /// Unbind and forget the callable pinned under `id`. The callable stays
    /// valid but inert. `None` if it was not registered or is already gone.
    pub(crate) fn remove(&mut self, id: PinId) -> Option<Arc<Binding>> {
        let binding = self.entries.remove(&id)?.upgrade()?;
        binding.release();
        Some(binding)
    }

    /// Forget bindings whose callable the engine has freed.
    pub(crate) fn prune(&mut self) {
        self.entries.retain(|_, binding| binding.strong_count() > 0);
    }

    /// Number of bindings still alive
    pub(crate) fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|binding| binding.strong_count() > 0)
            .count()
    }

    /// Unbind everything; returns how many bindings were live.
    pub(crate) fn release_all(&mut self) -> usize {
        self.entries
            .drain()
            .filter_map(|(_, binding)| binding.upgrade())
            .filter(|binding| binding.release())
            .count()
    }
}

/// Locked view of a context's bridge state, handed to conversions
pub struct Scope<'a> {
    pub(crate) context: u64,
    pub(crate) owner: &'a Weak<dyn PinOwner>,
    pub(crate) pins: &'a mut PinAllocator,
    pub(crate) registry: &'a mut Registry,
}

impl Scope<'_> {
    /// Id of the context this scope belongs to
    pub fn context_id(&self) -> u64 {
        self.context
    }

    /// Pin `value` and hand out an owning handle to it.
    pub fn pin<S: Session>(&mut self, session: &S, value: S::Value) -> Result<ScriptFunction> {
        let id = self.pins.allocate();
        if let Err(err) = session.pin(id, value) {
            self.pins.released(1);
            return Err(err);
        }
        Ok(ScriptFunction::new(PinHandle::new(
            self.owner.clone(),
            self.context,
            id,
        )))
    }

    /// Wrap `body` in a native callable, pin it and record the registration.
    pub(crate) fn register<S: Session>(
        &mut self,
        session: &S,
        name: &str,
        body: Arc<HostFunction>,
    ) -> Result<ScriptFunction> {
        let binding = Binding::new(name, self.context, body);
        let callable = session.native_function(binding.clone())?;
        let function = self.pin(session, callable)?;
        self.registry.insert(function.pin_id(), &binding);
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HostValue;

    fn binding(name: &str) -> Arc<Binding> {
        let body: Arc<HostFunction> = Arc::new(|_: &[String]| Some(HostValue::Null));
        Binding::new(name, 1, body)
    }

    #[test]
    fn test_registry_remove() {
        let mut registry = Registry::default();
        let first = binding("first");
        let second = binding("second");
        registry.insert(PinId(1), &first);
        registry.insert(PinId(2), &second);
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(PinId(1)).unwrap();
        assert_eq!(removed.name(), "first");
        assert!(!first.is_bound());
        assert!(second.is_bound());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(PinId(1)).is_none());
    }

    #[test]
    fn test_registry_forgets_dropped_bindings() {
        let mut registry = Registry::default();
        let kept = binding("kept");
        registry.insert(PinId(1), &kept);
        for id in 2..100 {
            registry.insert(PinId(id), &binding("dropped"));
        }
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(PinId(50)).is_none());

        registry.prune();
        assert_eq!(registry.entries.len(), 1);
    }

    #[test]
    fn test_registry_release_all() {
        let mut registry = Registry::default();
        let a = binding("a");
        let b = binding("b");
        registry.insert(PinId(1), &a);
        registry.insert(PinId(2), &b);
        registry.insert(PinId(3), &binding("gone"));

        assert_eq!(registry.release_all(), 2);
        assert_eq!(registry.len(), 0);
        assert!(!a.is_bound());
        assert!(!b.is_bound());
    }
}
