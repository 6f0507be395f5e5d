//! Function handles
//!
//! [`ScriptFunction`] is the host's handle to a callable living in a context.
//! [`Binding`] ties a native callable to the host closure it dispatches to.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::gc::{PinHandle, PinId};
use crate::value::HostValue;

/// Host closure callable from script.
///
/// Arguments arrive as their string form, in call order. Returning `None`
/// gives the script `undefined`.
pub type HostFunction = dyn Fn(&[String]) -> Option<HostValue> + Send + Sync;

/// A pinned script function
///
/// Cloning is cheap; the pin is released when the last clone drops. A handle
/// belongs to the context that produced it and is useless anywhere else.
#[derive(Clone)]
pub struct ScriptFunction {
    pin: Arc<PinHandle>,
}

impl ScriptFunction {
    pub(crate) fn new(pin: PinHandle) -> Self {
        ScriptFunction { pin: Arc::new(pin) }
    }

    pub(crate) fn pin_id(&self) -> PinId {
        self.pin.id()
    }

    /// Id of the owning context
    pub fn context_id(&self) -> u64 {
        self.pin.context()
    }

    /// False once the owning context has been destroyed
    pub fn is_attached(&self) -> bool {
        self.pin.is_attached()
    }
}

impl PartialEq for ScriptFunction {
    fn eq(&self, other: &Self) -> bool {
        self.context_id() == other.context_id() && self.pin_id() == other.pin_id()
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptFunction({} in context {})", self.pin_id(), self.context_id())
    }
}

/// Private slot of a native callable
///
/// The engine-side function owns one `Arc<Binding>`. Releasing the binding
/// drops the closure; the callable itself stays valid and returns `undefined`.
pub struct Binding {
    name: String,
    context: u64,
    slot: RwLock<Option<Arc<HostFunction>>>,
}

impl Binding {
    pub(crate) fn new(name: &str, context: u64, body: Arc<HostFunction>) -> Arc<Self> {
        Arc::new(Binding {
            name: name.to_owned(),
            context,
            slot: RwLock::new(Some(body)),
        })
    }

    /// Name the function was registered under; empty when anonymous
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the context the callable was created in
    pub fn context(&self) -> u64 {
        self.context
    }

    /// The bound closure, if still registered
    pub(crate) fn body(&self) -> Option<Arc<HostFunction>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the closure. Returns false if it was already gone.
    pub(crate) fn release(&self) -> bool {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_bound(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("bound", &self.is_bound())
            .finish()
    }
}
