//! Script engine backends
//!
//! A backend owns one engine runtime and exactly one context bound to it.
//! Everything the bridge asks of the engine goes through [`Session`], which
//! only exists while the backend is entered. The bridge enters a backend with
//! the context lock held, so a session never sees concurrent use.
//!
//! The resolver, marshaling and native-function bridge are written once
//! against these traits.

pub mod quickjs;

use std::sync::Arc;

use crate::config::ContextOptions;
use crate::error::Result;
use crate::gc::PinId;
use crate::runtime::Binding;
use crate::value::Kind;

pub use quickjs::{QuickJs, QuickJsSession};

/// An embeddable script engine
pub trait Backend: Send + Sized + 'static {
    /// Engine access for the duration of one `enter` call
    type Session<'s>: Session;

    /// Allocate a runtime and a context bound to it.
    fn create(options: &ContextOptions) -> Result<Self>;

    /// Run `f` with the engine entered.
    fn enter<R, F>(&self, f: F) -> R
    where
        F: for<'s> FnOnce(&Self::Session<'s>) -> R + Send,
        R: Send;

    /// Request a synchronous collector pass.
    fn collect_garbage(&self);
}

/// Capabilities the bridge consumes from an entered engine
///
/// Values are engine handles that stay valid until the session ends. Keeping
/// one longer requires [`Session::pin`].
pub trait Session {
    /// Handle to an engine-side value
    type Value: Clone;

    fn undefined(&self) -> Self::Value;
    fn null(&self) -> Self::Value;
    fn boolean(&self, value: bool) -> Self::Value;
    fn number(&self, value: f64) -> Self::Value;
    fn integer(&self, value: i64) -> Self::Value;
    /// UTF-8 text, copied by length
    fn string(&self, value: &str) -> Result<Self::Value>;
    /// Fixed-length array holding `items` in order
    fn array(&self, items: Vec<Self::Value>) -> Result<Self::Value>;

    /// The context's global object
    fn global_object(&self) -> Self::Value;

    /// Evaluate `source` as a global, non-strict script and return its
    /// completion value.
    fn eval(&self, source: &str) -> Result<Self::Value>;

    fn get_global(&self, name: &str) -> Result<Self::Value>;
    fn get_property(&self, object: &Self::Value, name: &str) -> Result<Self::Value>;

    /// Define a read-only, non-enumerable, non-configurable global.
    fn define_global(&self, name: &str, value: Self::Value) -> Result<()>;
    /// Plain assignment to a global property.
    fn assign_global(&self, name: &str, value: Self::Value) -> Result<()>;
    /// Enumerable own properties of the global object.
    fn global_bindings(&self) -> Result<Vec<(String, Self::Value)>>;

    /// Call `function` with an undefined receiver.
    fn call(&self, function: &Self::Value, args: Vec<Self::Value>) -> Result<Self::Value>;

    fn kind(&self, value: &Self::Value) -> Kind;
    /// The value's string form, as script `String(value)` would produce.
    fn to_text(&self, value: &Self::Value) -> Result<String>;
    fn to_number(&self, value: &Self::Value) -> Option<f64>;
    fn to_bool(&self, value: &Self::Value) -> Option<bool>;

    /// `JSON.stringify(value)`; `None` when the value has no JSON form.
    fn json_stringify(&self, value: &Self::Value) -> Result<Option<String>>;
    fn json_parse(&self, text: &str) -> Result<Self::Value>;

    /// Epoch milliseconds of `new Date(value)`, using the engine's own `Date`
    /// even if script replaced the global. `None` for an invalid date.
    fn epoch_millis(&self, value: Self::Value) -> Result<Option<f64>>;

    /// Root `value` under `id` until [`Session::unpin`].
    fn pin(&self, id: PinId, value: Self::Value) -> Result<()>;
    fn pinned(&self, id: PinId) -> Result<Self::Value>;
    fn unpin(&self, id: PinId) -> Result<()>;

    /// A callable whose invocations dispatch to `binding` through
    /// [`crate::runtime::trampoline`].
    fn native_function(&self, binding: Arc<Binding>) -> Result<Self::Value>;
}
