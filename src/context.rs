//! Script context
//!
//! A [`Context`] owns one engine runtime and the single context bound to it,
//! and is the only way host code reaches either. Every entry point takes the
//! context lock before touching the engine, so a context can be shared
//! between threads (`Arc<Context>`) and work on it is serialized. Separate
//! contexts share nothing and run in parallel.
//!
//! Entry points that run script clear the exception record first and write
//! it when the engine fails. Accessors report failure as `None`; the message
//! is then available from [`Context::exception`]. `exec`, `try_resolve` and
//! `try_call` return the error instead.
//!
//! Host closures run with the lock held. Calling back into the same context
//! from inside one deadlocks.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::builtins::{self, PrintSink};
use crate::config::ContextOptions;
use crate::engine::{Backend, QuickJs, Session};
use crate::error::{Error, Result};
use crate::exception::ExceptionRecord;
use crate::gc::{PinAllocator, PinId, PinOwner, ReleaseQueue};
use crate::marshal::{self, Decoded, FromScript, Json};
use crate::resolver;
use crate::runtime::{HostFunction, Registry, Scope, ScriptFunction};
use crate::util::check_source;
use crate::value::{HostValue, Kind};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Everything guarded by the context lock
struct State<B> {
    backend: B,
    pins: PinAllocator,
    registry: Registry,
    exception: ExceptionRecord,
}

struct Shared<B: Backend> {
    id: u64,
    /// Handed to every pin so it can release itself
    owner: Weak<dyn PinOwner>,
    options: ContextOptions,
    sink: PrintSink,
    releases: ReleaseQueue,
    state: Mutex<State<B>>,
}

impl<B: Backend> Shared<B> {
    fn lock(&self) -> MutexGuard<'_, State<B>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.drain(&mut state);
        state
    }

    /// Unpin everything queued. Unpinning can free closures that hold further
    /// pins, so keep going until the queue stays empty.
    fn drain(&self, state: &mut State<B>) {
        loop {
            let ids = self.releases.take();
            if ids.is_empty() {
                return;
            }
            let count = ids.len();
            state.backend.enter(|session| {
                for id in ids {
                    if let Err(err) = session.unpin(id) {
                        warn!(%id, "failed to unpin: {err}");
                    }
                }
            });
            state.pins.released(count);
            state.registry.prune();
            trace!(context = self.id, count, live = state.pins.live(), "released pins");
        }
    }

    /// Enter the engine with the lock held. Leaves the exception record alone.
    fn enter<R, F>(&self, f: F) -> R
    where
        F: for<'s> FnOnce(&B::Session<'s>, &mut Scope<'_>) -> R + Send,
        R: Send,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut scope = Scope {
            context: self.id,
            owner: &self.owner,
            pins: &mut state.pins,
            registry: &mut state.registry,
        };
        let result = state.backend.enter(|session| f(session, &mut scope));
        self.drain(state);
        result
    }

    /// Enter the engine for one recorded operation.
    fn run<R, F>(&self, f: F) -> Result<R>
    where
        F: for<'s> FnOnce(&B::Session<'s>, &mut Scope<'_>) -> Result<R> + Send,
        R: Send,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.exception.clear();
        let mut scope = Scope {
            context: self.id,
            owner: &self.owner,
            pins: &mut state.pins,
            registry: &mut state.registry,
        };
        let result = state.backend.enter(|session| f(session, &mut scope));
        if let Err(err) = &result {
            state.exception.record(err);
        }
        self.drain(state);
        result
    }
}

impl<B: Backend> PinOwner for Shared<B> {
    fn release(&self, id: PinId) {
        self.releases.push(id);
        // Whoever holds the lock drains the queue before letting go of it.
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        self.drain(&mut state);
    }
}

impl<B: Backend> Drop for Shared<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let released = state.registry.release_all();
        // The backend drops next: context first, then runtime.
        debug!(
            context = self.id,
            released,
            live_pins = state.pins.live(),
            "context destroyed"
        );
    }
}

/// A script context
///
/// # Example
/// ```
/// use jsbridge::Context;
///
/// let ctx = Context::new().unwrap();
/// ctx.eval("var greeting = 'hello';").unwrap();
/// let greeting: Option<String> = ctx.resolve("greeting + ' world'");
/// assert_eq!(greeting.as_deref(), Some("hello world"));
/// ```
pub struct Context<B: Backend = QuickJs> {
    shared: Arc<Shared<B>>,
}

impl Context {
    /// Create a context with default options.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a context with the given options.
    pub fn with_options(options: ContextOptions) -> Result<Self> {
        Self::builder().options(options).build()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }
}

impl<B: Backend> Context<B> {
    /// Create a context holding a copy of `source`'s enumerable globals.
    ///
    /// Contexts cannot share engine values, so each global is copied through
    /// its JSON form. Functions and values without a JSON form are skipped.
    pub fn clone_of(source: &Self) -> Result<Self> {
        ContextBuilder::new()
            .options(source.options().clone())
            .print_sink(source.shared.sink.clone())
            .clone_globals(source)
            .build()
    }

    /// Process-unique id of this context
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn options(&self) -> &ContextOptions {
        &self.shared.options
    }

    /// Evaluate `source` as a script, discarding its value.
    pub fn eval(&self, source: &str) -> Option<()> {
        self.shared
            .run(|session, _| {
                check_source(source)?;
                session.eval(source).map(drop)
            })
            .ok()
    }

    /// Evaluate `source` as a script and return its value as text, `None`
    /// when it is `undefined`.
    pub fn exec(&self, source: &str) -> Result<Option<String>> {
        self.shared.run(|session, _| {
            check_source(source)?;
            let value = session.eval(source)?;
            if session.kind(&value) == Kind::Undefined {
                return Ok(None);
            }
            session.to_text(&value).map(Some)
        })
    }

    /// Resolve `source` and convert the result.
    ///
    /// `None` when the source raised (see [`Context::exception`]) or when the
    /// value does not convert to `T`.
    pub fn resolve<T: FromScript>(&self, source: &str) -> Option<T> {
        self.try_resolve(source).ok()
    }

    pub fn try_resolve<T: FromScript>(&self, source: &str) -> Result<T> {
        let limit = self.shared.options.resolve_lookup_limit;
        self.shared.run(|session, scope| {
            let value = resolver::resolve(session, source, limit)?;
            T::from_script(session, scope, value)
        })
    }

    /// JSON text of the resolved value
    pub fn resolve_json(&self, source: &str) -> Option<String> {
        self.resolve::<Json>(source).map(Json::into_inner)
    }

    /// The resolved value decoded through its JSON form
    pub fn resolve_decoded<D: DeserializeOwned + Send>(&self, source: &str) -> Option<D> {
        self.resolve::<Decoded<D>>(source).map(Decoded::into_inner)
    }

    pub fn resolve_date(&self, source: &str) -> Option<DateTime<Utc>> {
        self.resolve(source)
    }

    /// Call `function` and convert its result.
    pub fn call<T: FromScript>(&self, function: &ScriptFunction, args: &[HostValue]) -> Option<T> {
        self.try_call(function, args).ok()
    }

    /// Call `function` for its side effects. `Some` when it returned normally.
    pub fn call_none(&self, function: &ScriptFunction, args: &[HostValue]) -> Option<()> {
        self.call::<()>(function, args)
    }

    /// Call `function` with `args` converted in order.
    ///
    /// Nothing runs if any argument fails to convert.
    pub fn try_call<T: FromScript>(&self, function: &ScriptFunction, args: &[HostValue]) -> Result<T> {
        let id = self.id();
        self.shared.run(|session, scope| {
            if function.context_id() != id {
                if !function.is_attached() {
                    return Err(Error::Detached);
                }
                return Err(Error::ForeignFunction {
                    owner: function.context_id(),
                    context: id,
                });
            }
            let callee = session.pinned(function.pin_id())?;
            let args = marshal::to_script_args(session, id, args)?;
            let result = session.call(&callee, args)?;
            T::from_script(session, scope, result)
        })
    }

    /// Wrap `body` in a script callable named `name`.
    ///
    /// The callable is pinned while a host handle to it exists and lives on
    /// in script for as long as script refers to it. Its closure is dropped
    /// with it, by [`Context::unregister`], or when the context is destroyed.
    /// It is not installed anywhere; pass it to [`Context::set_global`] or as
    /// a call argument.
    pub fn new_function<F>(&self, name: &str, body: F) -> Option<ScriptFunction>
    where
        F: Fn(&[String]) -> Option<HostValue> + Send + Sync + 'static,
    {
        let body: Arc<HostFunction> = Arc::new(body);
        let function = self
            .shared
            .run(|session, scope| scope.register(session, name, body))
            .ok()?;
        debug!(context = self.id(), name, "function registered");
        Some(function)
    }

    /// Drop the closure behind `function`. Script calls to it return
    /// `undefined` from then on. False if it was not registered here.
    pub fn unregister(&self, function: &ScriptFunction) -> bool {
        if function.context_id() != self.id() {
            return false;
        }
        let mut state = self.shared.lock();
        let Some(binding) = state.registry.remove(function.pin_id()) else {
            return false;
        };
        debug!(
            context = self.id(),
            name = binding.name(),
            pin = %function.pin_id(),
            "function unregistered"
        );
        drop(binding);
        self.shared.drain(&mut state);
        true
    }

    /// Define a read-only, non-enumerable, non-configurable global.
    pub fn set_global(&self, name: &str, value: impl Into<HostValue>) -> Option<()> {
        let value = value.into();
        let id = self.id();
        self.shared
            .run(|session, _| {
                let value = marshal::to_script(session, id, &value)?;
                session.define_global(name, value)
            })
            .ok()
    }

    /// Run a synchronous collector pass.
    pub fn garbage_collect(&self) {
        let mut state = self.shared.lock();
        state.backend.collect_garbage();
        state.registry.prune();
        trace!(context = self.id(), "garbage collected");
    }

    /// Message left by the last failed operation
    pub fn exception(&self) -> Option<String> {
        self.shared.lock().exception.message().map(str::to_owned)
    }

    /// Number of host closures currently registered
    pub fn registered_functions(&self) -> usize {
        self.shared.lock().registry.len()
    }

    /// Number of values pinned on behalf of host handles
    pub fn live_pins(&self) -> usize {
        self.shared.lock().pins.live()
    }

    /// Enumerable, non-function globals as JSON text
    fn snapshot_globals(&self) -> Vec<(String, String)> {
        let snapshot = self.shared.enter(|session, _| -> Result<Vec<(String, String)>> {
            let mut globals = Vec::new();
            for (name, value) in session.global_bindings()? {
                if session.kind(&value) == Kind::Function {
                    continue;
                }
                match session.json_stringify(&value) {
                    Ok(Some(json)) => globals.push((name, json)),
                    Ok(None) => {}
                    Err(err) => trace!(name = name.as_str(), "global not cloned: {err}"),
                }
            }
            Ok(globals)
        });
        snapshot.unwrap_or_else(|err| {
            warn!(context = self.id(), "failed to read globals: {err}");
            Vec::new()
        })
    }
}

impl<B: Backend> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id()).finish()
    }
}

/// Configures a [`Context`] before it is created
pub struct ContextBuilder<B: Backend = QuickJs> {
    options: ContextOptions,
    sink: PrintSink,
    globals: Vec<(String, String)>,
    backend: PhantomData<fn() -> B>,
}

impl<B: Backend> ContextBuilder<B> {
    pub fn new() -> Self {
        ContextBuilder {
            options: ContextOptions::default(),
            sink: builtins::stdout_sink(),
            globals: Vec::new(),
            backend: PhantomData,
        }
    }

    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Send `print` and `console.log` output to `sink` instead of stdout.
    pub fn on_print<F>(self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.print_sink(Arc::new(sink))
    }

    pub fn print_sink(mut self, sink: PrintSink) -> Self {
        self.sink = sink;
        self
    }

    /// Start from a copy of `source`'s enumerable globals, taken now.
    pub fn clone_globals<C: Backend>(mut self, source: &Context<C>) -> Self {
        self.globals = source.snapshot_globals();
        trace!(source = source.id(), count = self.globals.len(), "globals captured");
        self
    }

    pub fn build(self) -> Result<Context<B>> {
        let ContextBuilder {
            options,
            sink,
            globals,
            ..
        } = self;

        let backend = B::create(&options)?;
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new_cyclic(|weak: &Weak<Shared<B>>| {
            let owner: Weak<dyn PinOwner> = weak.clone();
            Shared {
                id,
                owner,
                options,
                sink,
                releases: ReleaseQueue::default(),
                state: Mutex::new(State {
                    backend,
                    pins: PinAllocator::default(),
                    registry: Registry::default(),
                    exception: ExceptionRecord::new(),
                }),
            }
        });

        shared.enter(|session, scope| {
            for (name, json) in &globals {
                let copied = session
                    .json_parse(json)
                    .and_then(|value| session.assign_global(name, value));
                if let Err(err) = copied {
                    warn!(context = id, name = name.as_str(), "failed to clone global: {err}");
                }
            }
            builtins::install(session, scope, &shared.options, &shared.sink);
        });

        debug!(context = id, cloned = globals.len(), "context created");
        Ok(Context { shared })
    }
}

impl<B: Backend> Default for ContextBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
