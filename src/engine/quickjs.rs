//! QuickJS backend
//!
//! Built on `rquickjs`. Inside a session, values are reference counted by the
//! engine: cloning a handle duplicates it and dropping it frees it. Pinned
//! values are rooted in a hidden, non-enumerable table on the global object,
//! so they stay reachable while pinned and die together with the context.

use std::sync::Arc;

use rquickjs::context::EvalOptions;
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::object::Property;
use rquickjs::{Array, Ctx, Function, Object, Value};
use tracing::debug;

use super::{Backend, Session};
use crate::config::ContextOptions;
use crate::error::{Error, Result};
use crate::exception::UNKNOWN_EXCEPTION;
use crate::gc::PinId;
use crate::runtime::{self, Binding};
use crate::value::Kind;

/// Global property holding the pin table
const PIN_TABLE: &str = "__jsbridge_pins";

/// Global property holding the date converter
const EPOCH_MILLIS: &str = "__jsbridge_epoch_millis";

/// Binds the converter to `Date` as it is before any script runs.
const EPOCH_MILLIS_SOURCE: &str =
    "(function (D) { return function (v) { return new D(v).getTime(); }; })(Date)";

/// One QuickJS runtime with a single context
pub struct QuickJs {
    // The context is a child of the runtime and must be released first.
    context: rquickjs::Context,
    runtime: rquickjs::Runtime,
}

impl Backend for QuickJs {
    type Session<'s> = QuickJsSession<'s>;

    fn create(options: &ContextOptions) -> Result<Self> {
        let runtime = rquickjs::Runtime::new().map_err(engine_error)?;
        if let Some(limit) = options.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(limit) = options.max_stack_size {
            runtime.set_max_stack_size(limit);
        }
        if let Some(threshold) = options.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }

        let context = rquickjs::Context::full(&runtime).map_err(engine_error)?;
        context.with(|ctx| -> Result<()> {
            let globals = ctx.globals();
            let pins = Object::new(ctx.clone()).map_err(engine_error)?;
            globals
                .prop(PIN_TABLE, Property::from(pins))
                .map_err(engine_error)?;
            let epoch_millis: Function = ctx.eval(EPOCH_MILLIS_SOURCE).map_err(engine_error)?;
            globals
                .prop(EPOCH_MILLIS, Property::from(epoch_millis))
                .map_err(engine_error)
        })?;

        debug!(
            memory_limit = ?options.memory_limit,
            max_stack_size = ?options.max_stack_size,
            "quickjs runtime created"
        );
        Ok(QuickJs { context, runtime })
    }

    fn enter<R, F>(&self, f: F) -> R
    where
        F: for<'s> FnOnce(&Self::Session<'s>) -> R + Send,
        R: Send,
    {
        self.context.with(|ctx| f(&QuickJsSession::new(ctx)))
    }

    fn collect_garbage(&self) {
        self.runtime.run_gc();
    }
}

/// An entered QuickJS context
pub struct QuickJsSession<'js> {
    ctx: Ctx<'js>,
    globals: Object<'js>,
}

impl<'js> QuickJsSession<'js> {
    fn new(ctx: Ctx<'js>) -> Self {
        let globals = ctx.globals();
        QuickJsSession { ctx, globals }
    }

    fn pins(&self) -> Result<Object<'js>> {
        self.globals.get(PIN_TABLE).map_err(|err| self.fault(err))
    }

    fn json_function(&self, name: &str) -> Result<Function<'js>> {
        let json: Object<'js> = self.globals.get("JSON").map_err(|err| self.fault(err))?;
        json.get(name).map_err(|err| self.fault(err))
    }

    /// Convert an engine error, taking the pending exception if there is one.
    fn fault(&self, error: rquickjs::Error) -> Error {
        if matches!(error, rquickjs::Error::Exception) {
            Error::Exception(self.describe_exception())
        } else {
            engine_error(error)
        }
    }

    fn describe_exception(&self) -> String {
        let exception = self.ctx.catch();
        match exception.get::<Coerced<String>>() {
            Ok(Coerced(text)) => text,
            Err(_) => {
                // toString itself threw; drop that one too
                let _ = self.ctx.catch();
                UNKNOWN_EXCEPTION.to_string()
            }
        }
    }
}

impl<'js> Session for QuickJsSession<'js> {
    type Value = Value<'js>;

    fn undefined(&self) -> Value<'js> {
        Value::new_undefined(self.ctx.clone())
    }

    fn null(&self) -> Value<'js> {
        Value::new_null(self.ctx.clone())
    }

    fn boolean(&self, value: bool) -> Value<'js> {
        Value::new_bool(self.ctx.clone(), value)
    }

    fn number(&self, value: f64) -> Value<'js> {
        Value::new_float(self.ctx.clone(), value)
    }

    fn integer(&self, value: i64) -> Value<'js> {
        match i32::try_from(value) {
            Ok(small) => Value::new_int(self.ctx.clone(), small),
            Err(_) => Value::new_float(self.ctx.clone(), value as f64),
        }
    }

    fn string(&self, value: &str) -> Result<Value<'js>> {
        rquickjs::String::from_str(self.ctx.clone(), value)
            .map(|text| text.into_value())
            .map_err(|err| self.fault(err))
    }

    fn array(&self, items: Vec<Value<'js>>) -> Result<Value<'js>> {
        let array = Array::new(self.ctx.clone()).map_err(|err| self.fault(err))?;
        for (index, item) in items.into_iter().enumerate() {
            array.set(index, item).map_err(|err| self.fault(err))?;
        }
        Ok(array.into_value())
    }

    fn global_object(&self) -> Value<'js> {
        self.globals.clone().into_value()
    }

    fn eval(&self, source: &str) -> Result<Value<'js>> {
        // rquickjs copies the source into a NUL-terminated buffer.
        let mut options = EvalOptions::default();
        options.global = true;
        options.strict = false;
        self.ctx
            .eval_with_options(source, options)
            .map_err(|err| self.fault(err))
    }

    fn get_global(&self, name: &str) -> Result<Value<'js>> {
        self.globals.get(name).map_err(|err| self.fault(err))
    }

    fn get_property(&self, object: &Value<'js>, name: &str) -> Result<Value<'js>> {
        match object.as_object() {
            Some(object) => object.get(name).map_err(|err| self.fault(err)),
            None => Ok(self.undefined()),
        }
    }

    fn define_global(&self, name: &str, value: Value<'js>) -> Result<()> {
        self.globals
            .prop(name, Property::from(value))
            .map_err(|err| self.fault(err))
    }

    fn assign_global(&self, name: &str, value: Value<'js>) -> Result<()> {
        self.globals.set(name, value).map_err(|err| self.fault(err))
    }

    fn global_bindings(&self) -> Result<Vec<(String, Value<'js>)>> {
        let object: Object<'js> = self.globals.get("Object").map_err(|err| self.fault(err))?;
        let keys: Function<'js> = object.get("keys").map_err(|err| self.fault(err))?;
        let names: Vec<String> = keys
            .call((self.globals.clone(),))
            .map_err(|err| self.fault(err))?;

        let mut bindings = Vec::with_capacity(names.len());
        for name in names {
            let value = self.get_global(&name)?;
            bindings.push((name, value));
        }
        Ok(bindings)
    }

    fn call(&self, function: &Value<'js>, args: Vec<Value<'js>>) -> Result<Value<'js>> {
        let Some(callee) = function.as_function() else {
            return Err(Error::Mismatch {
                expected: "function",
                found: self.kind(function),
            });
        };
        callee
            .call::<_, Value<'js>>((Rest(args),))
            .map_err(|err| self.fault(err))
    }

    fn kind(&self, value: &Value<'js>) -> Kind {
        if value.is_undefined() {
            Kind::Undefined
        } else if value.is_null() {
            Kind::Null
        } else if value.is_bool() {
            Kind::Boolean
        } else if value.as_number().is_some() {
            Kind::Number
        } else if value.is_string() {
            Kind::String
        } else if value.is_function() {
            Kind::Function
        } else if value.is_array() {
            Kind::Array
        } else if value.is_object() {
            Kind::Object
        } else {
            Kind::Other
        }
    }

    fn to_text(&self, value: &Value<'js>) -> Result<String> {
        value
            .get::<Coerced<String>>()
            .map(|Coerced(text)| text)
            .map_err(|err| self.fault(err))
    }

    fn to_number(&self, value: &Value<'js>) -> Option<f64> {
        value.as_number()
    }

    fn to_bool(&self, value: &Value<'js>) -> Option<bool> {
        value.as_bool()
    }

    fn json_stringify(&self, value: &Value<'js>) -> Result<Option<String>> {
        let stringify = self.json_function("stringify")?;
        let json = stringify
            .call::<_, Value<'js>>((value.clone(),))
            .map_err(|err| self.fault(err))?;
        if json.is_undefined() {
            return Ok(None);
        }
        self.to_text(&json).map(Some)
    }

    fn json_parse(&self, text: &str) -> Result<Value<'js>> {
        let parse = self.json_function("parse")?;
        parse
            .call::<_, Value<'js>>((text,))
            .map_err(|err| self.fault(err))
    }

    fn epoch_millis(&self, value: Value<'js>) -> Result<Option<f64>> {
        let convert: Function<'js> = self.globals.get(EPOCH_MILLIS).map_err(|err| self.fault(err))?;
        let millis: Value<'js> = convert.call((value,)).map_err(|err| self.fault(err))?;
        Ok(millis.as_number().filter(|millis| millis.is_finite()))
    }

    fn pin(&self, id: PinId, value: Value<'js>) -> Result<()> {
        self.pins()?
            .set(pin_key(id), value)
            .map_err(|err| self.fault(err))
    }

    fn pinned(&self, id: PinId) -> Result<Value<'js>> {
        let value: Value<'js> = self.pins()?.get(pin_key(id)).map_err(|err| self.fault(err))?;
        if value.is_undefined() {
            return Err(Error::Engine(format!("{id} is not pinned")));
        }
        Ok(value)
    }

    fn unpin(&self, id: PinId) -> Result<()> {
        self.pins()?
            .remove(pin_key(id))
            .map_err(|err| self.fault(err))
    }

    fn native_function(&self, binding: Arc<Binding>) -> Result<Value<'js>> {
        let name = binding.name().to_owned();
        let function = Function::new(
            self.ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> Value<'js> {
                let session = QuickJsSession::new(ctx);
                runtime::trampoline(&session, &binding, &args.0)
            },
        )
        .and_then(|function| function.with_name(name))
        .map_err(|err| self.fault(err))?;
        Ok(function.into_value())
    }
}

/// Pin table key for `id`
fn pin_key(id: PinId) -> String {
    id.get().to_string()
}

fn engine_error(error: rquickjs::Error) -> Error {
    Error::Engine(error.to_string())
}
