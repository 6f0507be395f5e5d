//! Value marshaling
//!
//! Host to script goes through [`to_script`], one [`HostValue`] at a time.
//! Script to host goes through [`FromScript`], which checks the value's
//! runtime tag before converting. Structured values take a single indirect
//! path: `JSON.stringify` in the engine, then `serde_json` on the host.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;

use crate::engine::Session;
use crate::error::{Error, Result};
use crate::runtime::{Scope, ScriptFunction};
use crate::value::{HostValue, Kind};

/// Convert one host value into a script value of context `context`.
pub fn to_script<S: Session>(session: &S, context: u64, value: &HostValue) -> Result<S::Value> {
    match value {
        HostValue::Undefined => Ok(session.undefined()),
        HostValue::Null => Ok(session.null()),
        HostValue::Bool(value) => Ok(session.boolean(*value)),
        HostValue::Int(value) => Ok(session.integer(*value)),
        HostValue::Float(value) => Ok(session.number(*value)),
        HostValue::Text(text) => session.string(text),
        HostValue::TextList(items) => {
            let values = items
                .iter()
                .map(|item| session.string(item))
                .collect::<Result<Vec<_>>>()?;
            session.array(values)
        }
        HostValue::Function(function) => {
            if function.context_id() != context {
                return Err(Error::Marshal {
                    index: 0,
                    reason: "function belongs to another context".into(),
                });
            }
            session.pinned(function.pin_id())
        }
    }
}

/// Convert call arguments in order. The first failure aborts the conversion
/// and reports the offending position.
pub fn to_script_args<S: Session>(
    session: &S,
    context: u64,
    args: &[HostValue],
) -> Result<Vec<S::Value>> {
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            to_script(session, context, arg).map_err(|err| match err {
                Error::Marshal { .. } => err.at_argument(index),
                other => Error::Marshal {
                    index,
                    reason: other.to_string(),
                },
            })
        })
        .collect()
}

fn expect_kind<S: Session>(session: &S, value: &S::Value, expected: Kind, name: &'static str) -> Result<()> {
    let found = session.kind(value);
    if found == expected {
        Ok(())
    } else {
        Err(Error::Mismatch {
            expected: name,
            found,
        })
    }
}

/// Host types a script value can be converted into
pub trait FromScript: Sized + Send {
    fn from_script<S: Session>(session: &S, scope: &mut Scope<'_>, value: S::Value) -> Result<Self>;
}

impl FromScript for () {
    fn from_script<S: Session>(_: &S, _: &mut Scope<'_>, _: S::Value) -> Result<Self> {
        Ok(())
    }
}

/// The value's string form; anything but `undefined` has one.
impl FromScript for String {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        if session.kind(&value) == Kind::Undefined {
            return Err(Error::Mismatch {
                expected: "string",
                found: Kind::Undefined,
            });
        }
        session.to_text(&value)
    }
}

/// Numbers truncated toward zero; NaN and infinities do not convert.
impl FromScript for i64 {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        let found = session.kind(&value);
        match session.to_number(&value) {
            Some(number) if number.is_finite() => Ok(number as i64),
            _ => Err(Error::Mismatch {
                expected: "integer",
                found,
            }),
        }
    }
}

impl FromScript for f64 {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        expect_kind(session, &value, Kind::Number, "number")?;
        session.to_number(&value).ok_or(Error::Mismatch {
            expected: "number",
            found: Kind::Number,
        })
    }
}

impl FromScript for bool {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        expect_kind(session, &value, Kind::Boolean, "boolean")?;
        session.to_bool(&value).ok_or(Error::Mismatch {
            expected: "boolean",
            found: Kind::Boolean,
        })
    }
}

impl FromScript for ScriptFunction {
    fn from_script<S: Session>(session: &S, scope: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        expect_kind(session, &value, Kind::Function, "function")?;
        scope.pin(session, value)
    }
}

/// JSON text of a script value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json(pub String);

impl Json {
    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromScript for Json {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        let found = session.kind(&value);
        if found == Kind::Undefined {
            return Err(Error::Mismatch {
                expected: "json",
                found,
            });
        }
        match session.json_stringify(&value)? {
            Some(text) => Ok(Json(text)),
            None => Err(Error::Json(format!("{found} has no JSON form"))),
        }
    }
}

/// A script value decoded into a host shape through its JSON form
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<D>(pub D);

impl<D> Decoded<D> {
    pub fn into_inner(self) -> D {
        self.0
    }
}

impl<D: DeserializeOwned + Send> FromScript for Decoded<D> {
    fn from_script<S: Session>(session: &S, scope: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        let Json(text) = Json::from_script(session, scope, value)?;
        serde_json::from_str(&text)
            .map(Decoded)
            .map_err(|err| Error::Json(err.to_string()))
    }
}

/// Anything `new Date(value)` accepts: a date, epoch milliseconds or a
/// string the engine can parse.
impl FromScript for DateTime<Utc> {
    fn from_script<S: Session>(session: &S, _: &mut Scope<'_>, value: S::Value) -> Result<Self> {
        let found = session.kind(&value);
        if found == Kind::Undefined {
            return Err(Error::Mismatch {
                expected: "date",
                found,
            });
        }
        session
            .epoch_millis(value)?
            .and_then(|millis| Utc.timestamp_millis_opt(millis as i64).single())
            .ok_or(Error::Mismatch {
                expected: "date",
                found,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextOptions;
    use crate::engine::{Backend, QuickJs, QuickJsSession};
    use crate::gc::{PinAllocator, PinOwner};
    use crate::runtime::Registry;
    use std::sync::Weak;

    struct Detached;

    impl PinOwner for Detached {
        fn release(&self, _: crate::gc::PinId) {}
    }

    /// Run `f` with a scratch engine and a scope whose pins nobody releases.
    fn convert<T, F>(source: &str, f: F) -> T
    where
        F: for<'js> FnOnce(&QuickJsSession<'js>, &mut Scope<'_>, rquickjs::Value<'js>) -> T + Send,
        T: Send,
    {
        let js = QuickJs::create(&ContextOptions::default()).unwrap();
        let source = source.to_owned();
        js.enter(move |session| {
            let owner: Weak<dyn PinOwner> = Weak::<Detached>::new();
            let mut pins = PinAllocator::default();
            let mut registry = Registry::default();
            let mut scope = Scope {
                context: 1,
                owner: &owner,
                pins: &mut pins,
                registry: &mut registry,
            };
            let value = session.eval(&source).unwrap();
            f(session, &mut scope, value)
        })
    }

    #[test]
    fn test_primitives() {
        assert_eq!(convert("'héllo'", |s, c, v| String::from_script(s, c, v)), Ok("héllo".into()));
        assert_eq!(convert("42", |s, c, v| i64::from_script(s, c, v)), Ok(42));
        assert_eq!(convert("-7.9", |s, c, v| i64::from_script(s, c, v)), Ok(-7));
        assert_eq!(convert("0.25", |s, c, v| f64::from_script(s, c, v)), Ok(0.25));
        assert_eq!(convert("true", |s, c, v| bool::from_script(s, c, v)), Ok(true));
        assert_eq!(convert("[1, 2]", |s, c, v| String::from_script(s, c, v)), Ok("1,2".into()));
    }

    #[test]
    fn test_mismatches() {
        assert_eq!(
            convert("undefined", |s, c, v| String::from_script(s, c, v)),
            Err(Error::Mismatch {
                expected: "string",
                found: Kind::Undefined
            })
        );
        assert_eq!(
            convert("'5'", |s, c, v| i64::from_script(s, c, v)),
            Err(Error::Mismatch {
                expected: "integer",
                found: Kind::String
            })
        );
        assert_eq!(
            convert("NaN", |s, c, v| i64::from_script(s, c, v)),
            Err(Error::Mismatch {
                expected: "integer",
                found: Kind::Number
            })
        );
        assert_eq!(
            convert("1", |s, c, v| bool::from_script(s, c, v)),
            Err(Error::Mismatch {
                expected: "boolean",
                found: Kind::Number
            })
        );
        assert!(convert("({})", |s, c, v| ScriptFunction::from_script(s, c, v)).is_err());
    }

    #[test]
    fn test_function_is_pinned() {
        let (pinned, live) = convert("(function () { return 1; })", |s, c, v| {
            let function = ScriptFunction::from_script(s, c, v).unwrap();
            let pinned = s.kind(&s.pinned(function.pin_id()).unwrap());
            (pinned, c.pins.live())
        });
        assert_eq!(pinned, Kind::Function);
        assert_eq!(live, 1);
    }

    #[test]
    fn test_json() {
        assert_eq!(
            convert("({ a: 1, b: [true, null] })", |s, c, v| Json::from_script(s, c, v)),
            Ok(Json(r#"{"a":1,"b":[true,null]}"#.into()))
        );
        assert!(matches!(
            convert("(function () {})", |s, c, v| Json::from_script(s, c, v)),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_decoded() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        assert_eq!(
            convert("({ x: 1, y: 2, f: function () {} })", |s, c, v| {
                Decoded::<Point>::from_script(s, c, v)
            }),
            Ok(Decoded(Point { x: 1, y: 2 }))
        );
        assert!(matches!(
            convert("({ x: 'one' })", |s, c, v| Decoded::<Point>::from_script(s, c, v)),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_dates() {
        let epoch = convert("new Date(0)", |s, c, v| DateTime::<Utc>::from_script(s, c, v)).unwrap();
        assert_eq!(epoch.timestamp_millis(), 0);

        let iso = convert("'2020-01-02T03:04:05.000Z'", |s, c, v| {
            DateTime::<Utc>::from_script(s, c, v)
        })
        .unwrap();
        assert_eq!(iso.to_rfc3339(), "2020-01-02T03:04:05+00:00");

        assert!(convert("'not a date'", |s, c, v| DateTime::<Utc>::from_script(s, c, v)).is_err());
    }

    #[test]
    fn test_to_script_args() {
        let js = QuickJs::create(&ContextOptions::default()).unwrap();
        let (joined, err) = js.enter(|s| {
            let args = vec![
                HostValue::Int(1),
                HostValue::Float(2.5),
                HostValue::Text("three".into()),
                HostValue::Bool(false),
                HostValue::Null,
                HostValue::TextList(vec!["a".into(), "b".into()]),
            ];
            let values = to_script_args(s, 1, &args).unwrap();
            let array = s.array(values).unwrap();
            let joined = s.json_stringify(&array).unwrap();

            let owner: Weak<dyn PinOwner> = Weak::<Detached>::new();
            let foreign = ScriptFunction::new(crate::gc::PinHandle::new(owner, 2, crate::gc::PinId(1)));
            let err = to_script_args(s, 1, &[HostValue::Int(0), HostValue::Function(foreign)]).unwrap_err();
            (joined, err)
        });
        assert_eq!(joined.as_deref(), Some(r#"[1,2.5,"three",false,null,["a","b"]]"#));
        assert_eq!(
            err,
            Error::Marshal {
                index: 1,
                reason: "function belongs to another context".into()
            }
        );
    }
}
