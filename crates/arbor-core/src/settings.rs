//! # Settings
//!
//! Settings are a JSON object handed down a component tree. Every composed
//! component merges the settings it receives at call time (*dynamic*) with
//! the settings it was composed with (*static*); on conflict the static side
//! wins, recursively:
//!
//! ```rust
//! use arbor_core::Settings;
//! use serde_json::json;
//!
//! let stat = Settings::from_value(json!({ "x": 1 })).unwrap();
//! let dynamic = Settings::from_value(json!({ "x": 2, "y": 3 })).unwrap();
//! assert_eq!(Settings::merge(&dynamic, &stat).to_value(), json!({ "x": 1, "y": 3 }));
//! ```
//!
//! Besides data, settings carry optional trace [`Hooks`] so instrumentation
//! reaches every level of the tree without any global state.

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::{ContractError, Sinks, Sources};

/// Default binding name of the value a `for_each` incarnation was built for.
pub const EACH_KEY: &str = "each";
/// Key under which a `switch` case receives the discriminant value it matched.
pub const MATCHED_KEY: &str = "matched";

/// Instrumentation around every composed component. Both methods default to
/// the identity.
pub trait Hooks {
    /// Called before the component extends its sources.
    fn preprocess_input(&self, _component: &str, sources: Sources, _settings: &Settings) -> Sources {
        sources
    }

    /// Called after the component has merged its sinks.
    fn postprocess_output(&self, _component: &str, sinks: Sinks, _settings: &Settings) -> Sinks {
        sinks
    }
}

#[derive(Clone, Default)]
pub struct Settings {
    values: Map<String, Value>,
    hooks: Option<Rc<dyn Hooks>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `null` (no settings) or an object.
    pub fn from_value(value: Value) -> Result<Self, ContractError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(values) => Ok(Self { values, hooks: None }),
            other => Err(ContractError::InvalidSettings {
                found: kind_of(&other).to_string(),
            }),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn with_hooks(mut self, hooks: Rc<dyn Hooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn hooks(&self) -> Option<&Rc<dyn Hooks>> {
        self.hooks.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Deep merge; `static_` wins on conflict. Hooks from `static_` win too.
    pub fn merge(dynamic: &Settings, static_: &Settings) -> Settings {
        let mut values = dynamic.values.clone();
        merge_maps(&mut values, &static_.values);
        Settings {
            values,
            hooks: static_.hooks.clone().or_else(|| dynamic.hooks.clone()),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("values", &self.values)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl PartialEq for Settings {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

/// Pure recursive merge of two JSON values; `static_` wins on conflict.
/// Objects merge key by key; anything else (arrays included) is replaced.
pub fn merge_values(dynamic: &Value, static_: &Value) -> Value {
    match (dynamic, static_) {
        (Value::Object(d), Value::Object(s)) => {
            let mut out = d.clone();
            merge_maps(&mut out, s);
            Value::Object(out)
        }
        (_, s) => s.clone(),
    }
}

fn merge_maps(into: &mut Map<String, Value>, static_: &Map<String, Value>) {
    for (k, v) in static_ {
        let merged = match into.get(k) {
            Some(existing) => merge_values(existing, v),
            None => v.clone(),
        };
        into.insert(k.clone(), merged);
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
