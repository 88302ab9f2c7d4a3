//! `switch`: activate the case matching the latest discriminant value.
//!
//! Every discriminant emission rebuilds the matching case, even when the
//! same case matches again. When several cases match, the one declared last
//! wins. With no match all sinks go quiet: `view` shows the empty tree and
//! the other sinks emit nothing.

use std::fmt;
use std::rc::Rc;

use arbor_core::{
    ContractError, MATCHED_KEY, Payload, Settings, Sinks, Sources, Stream, StreamError, VIEW_SINK,
};
use serde_json::Value;

use crate::compose::port_for;
use crate::{Component, ComponentDef, m};

pub type DiscriminantFn = Rc<dyn Fn(&Sources, &Settings) -> Stream<Payload>>;

/// Where the discriminant comes from.
#[derive(Clone)]
pub enum Discriminant {
    Source(String),
    Computed(DiscriminantFn),
}

impl fmt::Debug for Discriminant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminant::Source(name) => f.debug_tuple("Source").field(name).finish(),
            Discriminant::Computed(_) => f.write_str("Computed"),
        }
    }
}

#[derive(Clone)]
pub enum When {
    Equals(Value),
    Test(Rc<dyn Fn(&Value) -> bool>),
}

impl When {
    pub fn equals(value: impl Into<Value>) -> Self {
        When::Equals(value.into())
    }

    pub fn test(pred: impl Fn(&Value) -> bool + 'static) -> Self {
        When::Test(Rc::new(pred))
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            When::Equals(expected) => expected == value,
            When::Test(pred) => pred(value),
        }
    }
}

impl fmt::Debug for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            When::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            When::Test(_) => f.write_str("Test"),
        }
    }
}

/// One branch of a [`switch`]: a predicate and the sub-tree it activates.
#[derive(Clone, Debug)]
pub struct Case {
    when: When,
    body: Component,
}

impl Case {
    pub fn when(&self) -> &When {
        &self.when
    }
}

pub fn case(when: When, children: Vec<Component>) -> Result<Case, ContractError> {
    if children.is_empty() {
        return Err(ContractError::NoChildren { combinator: "case" });
    }
    let body = m(ComponentDef::new("Case"), Value::Null, children)?;
    Ok(Case { when, body })
}

#[derive(Clone, Debug)]
pub struct Switch {
    pub on: Discriminant,
    pub sink_names: Vec<String>,
}

impl Switch {
    pub fn on_source<S: Into<String>>(source: impl Into<String>, sink_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            on: Discriminant::Source(source.into()),
            sink_names: sink_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn on_computed<S: Into<String>>(
        f: impl Fn(&Sources, &Settings) -> Stream<Payload> + 'static,
        sink_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            on: Discriminant::Computed(Rc::new(f)),
            sink_names: sink_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Active case of one discriminant emission, already called.
type Activation = Option<Rc<Result<Sinks, ContractError>>>;

pub fn switch(config: Switch, cases: Vec<Case>) -> Result<Component, ContractError> {
    if cases.is_empty() {
        return Err(ContractError::NoChildren { combinator: "switch" });
    }
    if config.sink_names.is_empty() {
        return Err(ContractError::MissingSinkNames { combinator: "switch" });
    }

    let whens: Rc<[When]> = cases.iter().map(|c| c.when.clone()).collect();
    let bodies: Vec<Component> = cases.into_iter().map(|c| c.body).collect();
    let config = Rc::new(config);

    let def = ComponentDef::new("Switch").compute_sinks(move |_, case_bodies, sources, settings| {
        let discriminant = match &config.on {
            Discriminant::Source(name) => {
                sources.stream(name).ok_or_else(|| ContractError::MissingSource {
                    component: "Switch".to_string(),
                    source_name: name.clone(),
                })?
            }
            Discriminant::Computed(f) => f(sources, settings),
        };

        let (whens, bodies) = (whens.clone(), case_bodies.to_vec());
        let (sources, settings) = (sources.clone(), settings.clone());
        let active: Stream<Activation> = discriminant
            .map(move |payload: Payload| {
                let value = payload.into_value();
                let matching: Vec<usize> = whens
                    .iter()
                    .enumerate()
                    .filter(|(_, when)| when.matches(&value))
                    .map(|(i, _)| i)
                    .collect();
                if matching.len() > 1 {
                    log::debug!("switch: cases {matching:?} all match {value}, using the last");
                }
                let index = *matching.last()?;
                let body = bodies.get(index)?;
                let mut case_settings = settings.clone();
                case_settings.insert(MATCHED_KEY, value);
                Some(Rc::new(body.call(&sources, &case_settings)))
            })
            .remember();

        let mut sinks = Sinks::new();
        for sink in &config.sink_names {
            let name = sink.clone();
            let stream = active.switch_map(move |activation: Activation| match activation.as_deref() {
                None => inactive(&name),
                Some(Ok(case_sinks)) => case_sinks.stream(&name).unwrap_or_else(|| inactive(&name)),
                Some(Err(err)) => Stream::throw(StreamError::Contract(err.clone())),
            });
            sinks.insert(sink.clone(), Some(port_for(sink, stream)));
        }
        Ok(sinks)
    });

    m(def, Value::Null, bodies)
}

fn inactive(sink: &str) -> Stream<Payload> {
    if sink == VIEW_SINK {
        Stream::of(Payload::View(None))
    } else {
        Stream::never()
    }
}
