//! `for_each`: rebuild a sub-tree for every value of a source.

use std::rc::Rc;

use arbor_core::{
    ContractError, EACH_KEY, Payload, Sinks, Stream, StreamError, VIEW_SINK,
};
use serde_json::Value;

use crate::compose::port_for;
use crate::{Component, ComponentDef, m};

/// Configuration of [`for_each`].
#[derive(Clone, Debug)]
pub struct ForEach {
    /// Source whose values drive the incarnations.
    pub from: String,
    /// Settings key the current value is bound to.
    pub as_: String,
    /// Sinks exposed by the combinator. Must not be empty.
    pub sink_names: Vec<String>,
}

impl ForEach {
    pub fn new<S: Into<String>>(from: impl Into<String>, sink_names: impl IntoIterator<Item = S>) -> Self {
        Self {
            from: from.into(),
            as_: EACH_KEY.to_string(),
            sink_names: sink_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bind_as(mut self, key: impl Into<String>) -> Self {
        self.as_ = key.into();
        self
    }
}

/// Each value on `from` builds a fresh incarnation of `children` with the
/// value bound under `as_`. Every declared sink follows the latest
/// incarnation only; the previous one is unsubscribed before the next one
/// is subscribed.
///
/// An incarnation that lacks a declared sink contributes the empty tree for
/// `view` and nothing for any other sink.
pub fn for_each(config: ForEach, children: Vec<Component>) -> Result<Component, ContractError> {
    if children.is_empty() {
        return Err(ContractError::NoChildren { combinator: "for_each" });
    }
    if config.sink_names.is_empty() {
        return Err(ContractError::MissingSinkNames { combinator: "for_each" });
    }

    let body = m(ComponentDef::new("ForEach.body"), Value::Null, children)?;
    let name = format!("ForEach({})", config.from);
    let component = name.clone();
    let config = Rc::new(config);

    let def = ComponentDef::new(name).compute_sinks(move |_, children, sources, settings| {
        let from = sources.stream(&config.from).ok_or_else(|| ContractError::MissingSource {
            component: component.clone(),
            source_name: config.from.clone(),
        })?;

        let Some(body) = children.first().cloned() else {
            return Err(ContractError::NoChildren { combinator: "for_each" });
        };
        let (sources, settings, key) = (sources.clone(), settings.clone(), config.as_.clone());
        let incarnations = from
            .map(move |item: Payload| {
                let mut bound = settings.clone();
                bound.insert(key.clone(), item.into_value());
                log::debug!("for_each: new incarnation of `{}`", body.name());
                Rc::new(body.call(&sources, &bound))
            })
            .remember();

        let mut sinks = Sinks::new();
        for sink in &config.sink_names {
            let name = sink.clone();
            let stream = incarnations.switch_map(move |incarnation| match incarnation.as_ref() {
                Ok(sinks) => sinks.stream(&name).unwrap_or_else(|| absent(&name)),
                Err(err) => Stream::throw(StreamError::Contract(err.clone())),
            });
            sinks.insert(sink.clone(), Some(port_for(sink, stream)));
        }
        Ok(sinks)
    });

    m(def, Value::Null, vec![body])
}

fn absent(sink: &str) -> Stream<Payload> {
    if sink == VIEW_SINK {
        Stream::of(Payload::View(None))
    } else {
        Stream::empty()
    }
}
