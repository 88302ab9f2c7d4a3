//! Sources and sinks: named, typed stream ports.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{Stream, VNode};

/// Reserved name of the hierarchical sink. It is merged by slot projection
/// instead of by stream merge.
pub const VIEW_SINK: &str = "view";

/// What flows through a port: plain data, or a view tree. `View(None)` is
/// the neutral tree ("render nothing").
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Value(Value),
    View(Option<VNode>),
}

impl Payload {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::View(_) => None,
        }
    }

    /// Data view of the payload; view trees are serialized.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Value(v) => v,
            Payload::View(None) => Value::Null,
            Payload::View(Some(node)) => serde_json::to_value(node).unwrap_or(Value::Null),
        }
    }

    pub fn as_view(&self) -> Option<&VNode> {
        match self {
            Payload::View(v) => v.as_ref(),
            Payload::Value(_) => None,
        }
    }

    /// Tree view of the payload; plain data counts as the empty tree.
    pub fn into_view(self) -> Option<VNode> {
        match self {
            Payload::View(v) => v,
            Payload::Value(_) => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Value(v)
    }
}

impl From<VNode> for Payload {
    fn from(node: VNode) -> Self {
        Payload::View(Some(node))
    }
}

impl From<Option<VNode>> for Payload {
    fn from(node: Option<VNode>) -> Self {
        Payload::View(node)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    /// Continuously valued; replays the latest value to new observers.
    Behavior,
    /// Discrete occurrences; no replay.
    Event,
}

#[derive(Clone, Debug)]
pub struct Port {
    kind: PortKind,
    stream: Stream<Payload>,
}

impl Port {
    /// Wraps `stream` with `remember()` so late observers get the latest value.
    pub fn behavior(stream: Stream<Payload>) -> Self {
        Port {
            kind: PortKind::Behavior,
            stream: stream.remember(),
        }
    }

    pub fn event(stream: Stream<Payload>) -> Self {
        Port {
            kind: PortKind::Event,
            stream,
        }
    }

    pub fn of_kind(kind: PortKind, stream: Stream<Payload>) -> Self {
        match kind {
            PortKind::Behavior => Port::behavior(stream),
            PortKind::Event => Port::event(stream),
        }
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn is_behavior(&self) -> bool {
        self.kind == PortKind::Behavior
    }

    pub fn stream(&self) -> &Stream<Payload> {
        &self.stream
    }

    /// Same kind, transformed stream.
    pub fn map_stream(&self, f: impl FnOnce(&Stream<Payload>) -> Stream<Payload>) -> Port {
        Port::of_kind(self.kind, f(&self.stream))
    }
}

/// Name → port. A name mapped to `None` is an explicit "no output here".
#[derive(Clone, Debug, Default)]
pub struct Ports {
    entries: BTreeMap<String, Option<Port>>,
}

pub type Sources = Ports;
pub type Sinks = Ports;

impl Ports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, port: Port) -> Self {
        self.entries.insert(name.into(), Some(port));
        self
    }

    pub fn with_none(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), None);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, port: Option<Port>) -> Option<Option<Port>> {
        self.entries.insert(name.into(), port)
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    pub fn stream(&self, name: &str) -> Option<Stream<Payload>> {
        self.get(name).map(|p| p.stream().clone())
    }

    /// True for names mapped to `None` as well.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Port> {
        self.entries.remove(name).flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Port>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild every present port through `f`.
    pub fn map_ports(self, mut f: impl FnMut(&str, Port) -> Port) -> Ports {
        let entries = self
            .entries
            .into_iter()
            .map(|(name, port)| {
                let port = port.map(|p| f(&name, p));
                (name, port)
            })
            .collect();
        Ports { entries }
    }
}

impl FromIterator<(String, Option<Port>)> for Ports {
    fn from_iter<I: IntoIterator<Item = (String, Option<Port>)>>(iter: I) -> Self {
        Ports {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Ports {
    type Item = (String, Option<Port>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Option<Port>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
