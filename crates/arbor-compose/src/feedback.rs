//! # Feedback
//!
//! `inject_feedback` closes a loop inside a sub-tree: it adds a source the
//! sub-tree reads and takes the sink of the same name as that source's only
//! writer.
//!
//! - A **behavior cell** holds state. Each command on the write sink becomes
//!   the next state through a reducer or a JSON patch. The state source
//!   replays the current value to new readers.
//! - An **event cell** turns each command into a stream of results through
//!   a processing function. The results are emitted on the event source.
//!
//! Writes are applied one at a time on the cell's own trampoline. A new
//! state reaches every reader before a write issued during that delivery is
//! applied, so no reader sees states out of order. A handler subscribed
//! after the cell's writer sees the state its own command produced.
//!
//! A failed state update is logged and dropped. The previous state stays.
//! A failed processing function ends the event source with that error.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use arbor_core::scheduler::Trampoline;
use arbor_core::{
    BehaviorSubject, ContractError, Dispose, Observer, Payload, Port, Sources, Stream, StreamError,
    Subject,
};
use serde_json::Value;

use crate::patch::apply_patch;
use crate::{ComponentDef, ComponentTree, Component, m};

pub type ReducerFn = Rc<dyn Fn(&Value, &Value) -> Result<Value, String>>;
pub type ProcessFn = Rc<dyn Fn(Value) -> Stream<Value>>;

/// How a command becomes the next state.
#[derive(Clone)]
pub enum StateUpdate {
    /// `(command, state) -> next state`.
    Reducer(ReducerFn),
    /// The command is an RFC 6902 patch applied to the state.
    JsonPatch,
}

impl StateUpdate {
    pub fn reducer(f: impl Fn(&Value, &Value) -> Result<Value, String> + 'static) -> Self {
        StateUpdate::Reducer(Rc::new(f))
    }

    pub fn apply(&self, command: &Value, state: &Value) -> Result<Value, String> {
        match self {
            StateUpdate::Reducer(f) => f(command, state),
            StateUpdate::JsonPatch => apply_patch(state, command).map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Reducer(_) => f.write_str("Reducer"),
            StateUpdate::JsonPatch => f.write_str("JsonPatch"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BehaviorCell {
    pub name: String,
    pub initial: Value,
    pub update: StateUpdate,
}

impl BehaviorCell {
    pub fn new(name: impl Into<String>, initial: Value, update: StateUpdate) -> Self {
        Self {
            name: name.into(),
            initial,
            update,
        }
    }
}

#[derive(Clone)]
pub struct EventCell {
    pub name: String,
    pub process: ProcessFn,
}

impl EventCell {
    pub fn new(name: impl Into<String>, process: impl Fn(Value) -> Stream<Value> + 'static) -> Self {
        Self {
            name: name.into(),
            process: Rc::new(process),
        }
    }
}

impl fmt::Debug for EventCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCell").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Cells to inject. At least one must be present, under distinct names.
#[derive(Clone, Debug, Default)]
pub struct Feedback {
    pub behavior: Option<BehaviorCell>,
    pub event: Option<EventCell>,
}

impl Feedback {
    pub fn with_behavior(mut self, cell: BehaviorCell) -> Self {
        self.behavior = Some(cell);
        self
    }

    pub fn with_event(mut self, cell: EventCell) -> Self {
        self.event = Some(cell);
        self
    }

    fn validate(&self) -> Result<(), ContractError> {
        match (&self.behavior, &self.event) {
            (None, None) => Err(ContractError::InvalidFeedback {
                reason: "neither a behavior nor an event cell is configured".to_string(),
            }),
            (Some(b), Some(e)) if b.name == e.name => Err(ContractError::InvalidFeedback {
                reason: format!("behavior and event cells share the name `{}`", b.name),
            }),
            _ => Ok(()),
        }
    }
}

/// A state value with a single writer.
#[derive(Clone)]
pub struct StateCell {
    name: Rc<str>,
    state: BehaviorSubject<Value>,
    update: StateUpdate,
    writes: Rc<Trampoline>,
}

impl StateCell {
    pub fn new(name: &str, initial: Value, update: StateUpdate) -> Self {
        Self {
            name: name.into(),
            state: BehaviorSubject::new(initial),
            update,
            writes: Rc::new(Trampoline::new()),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> Value {
        self.state.value()
    }

    /// Behavior over the state. The replay to a new reader runs on the
    /// cell's trampoline like any write, so a write the replay triggers
    /// lands after it.
    pub fn source(&self) -> Port {
        let (state, writes) = (self.state.clone(), self.writes.clone());
        let stream = Stream::new(move |obs: Observer<Value>| {
            let seen = Rc::new(Cell::new(false));
            let s = seen.clone();
            let handle = state.changes().subscribe(Observer::relay(&obs, move |down, v| {
                s.set(true);
                down.next(v)
            }));
            let (current, reader) = (state.clone(), obs);
            writes.schedule(move || {
                // a state delivered since subscribing is newer than the replay
                if !seen.get() && !current.is_stopped() {
                    reader.next(current.value());
                }
            });
            handle
        });
        Port::behavior(stream.map(Payload::Value))
    }

    /// Apply `command` now, or right after the state being delivered.
    pub fn write(&self, command: Value) {
        let cell = self.clone();
        self.writes.schedule(move || cell.apply(&command));
    }

    /// Complete the state source once pending writes are applied.
    pub fn finish(&self) {
        let state = self.state.clone();
        self.writes.schedule(move || state.complete());
    }

    /// Feed every value of `commands` into the cell.
    pub fn drive(&self, commands: &Stream<Payload>) -> Dispose {
        let (on_next, on_error, on_done) = (self.clone(), self.clone(), self.clone());
        commands.subscribe(Observer::new(
            move |command: Payload| on_next.write(command.into_value()),
            move |err| {
                log::error!("feedback `{}`: writer failed, closing state: {err}", on_error.name);
                on_error.finish();
            },
            move || on_done.finish(),
        ))
    }

    fn apply(&self, command: &Value) {
        if self.state.is_stopped() {
            log::warn!("feedback `{}`: write after completion ignored", self.name);
            return;
        }
        let current = self.state.value();
        match self.update.apply(command, &current) {
            Ok(next) => self.state.next(next),
            Err(reason) => {
                log::error!("feedback `{}`: update failed, keeping previous state: {reason}", self.name)
            }
        }
    }
}

/// Run each command through `process` and emit the results on `events`.
fn drive_events(name: &str, process: ProcessFn, commands: &Stream<Payload>, events: Subject<Payload>) -> Dispose {
    let (on_next, on_error, on_done) = (events.clone(), events.clone(), events);
    let name = name.to_string();
    commands
        .flat_map(move |command: Payload| process(command.into_value()))
        .subscribe(Observer::new(
            move |value| on_next.next(Payload::Value(value)),
            move |err: StreamError| {
                log::error!("feedback `{name}`: processing failed, closing event source: {err}");
                on_error.error(err);
            },
            move || on_done.complete(),
        ))
}

/// Subscribes every writer on first use and unsubscribes them when the last
/// user leaves.
fn connect_writers(drives: Vec<Rc<dyn Fn() -> Dispose>>) -> Stream<()> {
    Stream::new(move |_: Observer<()>| Dispose::all(drives.iter().map(|drive| drive()))).share()
}

/// `port`, keeping the writers connected while it is subscribed.
fn hold_writers(port: &Port, writers: &Stream<()>) -> Port {
    let writers = writers.clone();
    port.map_stream(|out| {
        let out = out.clone();
        Stream::new(move |obs: Observer<Payload>| {
            let connection = writers.subscribe(Observer::new(|_: ()| {}, |_| {}, || {}));
            let sub = out.subscribe(obs);
            Dispose::all([sub, connection])
        })
    })
}

fn inject(sources: &mut Sources, name: &str, port: Port) -> Result<(), ContractError> {
    if sources.contains(name) {
        return Err(ContractError::SourceCollision {
            component: "InjectFeedback".to_string(),
            source_name: name.to_string(),
        });
    }
    sources.insert(name, Some(port));
    Ok(())
}

/// Wire `feedback` around `tree`.
///
/// The sub-tree's sinks named after the cells are consumed as writers and
/// do not appear in the output. A missing writer is only a warning: the
/// cell then keeps its initial value.
///
/// Writers are subscribed while at least one returned sink is, so a
/// discarded incarnation stops feeding its cells once its sinks are
/// released.
pub fn inject_feedback(feedback: Feedback, tree: impl Into<ComponentTree>) -> Result<Component, ContractError> {
    feedback.validate()?;
    let body = m(ComponentDef::new("InjectFeedback.body"), Value::Null, tree)?;
    let feedback = Rc::new(feedback);

    let def = ComponentDef::new("InjectFeedback").compute_sinks(move |_, children, sources, settings| {
        let Some(body) = children.first() else {
            return Err(ContractError::EmptyTree);
        };
        let mut extended = sources.clone();

        let state = feedback
            .behavior
            .as_ref()
            .map(|cell| (cell, StateCell::new(&cell.name, cell.initial.clone(), cell.update.clone())));
        if let Some((cell, state)) = &state {
            inject(&mut extended, &cell.name, state.source())?;
        }

        let events = feedback.event.as_ref().map(|cell| (cell, Subject::<Payload>::new()));
        if let Some((cell, subject)) = &events {
            inject(&mut extended, &cell.name, Port::event(subject.stream()))?;
        }

        let mut sinks = body.call(&extended, settings)?;

        let mut drives: Vec<Rc<dyn Fn() -> Dispose>> = Vec::new();
        if let Some((cell, state)) = state {
            match sinks.remove(&cell.name) {
                Some(writer) => {
                    let writer = writer.stream().clone();
                    drives.push(Rc::new(move || state.drive(&writer)));
                }
                None => log::warn!("feedback `{}`: no sink writes this state", cell.name),
            }
        }
        if let Some((cell, subject)) = events {
            match sinks.remove(&cell.name) {
                Some(writer) => {
                    let (name, process, writer) = (cell.name.clone(), cell.process.clone(), writer.stream().clone());
                    drives.push(Rc::new(move || drive_events(&name, process.clone(), &writer, subject.clone())));
                }
                None => log::warn!("feedback `{}`: no sink feeds this event source", cell.name),
            }
        }

        let writers = connect_writers(drives);
        Ok(sinks.map_ports(|_, port| hold_writers(&port, &writers)))
    });

    m(def, Value::Null, vec![body])
}
