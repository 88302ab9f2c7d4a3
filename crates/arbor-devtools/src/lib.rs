use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use arbor_core::{Hooks, Observer, Payload, Port, Settings, Sinks, Sources, Stream, StreamError};


#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Source,
    Sink,
}

/// Identifies one traced port.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortId {
    pub component: String,
    pub port: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub emitted: u64,
    pub errors: u64,
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TracedError {
    pub at: PortId,
    pub error: StreamError,
}

#[derive(Default)]
struct Trace {
    stats: BTreeMap<PortId, PortStats>,
    errors: Vec<TracedError>,
}

/// Trace hooks: install with `Settings::with_hooks` and every composed
/// level below logs and counts what flows through its sources and sinks.
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct TraceHud {
    enabled: Rc<Cell<bool>>,
    trace: Rc<RefCell<Trace>>,
}

impl Default for TraceHud {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceHud {
    pub fn new() -> Self {
        Self {
            enabled: Rc::new(Cell::new(true)),
            trace: Rc::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Applies to ports wired after the change; already traced ports keep
    /// counting.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn toggle(&self) {
        self.set_enabled(!self.is_enabled());
    }

    /// Settings carrying this hud as hooks.
    pub fn settings(&self) -> Settings {
        Settings::new().with_hooks(Rc::new(self.clone()))
    }

    pub fn stats(&self) -> BTreeMap<PortId, PortStats> {
        self.trace.borrow().stats.clone()
    }

    pub fn stats_for(&self, component: &str, port: &str, direction: Direction) -> PortStats {
        let id = PortId {
            component: component.to_string(),
            port: port.to_string(),
            direction,
        };
        self.trace.borrow().stats.get(&id).cloned().unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<TracedError> {
        self.trace.borrow().errors.clone()
    }

    pub fn reset(&self) {
        *self.trace.borrow_mut() = Trace::default();
    }

    /// One line per traced port, in port order.
    pub fn summary_lines(&self) -> Vec<String> {
        let trace = self.trace.borrow();
        let mut lines: Vec<String> = trace
            .stats
            .iter()
            .map(|(id, s)| {
                let arrow = match id.direction {
                    Direction::Source => "<-",
                    Direction::Sink => "->",
                };
                let mut line = format!("{} {arrow} {}: {} emitted", id.component, id.port, s.emitted);
                if s.errors > 0 {
                    line.push_str(&format!(", {} errors", s.errors));
                }
                if s.completed {
                    line.push_str(", completed");
                }
                line
            })
            .collect();
        if !trace.errors.is_empty() {
            lines.push(format!("errors: {}", trace.errors.len()));
        }
        lines
    }

    fn instrument(&self, component: &str, direction: Direction, ports: Sources) -> Sources {
        if !self.is_enabled() {
            return ports;
        }
        ports.map_ports(|name, port| {
            let id = PortId {
                component: component.to_string(),
                port: name.to_string(),
                direction,
            };
            self.trace.borrow_mut().stats.entry(id.clone()).or_default();
            tap_port(&port, id, self.trace.clone())
        })
    }
}

fn tap_port(port: &Port, id: PortId, trace: Rc<RefCell<Trace>>) -> Port {
    let src = port.stream().clone();
    let tapped = Stream::new(move |down: Observer<Payload>| {
        let (id_next, id_err, id_done) = (id.clone(), id.clone(), id.clone());
        let (t_next, t_err, t_done) = (trace.clone(), trace.clone(), trace.clone());
        let (d_next, d_err, d_done) = (down.clone(), down.clone(), down);
        src.subscribe(Observer::new(
            move |v: Payload| {
                match id_next.direction {
                    Direction::Source => log::trace!("{} <- {}: {v:?}", id_next.component, id_next.port),
                    Direction::Sink => log::debug!("{} -> {}: {v:?}", id_next.component, id_next.port),
                }
                t_next.borrow_mut().stats.entry(id_next.clone()).or_default().emitted += 1;
                d_next.next(v);
            },
            move |e: StreamError| {
                log::warn!("{} {}: stream error: {e}", id_err.component, id_err.port);
                {
                    let mut t = t_err.borrow_mut();
                    t.stats.entry(id_err.clone()).or_default().errors += 1;
                    t.errors.push(TracedError {
                        at: id_err.clone(),
                        error: e.clone(),
                    });
                }
                d_err.error(e);
            },
            move || {
                t_done.borrow_mut().stats.entry(id_done.clone()).or_default().completed = true;
                d_done.complete();
            },
        ))
    });
    port.map_stream(|_| tapped)
}

impl Hooks for TraceHud {
    fn preprocess_input(&self, component: &str, sources: Sources, _settings: &Settings) -> Sources {
        self.instrument(component, Direction::Source, sources)
    }

    fn postprocess_output(&self, component: &str, sinks: Sinks, _settings: &Settings) -> Sinks {
        self.instrument(component, Direction::Sink, sinks)
    }
}
