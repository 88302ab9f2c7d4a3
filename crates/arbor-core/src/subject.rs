//! Hot streams: [`Subject`], [`BehaviorSubject`], and the multicasting
//! operators [`Stream::share`] / [`Stream::remember`] built on the same idea.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{DefaultKey, SlotMap};

use crate::{Dispose, Observer, Stream, StreamError};

#[derive(Clone)]
enum Terminal {
    Completed,
    Errored(StreamError),
}

struct Hub<T> {
    observers: SlotMap<DefaultKey, Observer<T>>,
    terminal: Option<Terminal>,
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self {
            observers: SlotMap::new(),
            terminal: None,
        }
    }
}

/// Multicast event source. Late subscribers only see what comes after they
/// subscribed.
pub struct Subject<T> {
    hub: Rc<RefCell<Hub<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            hub: Rc::new(RefCell::new(Hub::default())),
        }
    }

    pub fn next(&self, value: T) {
        // snapshot: observers may (un)subscribe while we deliver
        let targets: Vec<Observer<T>> = {
            let hub = self.hub.borrow();
            if hub.terminal.is_some() {
                return;
            }
            hub.observers.values().cloned().collect()
        };
        for o in targets {
            o.next(value.clone());
        }
    }

    pub fn error(&self, err: StreamError) {
        for o in self.terminate(Terminal::Errored(err.clone())) {
            o.error(err.clone());
        }
    }

    pub fn complete(&self) {
        for o in self.terminate(Terminal::Completed) {
            o.complete();
        }
    }

    fn terminate(&self, terminal: Terminal) -> Vec<Observer<T>> {
        let mut hub = self.hub.borrow_mut();
        if hub.terminal.is_some() {
            return Vec::new();
        }
        hub.terminal = Some(terminal);
        hub.observers.drain().map(|(_, o)| o).collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.hub.borrow().terminal.is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.hub.borrow().observers.len()
    }

    /// An observer that feeds this subject, for piping a stream into it.
    pub fn observer(&self) -> Observer<T> {
        let (a, b, c) = (self.clone(), self.clone(), self.clone());
        Observer::new(move |v| a.next(v), move |e| b.error(e), move || c.complete())
    }

    pub fn stream(&self) -> Stream<T> {
        let hub = self.hub.clone();
        Stream::new(move |obs: Observer<T>| {
            let terminal = hub.borrow().terminal.clone();
            match terminal {
                Some(Terminal::Completed) => {
                    obs.complete();
                    return Dispose::noop();
                }
                Some(Terminal::Errored(e)) => {
                    obs.error(e);
                    return Dispose::noop();
                }
                None => {}
            }
            let key = hub.borrow_mut().observers.insert(obs);
            let hub = hub.clone();
            Dispose::new(move || {
                hub.borrow_mut().observers.remove(key);
            })
        })
    }
}

/// A subject that always holds a value and replays it to every new
/// subscriber. Reads are snapshots: [`BehaviorSubject::value`] clones, so no
/// reader can see a half-written value.
pub struct BehaviorSubject<T> {
    subject: Subject<T>,
    current: Rc<RefCell<T>>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            current: self.current.clone(),
        }
    }
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    pub fn new(initial: T) -> Self {
        Self {
            subject: Subject::new(),
            current: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn value(&self) -> T {
        self.current.borrow().clone()
    }

    pub fn next(&self, value: T) {
        if self.subject.is_stopped() {
            return;
        }
        *self.current.borrow_mut() = value.clone();
        self.subject.next(value);
    }

    pub fn error(&self, err: StreamError) {
        self.subject.error(err)
    }

    pub fn complete(&self) {
        self.subject.complete()
    }

    pub fn is_stopped(&self) -> bool {
        self.subject.is_stopped()
    }

    pub fn observer_count(&self) -> usize {
        self.subject.observer_count()
    }

    /// Values written after subscribing, without the replay.
    pub fn changes(&self) -> Stream<T> {
        self.subject.stream()
    }

    pub fn stream(&self) -> Stream<T> {
        let inner = self.subject.stream();
        let current = self.current.clone();
        let stopped = self.subject.clone();
        Stream::new(move |obs: Observer<T>| {
            if stopped.is_stopped() {
                return inner.subscribe(obs);
            }
            // Register before replaying, so a write triggered by the replay
            // itself is not missed.
            let handle = inner.subscribe(obs.clone());
            let snapshot = current.borrow().clone();
            obs.next(snapshot);
            handle
        })
    }
}

struct Multicast<T> {
    observers: SlotMap<DefaultKey, Observer<T>>,
    upstream: Option<Dispose>,
    connecting: bool,
    // bumped on every error/complete so a connection that ended while being
    // established is not stored
    epoch: u64,
    last: Option<T>,
}

impl<T: Clone + 'static> Stream<T> {
    /// Ref-counted multicast: the first subscriber connects upstream, the
    /// last one to leave disconnects it.
    pub fn share(&self) -> Stream<T> {
        self.multicast(false)
    }

    /// [`Stream::share`] plus replay of the latest value to late subscribers.
    /// This is what turns a stream into a Behavior.
    pub fn remember(&self) -> Stream<T> {
        self.multicast(true)
    }

    fn multicast(&self, replay: bool) -> Stream<T> {
        let src = self.clone();
        let state = Rc::new(RefCell::new(Multicast {
            observers: SlotMap::new(),
            upstream: None,
            connecting: false,
            epoch: 0,
            last: None,
        }));
        Stream::new(move |obs: Observer<T>| {
            let key = state.borrow_mut().observers.insert(obs.clone());
            if replay {
                let last = state.borrow().last.clone();
                if let Some(v) = last {
                    obs.next(v);
                }
            }

            let connect = {
                let mut s = state.borrow_mut();
                let go = s.upstream.is_none() && !s.connecting && s.observers.contains_key(key);
                if go {
                    s.connecting = true;
                }
                go
            };
            if connect {
                let epoch = state.borrow().epoch;
                let handle = src.subscribe(multicast_observer(&state, replay));
                let mut s = state.borrow_mut();
                s.connecting = false;
                if s.epoch == epoch && !s.observers.is_empty() {
                    s.upstream = Some(handle);
                } else {
                    drop(s);
                    handle.run();
                }
            }

            let state = state.clone();
            let released = Cell::new(false);
            Dispose::new(move || {
                if released.replace(true) {
                    return;
                }
                let upstream = {
                    let mut s = state.borrow_mut();
                    s.observers.remove(key);
                    if s.observers.is_empty() {
                        s.last = None;
                        s.upstream.take()
                    } else {
                        None
                    }
                };
                if let Some(u) = upstream {
                    u.run();
                }
            })
        })
    }
}

fn multicast_observer<T: Clone + 'static>(state: &Rc<RefCell<Multicast<T>>>, replay: bool) -> Observer<T> {
    let (s1, s2, s3) = (state.clone(), state.clone(), state.clone());
    Observer::new(
        move |v: T| {
            let targets: Vec<Observer<T>> = {
                let mut s = s1.borrow_mut();
                if replay {
                    s.last = Some(v.clone());
                }
                s.observers.values().cloned().collect()
            };
            for o in targets {
                o.next(v.clone());
            }
        },
        move |e| {
            for o in finish(&s2) {
                o.error(e.clone());
            }
        },
        move || {
            for o in finish(&s3) {
                o.complete();
            }
        },
    )
}

fn finish<T>(state: &Rc<RefCell<Multicast<T>>>) -> Vec<Observer<T>> {
    let mut s = state.borrow_mut();
    s.epoch += 1;
    s.last = None;
    s.upstream = None;
    s.observers.drain().map(|(_, o)| o).collect()
}
