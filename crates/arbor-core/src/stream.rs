//! # Streams
//!
//! A [`Stream<T>`] is a cold, push-based source: nothing happens until
//! [`Stream::subscribe`] is called, and every subscription runs the
//! producer again. Use [`Stream::share`] or [`Stream::remember`] (see
//! `subject.rs`) to multicast.
//!
//! ```rust
//! use arbor_core::Stream;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let out = Rc::new(RefCell::new(Vec::new()));
//! let o = out.clone();
//! Stream::from_iter(vec![1, 2, 3])
//!     .map(|x| x * 10)
//!     .subscribe_next(move |x| o.borrow_mut().push(x));
//! assert_eq!(*out.borrow(), vec![10, 20, 30]);
//! ```
//!
//! Observers are closed on `error`, `complete` and unsubscription; anything
//! delivered after that is dropped. This is what keeps a switched-away
//! incarnation from leaking a late value.

use std::cell::Cell;
use std::rc::Rc;

use crate::scheduler::{self, Tick};
use crate::{Dispose, StreamError};

pub struct Observer<T> {
    inner: Rc<ObserverInner<T>>,
}

struct ObserverInner<T> {
    on_next: Box<dyn Fn(T)>,
    on_error: Box<dyn Fn(StreamError)>,
    on_complete: Box<dyn Fn()>,
    closed: Cell<bool>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Observer<T> {
    pub fn new(
        on_next: impl Fn(T) + 'static,
        on_error: impl Fn(StreamError) + 'static,
        on_complete: impl Fn() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ObserverInner {
                on_next: Box::new(on_next),
                on_error: Box::new(on_error),
                on_complete: Box::new(on_complete),
                closed: Cell::new(false),
            }),
        }
    }

    /// Observer that only cares about values. Errors are logged.
    pub fn from_next(on_next: impl Fn(T) + 'static) -> Self {
        Self::new(
            on_next,
            |e| log::error!("unhandled stream error: {e}"),
            || {},
        )
    }

    /// Observer that forwards error/complete to `down` and hands values to
    /// `on_next` together with `down`.
    pub fn relay<U: 'static>(down: &Observer<U>, on_next: impl Fn(&Observer<U>, T) + 'static) -> Self {
        let d1 = down.clone();
        let d2 = down.clone();
        let d3 = down.clone();
        Self::new(
            move |v| on_next(&d1, v),
            move |e| d2.error(e),
            move || d3.complete(),
        )
    }

    pub fn next(&self, value: T) {
        if !self.inner.closed.get() {
            (self.inner.on_next)(value)
        }
    }

    pub fn error(&self, err: StreamError) {
        if !self.inner.closed.replace(true) {
            (self.inner.on_error)(err)
        }
    }

    pub fn complete(&self) {
        if !self.inner.closed.replace(true) {
            (self.inner.on_complete)()
        }
    }

    /// Stop delivery without notifying.
    pub fn close(&self) {
        self.inner.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }
}

pub struct Stream<T> {
    producer: Rc<dyn Fn(Observer<T>) -> Dispose>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stream<{}>", std::any::type_name::<T>())
    }
}

impl<T: Clone + 'static> Stream<T> {
    pub fn new(producer: impl Fn(Observer<T>) -> Dispose + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> Dispose {
        let guard = observer.clone();
        let upstream = (self.producer)(observer);
        Dispose::new(move || {
            guard.close();
            upstream.run();
        })
    }

    pub fn subscribe_next(&self, on_next: impl Fn(T) + 'static) -> Dispose {
        self.subscribe(Observer::from_next(on_next))
    }

    // region constructors

    pub fn of(value: T) -> Self {
        Self::from_iter(vec![value])
    }

    pub fn from_iter(values: impl IntoIterator<Item = T>) -> Self {
        let values: Rc<[T]> = values.into_iter().collect();
        Self::new(move |obs| {
            for v in values.iter() {
                if obs.is_closed() {
                    break;
                }
                obs.next(v.clone());
            }
            obs.complete();
            Dispose::noop()
        })
    }

    /// Completes immediately without a value.
    pub fn empty() -> Self {
        Self::new(|obs| {
            obs.complete();
            Dispose::noop()
        })
    }

    /// Never emits, never completes.
    pub fn never() -> Self {
        Self::new(|_| Dispose::noop())
    }

    pub fn throw(err: StreamError) -> Self {
        Self::new(move |obs| {
            obs.error(err.clone());
            Dispose::noop()
        })
    }

    /// Emits `value` once, `delay` ticks after subscription, then completes.
    pub fn timer(delay: Tick, value: T) -> Self {
        Self::new(move |obs| {
            let value = value.clone();
            scheduler::schedule_after(delay, move || {
                obs.next(value);
                obs.complete();
            })
        })
    }

    /// Emits each value at its tick, relative to subscription time, and
    /// completes after the last one.
    pub fn from_timeline(events: impl IntoIterator<Item = (Tick, T)>) -> Self {
        let events: Rc<[(Tick, T)]> = events.into_iter().collect();
        Self::new(move |obs| {
            let last = events.iter().map(|(t, _)| *t).max();
            let mut timers: Vec<Dispose> = events
                .iter()
                .cloned()
                .map(|(at, v)| {
                    let obs = obs.clone();
                    scheduler::schedule_after(at, move || obs.next(v))
                })
                .collect();
            let done = obs.clone();
            timers.push(scheduler::schedule_after(last.unwrap_or(0), move || done.complete()));
            Dispose::all(timers)
        })
    }

    // endregion
}
