//! # Scheduling
//!
//! Everything runs on one logical timeline owned by the current thread.
//!
//! - A [`Trampoline`] runs work immediately when idle. When work is already
//!   running, new work is queued FIFO behind it instead of nesting, so
//!   re-entrant writes are applied in order. The thread has one global
//!   trampoline ([`schedule_now`]), and a feedback cell owns a private one.
//! - The **virtual clock** ([`schedule_after`]) holds timers keyed by tick.
//!   Time moves only when a driver (or a test) calls [`advance_by`],
//!   [`advance_to`] or [`run_until_idle`].
//!
//! ```rust
//! use arbor_core::scheduler;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let s = seen.clone();
//! scheduler::schedule_after(5, move || s.borrow_mut().push(scheduler::now()));
//! scheduler::advance_to(10);
//! assert_eq!(*seen.borrow(), vec![5]);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};

use crate::Dispose;

/// One unit of virtual time.
pub type Tick = u64;

type Task = Box<dyn FnOnce()>;

thread_local! {
    static CLOCK: RefCell<Clock> = RefCell::new(Clock::default());
    static TRAMPOLINE: Trampoline = Trampoline::new();
}

/// FIFO run queue that never nests.
#[derive(Default)]
pub struct Trampoline {
    queue: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
}

impl Trampoline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` now if idle, otherwise after everything already queued.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
        if !self.draining.get() {
            self.drain();
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn drain(&self) {
        // Clears the flag on unwind too, so one panicking task cannot wedge
        // the queue for the rest of the thread.
        struct Guard<'a>(&'a Cell<bool>);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        self.draining.set(true);
        let _guard = Guard(&self.draining);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn clear(&self) {
        let dropped = std::mem::take(&mut *self.queue.borrow_mut());
        drop(dropped);
    }
}

#[derive(Default)]
struct Clock {
    now: Tick,
    next_seq: u64,
    // (due, seq) keeps same-tick timers in insertion order
    timers: BTreeMap<(Tick, u64), Task>,
}

/// Current virtual tick.
pub fn now() -> Tick {
    CLOCK.with(|c| c.borrow().now)
}

/// Whether the thread's trampoline is running a task.
pub fn is_draining() -> bool {
    TRAMPOLINE.with(Trampoline::is_draining)
}

/// Run `task` on the thread's trampoline.
pub fn schedule_now(task: impl FnOnce() + 'static) {
    TRAMPOLINE.with(|t| t.schedule(task));
}

/// Run `task` once the virtual clock reaches `now() + delay`.
pub fn schedule_after(delay: Tick, task: impl FnOnce() + 'static) -> Dispose {
    let key = CLOCK.with(|c| {
        let mut c = c.borrow_mut();
        let due = c.now.saturating_add(delay);
        let seq = c.next_seq;
        c.next_seq += 1;
        c.timers.insert((due, seq), Box::new(task));
        (due, seq)
    });
    Dispose::new(move || {
        let removed = CLOCK.with(|c| c.borrow_mut().timers.remove(&key));
        drop(removed);
    })
}

/// Number of timers still waiting.
pub fn pending_timers() -> usize {
    CLOCK.with(|c| c.borrow().timers.len())
}

/// Fire every timer due up to and including `target`, then set the clock to
/// `target`. Moving backwards is ignored.
pub fn advance_to(target: Tick) {
    loop {
        let next = CLOCK.with(|c| {
            let mut c = c.borrow_mut();
            let key = *c.timers.keys().next()?;
            if key.0 > target {
                return None;
            }
            let task = c.timers.remove(&key)?;
            c.now = c.now.max(key.0);
            Some(task)
        });
        match next {
            Some(task) => schedule_now(task),
            None => break,
        }
    }
    CLOCK.with(|c| {
        let mut c = c.borrow_mut();
        c.now = c.now.max(target);
    });
}

pub fn advance_by(ticks: Tick) {
    advance_to(now().saturating_add(ticks));
}

/// Fire timers until none are left. Periodic sources never let this return,
/// so prefer [`advance_to`] when one may be live.
pub fn run_until_idle() {
    loop {
        let due = CLOCK.with(|c| c.borrow().timers.keys().next().map(|k| k.0));
        match due {
            Some(due) => advance_to(due),
            None => break,
        }
    }
}

/// Drop all pending work and rewind the clock to zero.
pub fn reset() {
    if is_draining() {
        log::warn!("scheduler reset while draining; queued tasks are discarded");
    }
    TRAMPOLINE.with(Trampoline::clear);
    // dropped outside the borrow: captured state may touch the clock
    let old = CLOCK.with(|c| std::mem::take(&mut *c.borrow_mut()));
    drop(old);
}
