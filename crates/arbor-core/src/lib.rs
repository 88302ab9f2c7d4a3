//! # Streams, Settings, and Views
//!
//! Arbor composes small reactive units into trees. This crate holds the
//! pieces every component is made of:
//!
//! - `Stream<T>`: a cold, push-based stream, plus `Subject` and
//!   `BehaviorSubject` for hot sources.
//! - `Ports`: named sources and sinks. Each port is a Behavior (it replays
//!   its latest value) or an Event (no replay).
//! - `Settings`: a JSON object handed down the tree and deep-merged at each
//!   level.
//! - `VNode`: the abstract ordered tree carried on the `view` sink.
//!
//! ## Streams
//!
//! ```rust
//! use arbor_core::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let clicks = Subject::new();
//! let count = clicks.stream().scan(0, |n, _: ()| n + 1);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let s = seen.clone();
//! let sub = count.subscribe_next(move |n| s.borrow_mut().push(n));
//!
//! clicks.next(());
//! clicks.next(());
//! sub.run();
//! clicks.next(());
//! assert_eq!(*seen.borrow(), vec![1, 2]);
//! ```
//!
//! Every `subscribe` returns a `Dispose`. Running it unsubscribes, and
//! nothing is delivered after that. All cancellation in Arbor works this
//! way. There are no tokens and no timeouts.
//!
//! ## Time
//!
//! Time is virtual (`scheduler`). Timers fire when a driver or a test
//! advances the clock. Work triggered inside a tick goes through a FIFO
//! trampoline, which keeps re-entrant writes in order.
//!
//! ## Views
//!
//! ```rust
//! use arbor_core::*;
//!
//! let card = VNode::new("section")
//!     .child(VNode::new("header").slot_named("title"))
//!     .child(VNode::new("main").with_slot(Slot::Default));
//! assert_eq!(card.children.len(), 2);
//! ```
//!
//! Nodes tagged with a `Slot` are holes. The composition layer
//! (`arbor-compose`) fills them with the views of child components.

pub mod effects;
pub mod error;
pub mod operators;
pub mod ports;
pub mod scheduler;
pub mod settings;
pub mod stream;
pub mod subject;
pub mod tests;
pub mod vnode;

pub use effects::*;
pub use error::*;
pub use ports::*;
pub use scheduler::Tick;
pub use settings::*;
pub use stream::*;
pub use subject::*;
pub use vnode::*;
