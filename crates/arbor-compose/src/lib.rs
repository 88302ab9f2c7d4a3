//! # Composition
//!
//! A component is a function from sources and settings to sinks. This crate
//! builds bigger components out of smaller ones:
//!
//! - [`m`]: the one composition operator. It merges settings, extends
//!   sources, calls children and merges their sinks.
//! - [`project_slots`]: how a container's view and its children's views
//!   become one tree.
//! - [`for_each`], [`switch`] and [`inject_feedback`]: combinators defined
//!   on top of `m`.
//!
//! ```rust
//! use arbor_compose::*;
//! use arbor_core::*;
//! use serde_json::json;
//!
//! let greeting = Component::leaf("Greeting", |_, settings| {
//!     let who = settings.get_str("who").unwrap_or("nobody").to_string();
//!     Sinks::new().with(VIEW_SINK, Port::behavior(Stream::of(VNode::new("p").with_text(who).into())))
//! });
//! let card = Component::leaf("Card", |_, _| {
//!     Sinks::new().with(
//!         VIEW_SINK,
//!         Port::behavior(Stream::of(VNode::new("section").with_slot(Slot::Default).into())),
//!     )
//! });
//!
//! let app = m(
//!     ComponentDef::new("App"),
//!     json!({ "who": "arbor" }),
//!     ComponentTree::with_container(card, vec![greeting]),
//! )
//! .unwrap();
//!
//! let sinks = app.call(&Sources::new(), &Settings::new()).unwrap();
//! let view = std::rc::Rc::new(std::cell::RefCell::new(None));
//! let v = view.clone();
//! let _sub = sinks
//!     .stream(VIEW_SINK)
//!     .unwrap()
//!     .subscribe_next(move |p| *v.borrow_mut() = p.into_view());
//! let section = view.borrow().clone().unwrap();
//! assert_eq!(section.text_content(), "arbor");
//! ```
//!
//! Contract errors (an empty tree, clashing sources, failed conditions) are
//! returned from `m` or from the call. Problems found while data flows,
//! such as a duplicate slot in a view, arrive as an error on the affected
//! sink only.

pub mod component;
pub mod compose;
pub mod definition;
pub mod feedback;
pub mod for_each;
pub mod patch;
pub mod slot;
pub mod switch;

pub use component::*;
pub use compose::{default_merge, m, merge_streams};
pub use definition::*;
pub use feedback::*;
pub use for_each::*;
pub use patch::apply_patch;
pub use slot::{merge_view_sinks, project_slots};
pub use switch::*;
