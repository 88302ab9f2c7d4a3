//! # Slot projection
//!
//! How a container's view and its children's views become one tree.
//!
//! Without a container view, children are used as they are: none gives the
//! empty tree, one gives that child, several are wrapped in a plain
//! [`WRAPPER_SEL`] node.
//!
//! With a container view, the container is searched breadth-first for
//! *holes*: nodes tagged with a [`Slot`]. Each child's view is routed by the
//! slot its root declares (untagged roots go to the default slot) and
//! appended to the matching hole, in child order. Default content with no
//! default hole is appended to the container's root.
//!
//! ```rust
//! use arbor_compose::project_slots;
//! use arbor_core::{Slot, VNode};
//!
//! let card = VNode::new("section")
//!     .child(VNode::new("header").slot_named("title"))
//!     .child(VNode::new("main").with_slot(Slot::Default));
//! let out = project_slots(
//!     Some(card),
//!     vec![Some(VNode::new("p")), Some(VNode::new("h1").slot_named("title"))],
//! )
//! .unwrap()
//! .unwrap();
//! assert_eq!(out.at_path(&[0, 0]).map(|n| n.sel.as_str()), Some("h1"));
//! assert_eq!(out.at_path(&[1, 0]).map(|n| n.sel.as_str()), Some("p"));
//! ```
//!
//! A hole's own text, if any, is moved into a leading text node before
//! children are appended, so that text always stays first.
//!
//! A slot name may appear once per container view, with one exception: a
//! container whose root carries slot `s` may repeat `s` exactly once below.
//! The root then only names where the container itself goes in *its*
//! parent, and the inner node is the hole.

use std::collections::{BTreeMap, VecDeque};

use arbor_core::{ContractError, Payload, Port, Slot, Stream, StreamError, VNode};
use smallvec::SmallVec;

type Path = SmallVec<[usize; 8]>;

pub fn project_slots(
    parent: Option<VNode>,
    children: Vec<Option<VNode>>,
) -> Result<Option<VNode>, ContractError> {
    let children: Vec<VNode> = children.into_iter().flatten().collect();

    let Some(mut parent) = parent else {
        return Ok(match children.len() {
            0 => None,
            1 => children.into_iter().next(),
            _ => Some(VNode::wrapper(children)),
        });
    };

    let holes = find_holes(&parent)?;
    let mut buckets = partition(children);

    // Deepest first: a text shim inserted into a hole only shifts paths
    // below it, and those have been filled already.
    for (slot, path) in holes.iter().rev() {
        let Some(content) = buckets.remove(slot) else {
            continue;
        };
        if let Some(hole) = parent.at_path_mut(path) {
            splice(hole, content);
        }
    }

    if let Some(content) = buckets.remove(&Slot::Default) {
        splice(&mut parent, content);
    }
    for (slot, content) in buckets {
        log::warn!(
            "no `{slot}` slot in `{}`, dropping {} child view(s)",
            parent.sel,
            content.len()
        );
    }

    Ok(Some(parent))
}

/// Slot holes in breadth-first order. The root is a candidate, but other
/// holes are not searched below.
fn find_holes(parent: &VNode) -> Result<Vec<(Slot, Path)>, ContractError> {
    let mut found: Vec<(Slot, Path)> = Vec::new();
    let mut queue: VecDeque<(Path, &VNode)> = VecDeque::new();
    queue.push_back((Path::new(), parent));

    while let Some((path, node)) = queue.pop_front() {
        let is_root = path.is_empty();
        if let Some(slot) = &node.slot {
            found.push((slot.clone(), path.clone()));
            if !is_root {
                continue;
            }
        }
        for (i, child) in node.children.iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(i);
            queue.push_back((child_path, child));
        }
    }

    let mut counts: BTreeMap<&Slot, usize> = BTreeMap::new();
    for (slot, _) in &found {
        *counts.entry(slot).or_default() += 1;
    }

    let mut skip_root = false;
    for (slot, count) in counts {
        if count == 1 {
            continue;
        }
        if count == 2 && parent.slot.as_ref() == Some(slot) {
            skip_root = true;
            continue;
        }
        return Err(ContractError::DuplicateSlot {
            slot: slot.to_string(),
            count,
        });
    }

    if skip_root {
        found.retain(|(_, path)| !path.is_empty());
    }
    Ok(found)
}

fn partition(children: Vec<VNode>) -> BTreeMap<Slot, Vec<VNode>> {
    let mut buckets: BTreeMap<Slot, Vec<VNode>> = BTreeMap::new();
    for child in children {
        buckets.entry(child.declared_slot()).or_default().push(child);
    }
    buckets
}

fn splice(hole: &mut VNode, content: Vec<VNode>) {
    if let Some(text) = hole.text.take() {
        hole.children.insert(0, VNode::text_node(text));
    }
    hole.children.extend(content);
}

/// Default merge of the `view` sink: combine the latest view of the
/// container and of each child, and project on every change.
pub fn merge_view_sinks(own: Option<&Port>, kids: &[Option<Port>]) -> Option<Port> {
    let has_parent = own.is_some();
    let streams: Vec<Stream<Payload>> = own
        .into_iter()
        .chain(kids.iter().flatten())
        .map(|p| p.stream().clone())
        .collect();
    if streams.is_empty() {
        return None;
    }

    let projected = Stream::combine_latest(streams).try_map(move |views| {
        let mut views = views.into_iter().map(Payload::into_view);
        let parent = if has_parent { views.next().flatten() } else { None };
        project_slots(parent, views.collect())
            .map(Payload::View)
            .map_err(StreamError::from)
    });
    Some(Port::behavior(projected))
}
