use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Selector of the synthetic node that wraps several parentless children.
pub const WRAPPER_SEL: &str = "div";

/// Insertion point tag. On a node inside a parent's view it marks a hole;
/// on the root of a child's view it names the hole the child targets.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    Default,
    Named(String),
}

impl Slot {
    pub fn named(name: impl Into<String>) -> Self {
        Slot::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Slot::Default => None,
            Slot::Named(n) => Some(n),
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Default => f.write_str("<default>"),
            Slot::Named(n) => f.write_str(n),
        }
    }
}

/// Abstract ordered tree produced on the view sink. Not tied to any
/// rendering technology; a bridge turns it into real nodes.
///
/// A node with an empty `sel` and some `text` is a text node.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct VNode {
    pub sel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VNode>,
}

impl VNode {
    pub fn new(sel: impl Into<String>) -> Self {
        VNode {
            sel: sel.into(),
            ..Default::default()
        }
    }

    pub fn text_node(text: impl Into<String>) -> Self {
        VNode {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn wrapper(children: Vec<VNode>) -> Self {
        VNode::new(WRAPPER_SEL).with_children(children)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn slot_named(self, name: impl Into<String>) -> Self {
        self.with_slot(Slot::named(name))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn with_children(mut self, kids: Vec<VNode>) -> Self {
        self.children = kids;
        self
    }

    pub fn child(mut self, kid: VNode) -> Self {
        self.children.push(kid);
        self
    }

    pub fn is_text_node(&self) -> bool {
        self.sel.is_empty() && self.text.is_some()
    }

    /// Slot this node targets when it is a child's root; untagged means default.
    pub fn declared_slot(&self) -> Slot {
        self.slot.clone().unwrap_or(Slot::Default)
    }

    /// Node at `path` (child indices from this node).
    pub fn at_path(&self, path: &[usize]) -> Option<&VNode> {
        path.iter().try_fold(self, |node, &i| node.children.get(i))
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut VNode> {
        path.iter()
            .try_fold(self, |node, &i| node.children.get_mut(i))
    }

    /// Concatenated text of this node and its descendants, depth first.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(t) = &self.text {
            out.push_str(t);
        }
        for c in &self.children {
            c.collect_text(out);
        }
    }
}
