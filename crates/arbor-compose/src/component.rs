use std::fmt;
use std::rc::Rc;

use arbor_core::{ContractError, Settings, Sinks, Sources};
use serde_json::Value;

use crate::{ComponentDef, m};

type RunFn = dyn Fn(&Sources, &Settings) -> Result<Sinks, ContractError>;

/// A reactive unit: sources and settings in, sinks out.
///
/// Calling a component only wires streams together; nothing flows until the
/// returned sinks are subscribed.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    run: Rc<RunFn>,
}

impl Component {
    pub fn new(
        name: impl Into<Rc<str>>,
        run: impl Fn(&Sources, &Settings) -> Result<Sinks, ContractError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Rc::new(run),
        }
    }

    /// Component that never fails.
    pub fn leaf(name: impl Into<Rc<str>>, run: impl Fn(&Sources, &Settings) -> Sinks + 'static) -> Self {
        Self::new(name, move |sources, settings| Ok(run(sources, settings)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, sources: &Sources, settings: &Settings) -> Result<Sinks, ContractError> {
        (self.run)(sources, settings)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// What `m` composes: a list of children, optionally under a container.
///
/// The container (a "parent") has its sinks merged with the children's and
/// its view is the one the children's views are projected into.
#[derive(Clone, Debug)]
pub enum ComponentTree {
    Children(Vec<Component>),
    Container {
        container: Option<Component>,
        children: Box<ComponentTree>,
    },
}

impl ComponentTree {
    pub fn children(children: Vec<Component>) -> Self {
        ComponentTree::Children(children)
    }

    pub fn with_container(container: Component, children: Vec<Component>) -> Self {
        ComponentTree::Container {
            container: Some(container),
            children: Box::new(ComponentTree::Children(children)),
        }
    }

    /// Container plus a flat child list. A nested sub-tree is composed into
    /// a single child first.
    pub(crate) fn resolve(self) -> Result<(Option<Component>, Vec<Component>), ContractError> {
        match self {
            ComponentTree::Children(children) if children.is_empty() => Err(ContractError::EmptyTree),
            ComponentTree::Children(children) => Ok((None, children)),
            ComponentTree::Container { container, children } => match *children {
                ComponentTree::Children(children) => {
                    if container.is_none() && children.is_empty() {
                        return Err(ContractError::EmptyTree);
                    }
                    Ok((container, children))
                }
                nested => {
                    let subtree = m(ComponentDef::new("Subtree"), Value::Null, nested)?;
                    Ok((container, vec![subtree]))
                }
            },
        }
    }
}

impl From<Vec<Component>> for ComponentTree {
    fn from(children: Vec<Component>) -> Self {
        ComponentTree::Children(children)
    }
}

impl From<Component> for ComponentTree {
    fn from(child: Component) -> Self {
        ComponentTree::Children(vec![child])
    }
}
