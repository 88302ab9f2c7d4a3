//! # The `m` operator
//!
//! `m(def, settings, tree)` turns a definition and a tree of components into
//! one new component. Calling the result runs, in order:
//!
//! 1. the `preprocess_input` hook, if settings carry hooks;
//! 2. settings merge: call-time settings under the composition-time ones;
//! 3. local settings (as defaults) and local sources;
//! 4. the pre-condition check;
//! 5. the merge strategy, which usually calls the children and then the
//!    container;
//! 6. the post-condition check;
//! 7. the `postprocess_output` hook.
//!
//! With the default strategy every sink name any part produces is merged on
//! its own. The `view` sink is projected through slots (see `slot.rs`);
//! every other sink is a plain stream merge.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use arbor_core::{
    ContractError, Payload, Port, PortKind, Settings, Sinks, Sources, Stream, VIEW_SINK,
};
use serde_json::Value;

use crate::slot::merge_view_sinks;
use crate::{Component, ComponentDef, ComponentTree, MergeSinkFn, MergeStrategy};

/// Compose `tree` into a single component described by `def`.
///
/// Structural problems (bad settings, empty tree, two merge strategies) are
/// reported here, before anything is called.
pub fn m(
    def: ComponentDef,
    settings: Value,
    tree: impl Into<ComponentTree>,
) -> Result<Component, ContractError> {
    def.validate()?;
    let static_settings = Settings::from_value(settings)?;
    let (container, children) = tree.into().resolve()?;

    log::trace!(
        "m: composed `{}` ({} children, container: {})",
        def.name,
        children.len(),
        container.is_some()
    );

    let name = def.name.clone();
    let def = Rc::new(def);
    Ok(Component::new(name, move |sources, settings| {
        run(&def, &static_settings, container.as_ref(), &children, sources, settings)
    }))
}

fn run(
    def: &ComponentDef,
    static_settings: &Settings,
    container: Option<&Component>,
    children: &[Component],
    sources: &Sources,
    dynamic: &Settings,
) -> Result<Sinks, ContractError> {
    let name = def.name.as_str();
    let mut settings = Settings::merge(dynamic, static_settings);
    let hooks = settings.hooks().cloned();

    let mut sources = match &hooks {
        Some(hooks) => hooks.preprocess_input(name, sources.clone(), &settings),
        None => sources.clone(),
    };

    if let Some(local) = &def.local_settings {
        settings = Settings::merge(&local(&settings), &settings);
    }
    if let Some(local) = &def.local_sources {
        for (source_name, port) in local(&sources, &settings) {
            if sources.contains(&source_name) {
                return Err(ContractError::SourceCollision {
                    component: name.to_string(),
                    source_name,
                });
            }
            sources.insert(source_name, port);
        }
    }

    if let Some(check) = &def.pre_conditions {
        check(&sources, &settings).map_err(|reason| ContractError::PreCondition {
            component: name.to_string(),
            reason,
        })?;
    }

    let sinks = match def.resolved_strategy() {
        MergeStrategy::Compute(compute) => compute(container, children, &sources, &settings)?,
        MergeStrategy::MergeAll(merge) => {
            let (own, kids) = call_parts(container, children, &sources, &settings)?;
            merge(own.as_ref(), &kids, &settings)
        }
        MergeStrategy::PerSink(mergers) => {
            let (own, kids) = call_parts(container, children, &sources, &settings)?;
            merge_per_sink(&mergers, own.as_ref(), &kids, &settings)
        }
    };

    if let Some(check) = &def.post_conditions {
        check(&sinks).map_err(|reason| ContractError::PostCondition {
            component: name.to_string(),
            reason,
        })?;
    }

    let sinks = match &hooks {
        Some(hooks) => hooks.postprocess_output(name, sinks, &settings),
        None => sinks,
    };
    log::trace!("m: `{name}` produced sinks {:?}", sinks.names().collect::<Vec<_>>());
    Ok(sinks)
}

/// Children first, then the container.
fn call_parts(
    container: Option<&Component>,
    children: &[Component],
    sources: &Sources,
    settings: &Settings,
) -> Result<(Option<Sinks>, Vec<Sinks>), ContractError> {
    let kids = children
        .iter()
        .map(|child| call_child(child, sources, settings))
        .collect::<Result<Vec<_>, _>>()?;
    let own = container
        .map(|c| call_child(c, sources, settings))
        .transpose()?;
    Ok((own, kids))
}

fn call_child(child: &Component, sources: &Sources, settings: &Settings) -> Result<Sinks, ContractError> {
    child.call(sources, settings).map_err(|source| ContractError::ChildFailed {
        component: child.name().to_string(),
        source: Box::new(source),
    })
}

fn merge_per_sink(
    mergers: &BTreeMap<String, MergeSinkFn>,
    own: Option<&Sinks>,
    kids: &[Sinks],
    settings: &Settings,
) -> Sinks {
    let names: BTreeSet<&str> = own
        .into_iter()
        .chain(kids)
        .flat_map(Sinks::names)
        .collect();

    names
        .into_iter()
        .map(|name| {
            let own_port = own.and_then(|s| s.get(name));
            let kid_ports: Vec<Option<Port>> = kids.iter().map(|k| k.get(name).cloned()).collect();
            let merged = match mergers.get(name) {
                Some(merge) => merge(own_port, &kid_ports, settings),
                None => default_merge(name, own_port, &kid_ports),
            };
            (name.to_string(), merged)
        })
        .collect()
}

/// Default merge for one sink name.
pub fn default_merge(name: &str, own: Option<&Port>, kids: &[Option<Port>]) -> Option<Port> {
    if name == VIEW_SINK {
        merge_view_sinks(own, kids)
    } else {
        merge_streams(own, kids)
    }
}

/// Merge every present port into one. The result is a Behavior only when
/// all inputs are.
pub fn merge_streams(own: Option<&Port>, kids: &[Option<Port>]) -> Option<Port> {
    let ports: Vec<&Port> = own.into_iter().chain(kids.iter().flatten()).collect();
    match ports.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        many => {
            let kind = if many.iter().all(|p| p.is_behavior()) {
                PortKind::Behavior
            } else {
                PortKind::Event
            };
            let streams = many.iter().map(|p| p.stream().clone()).collect();
            Some(Port::of_kind(kind, Stream::merge(streams)))
        }
    }
}

/// Port for a sink a combinator produces: views are behaviors, the rest
/// events.
pub(crate) fn port_for(name: &str, stream: Stream<Payload>) -> Port {
    if name == VIEW_SINK {
        Port::behavior(stream)
    } else {
        Port::event(stream)
    }
}
