//! Component definitions: what `m` needs to know besides the tree.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use arbor_core::{ContractError, Port, Settings, Sinks, Sources};

use crate::Component;

pub type LocalSourcesFn = Rc<dyn Fn(&Sources, &Settings) -> Sources>;
pub type LocalSettingsFn = Rc<dyn Fn(&Settings) -> Settings>;
pub type PreConditionFn = Rc<dyn Fn(&Sources, &Settings) -> Result<(), String>>;
pub type PostConditionFn = Rc<dyn Fn(&Sinks) -> Result<(), String>>;

/// Full control: receives the container and the children uncalled.
pub type ComputeFn =
    Rc<dyn Fn(Option<&Component>, &[Component], &Sources, &Settings) -> Result<Sinks, ContractError>>;
/// Receives the container's sinks and every child's sinks.
pub type MergeAllFn = Rc<dyn Fn(Option<&Sinks>, &[Sinks], &Settings) -> Sinks>;
/// Merges one sink name: the container's port and each child's port.
pub type MergeSinkFn = Rc<dyn Fn(Option<&Port>, &[Option<Port>], &Settings) -> Option<Port>>;

/// How a composite turns its parts into sinks.
#[derive(Clone)]
pub enum MergeStrategy {
    Compute(ComputeFn),
    MergeAll(MergeAllFn),
    /// Sink names without an entry use the default merge.
    PerSink(BTreeMap<String, MergeSinkFn>),
}

impl MergeStrategy {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MergeStrategy::Compute(_) => "compute_sinks",
            MergeStrategy::MergeAll(_) => "merge_all",
            MergeStrategy::PerSink(_) => "merge_sink",
        }
    }
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::PerSink(BTreeMap::new())
    }
}

impl fmt::Debug for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::PerSink(map) => f
                .debug_tuple("PerSink")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// Builder for the first argument of [`m`](crate::m).
///
/// ```rust
/// use arbor_compose::ComponentDef;
///
/// let def = ComponentDef::new("Card")
///     .make_local_settings(|_| arbor_core::Settings::new().with("elevation", serde_json::json!(1)))
///     .check_pre_conditions(|sources, _| {
///         if sources.contains("user") { Ok(()) } else { Err("no user source".into()) }
///     });
/// assert_eq!(def.name(), "Card");
/// ```
#[derive(Clone)]
pub struct ComponentDef {
    pub(crate) name: String,
    pub(crate) local_sources: Option<LocalSourcesFn>,
    pub(crate) local_settings: Option<LocalSettingsFn>,
    pub(crate) pre_conditions: Option<PreConditionFn>,
    pub(crate) post_conditions: Option<PostConditionFn>,
    strategy: Option<MergeStrategy>,
    conflict: Option<(&'static str, &'static str)>,
}

impl ComponentDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_sources: None,
            local_settings: None,
            pre_conditions: None,
            post_conditions: None,
            strategy: None,
            conflict: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra sources visible to the container and children. A name that
    /// already exists in the incoming sources is a contract error.
    pub fn make_local_sources(mut self, f: impl Fn(&Sources, &Settings) -> Sources + 'static) -> Self {
        self.local_sources = Some(Rc::new(f));
        self
    }

    /// Defaults for this level. Anything already in the merged settings wins.
    pub fn make_local_settings(mut self, f: impl Fn(&Settings) -> Settings + 'static) -> Self {
        self.local_settings = Some(Rc::new(f));
        self
    }

    pub fn check_pre_conditions(
        mut self,
        f: impl Fn(&Sources, &Settings) -> Result<(), String> + 'static,
    ) -> Self {
        self.pre_conditions = Some(Rc::new(f));
        self
    }

    pub fn check_post_conditions(mut self, f: impl Fn(&Sinks) -> Result<(), String> + 'static) -> Self {
        self.post_conditions = Some(Rc::new(f));
        self
    }

    pub fn compute_sinks(
        self,
        f: impl Fn(Option<&Component>, &[Component], &Sources, &Settings) -> Result<Sinks, ContractError>
        + 'static,
    ) -> Self {
        self.strategy(MergeStrategy::Compute(Rc::new(f)))
    }

    pub fn merge_all(self, f: impl Fn(Option<&Sinks>, &[Sinks], &Settings) -> Sinks + 'static) -> Self {
        self.strategy(MergeStrategy::MergeAll(Rc::new(f)))
    }

    /// Custom merge for one sink name. May be called once per name.
    pub fn merge_sink(
        self,
        name: impl Into<String>,
        f: impl Fn(Option<&Port>, &[Option<Port>], &Settings) -> Option<Port> + 'static,
    ) -> Self {
        let mut map: BTreeMap<String, MergeSinkFn> = BTreeMap::new();
        map.insert(name.into(), Rc::new(f));
        self.strategy(MergeStrategy::PerSink(map))
    }

    /// Set the strategy. A second strategy of another kind (or a second
    /// `compute_sinks`/`merge_all`) is reported by `m`.
    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        let merged = match (self.strategy.take(), strategy) {
            (None, strategy) => strategy,
            (Some(MergeStrategy::PerSink(mut existing)), MergeStrategy::PerSink(more)) => {
                existing.extend(more);
                MergeStrategy::PerSink(existing)
            }
            (Some(existing), strategy) => {
                if self.conflict.is_none() {
                    self.conflict = Some((existing.kind_name(), strategy.kind_name()));
                }
                existing
            }
        };
        self.strategy = Some(merged);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ContractError> {
        match self.conflict {
            Some((first, second)) => Err(ContractError::ConflictingMergeStrategies {
                component: self.name.clone(),
                first,
                second,
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn resolved_strategy(&self) -> MergeStrategy {
        self.strategy.clone().unwrap_or_default()
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
