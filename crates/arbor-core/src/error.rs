//! Error taxonomy.
//!
//! [`ContractError`] is a programmer error found while composing or calling a
//! component. It is returned right away and is never recovered from.
//! [`StreamError`] travels as an error notification on the one stream it
//! affects; sibling streams keep running.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("component tree must contain at least one component")]
    EmptyTree,

    #[error("settings must be null or an object, got {found}")]
    InvalidSettings { found: String },

    #[error("component `{component}` declares more than one merge strategy ({first} and {second})")]
    ConflictingMergeStrategies {
        component: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("`{combinator}` needs at least one child component")]
    NoChildren { combinator: &'static str },

    #[error("`{combinator}` needs a non-empty list of sink names")]
    MissingSinkNames { combinator: &'static str },

    #[error("component `{component}` requires source `{source_name}`")]
    MissingSource {
        component: String,
        source_name: String,
    },

    #[error("component `{component}` injects source `{source_name}` which already exists")]
    SourceCollision {
        component: String,
        source_name: String,
    },

    #[error("pre-condition of `{component}` failed: {reason}")]
    PreCondition { component: String, reason: String },

    #[error("post-condition of `{component}` failed: {reason}")]
    PostCondition { component: String, reason: String },

    #[error("slot `{slot}` appears {count} times in one parent view")]
    DuplicateSlot { slot: String, count: usize },

    #[error("invalid feedback configuration: {reason}")]
    InvalidFeedback { reason: String },

    #[error("child `{component}` failed: {source}")]
    ChildFailed {
        component: String,
        #[source]
        source: Box<ContractError>,
    },
}

impl ContractError {
    /// Innermost error below any `ChildFailed` wrappers.
    pub fn root_cause(&self) -> &ContractError {
        let mut err = self;
        while let ContractError::ChildFailed { source, .. } = err {
            err = source;
        }
        err
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("{0}")]
    Process(String),
}

impl StreamError {
    pub fn process(msg: impl Into<String>) -> Self {
        StreamError::Process(msg.into())
    }
}

/// Failure while applying a JSON patch to a state value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("patch must be an array of operations")]
    NotAnArray,
    #[error("malformed patch operation at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("path `{path}` does not exist")]
    MissingPath { path: String },
    #[error("test failed at `{path}`")]
    TestFailed { path: String },
}
