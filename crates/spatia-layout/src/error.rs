use thiserror::Error;

use crate::binding::NodeKey;
use crate::objectives::Unit;

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Usage and configuration errors.
///
/// Degenerate geometry never surfaces here: it is recovered locally by
/// epsilon guards, and unfit optimizer candidates are ranked last.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unknown node: {node}")]
    UnknownNode { node: String },

    #[error("unknown node key: {key:?}")]
    UnknownKey { key: NodeKey },

    #[error("{node} has no layout {index}")]
    UnknownLayout { node: String, index: usize },

    #[error("{node} cannot be parented under its own descendant {parent}")]
    CyclicParent { node: String, parent: String },

    #[error("{objective}: unit {unit:?} is not valid for {field}")]
    InvalidUnit {
        objective: &'static str,
        field: &'static str,
        unit: Unit,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config-files")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "config-files")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LayoutError {
    #[must_use]
    pub fn unknown_node(node: impl std::fmt::Debug) -> Self {
        Self::UnknownNode {
            node: format!("{node:?}"),
        }
    }

    #[must_use]
    pub fn unknown_layout(node: impl std::fmt::Debug, index: usize) -> Self {
        Self::UnknownLayout {
            node: format!("{node:?}"),
            index,
        }
    }

    #[must_use]
    pub fn cyclic(node: impl std::fmt::Debug, parent: impl std::fmt::Debug) -> Self {
        Self::CyclicParent {
            node: format!("{node:?}"),
            parent: format!("{parent:?}"),
        }
    }
}
