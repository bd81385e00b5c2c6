#![forbid(unsafe_code)]

//! Adaptive spatial layout: node metrics, objectives and the optimizer.
//!
//! # Role in Spatia
//! `spatia-layout` places host scene nodes in 3D. Each adaptive node carries
//! one or more candidate [`SpatialLayout`]s; a seeded population optimizer
//! searches orientations and bounds that satisfy the layout's ranked
//! objectives, and the transition engine from `spatia-core` smooths the
//! winning placement into motion.
//!
//! # Primary responsibilities
//! - **binding**: [`NodeBinding`], the host scene-graph boundary.
//! - **metrics**: [`SpatialMetrics`] and [`NodeState`], raw/current/target
//!   spatial state with memoized derived quantities.
//! - **objectives**: the [`Objective`] trait and the provided objectives.
//! - **optimizer**: tolerance-banded ranking and the bat-style
//!   [`SpatialOptimizer`] with 28 self-adapting mutation strategies.
//! - **adapter**: [`SpatialAdapter`], per-node layouts and transitionables.
//! - **system**: [`SpatialSystem`], the per-frame driver.
//!
//! # Example
//! ```
//! use spatia_layout::objectives::VisualMaximizeObjective;
//! use spatia_layout::{SceneGraph, SpatialSystem};
//!
//! let mut scene = SceneGraph::new();
//! let panel = scene.add_node();
//! let mut system = SpatialSystem::new(scene);
//! system
//!     .adapter(panel)
//!     .unwrap()
//!     .create_layout()
//!     .add_objective(VisualMaximizeObjective);
//! system.update(1.0 / 60.0, 1.0 / 60.0).unwrap();
//! assert!(system.find_adapter(panel).unwrap().active_layout().is_some());
//! ```

pub mod adapter;
pub mod binding;
pub mod config;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod objectives;
pub mod optimizer;
pub mod scene;
pub mod solution;
pub mod state;
pub mod system;

pub use adapter::{ParentOverride, SpatialAdapter};
pub use binding::{NodeBinding, NodeKey, NodeTransform, NodeUpdate};
pub use config::{EpsilonConfig, OptimizeConfig, OptimizeOptions, SpatialConfig, StepDistribution};
pub use error::{LayoutError, Result};
pub use layout::{ObjectiveSlot, SpatialLayout};
pub use metrics::{Occluder, Placement, PlacementFrame, SpatialMetrics};
pub use objectives::{Accuracy, EvaluationContext, Objective, Unit};
pub use optimizer::{SpatialOptimizer, compare_solutions, rank_solutions};
pub use scene::{SceneGraph, SceneNode};
pub use solution::{LayoutSolution, MutationKind, MutationStrategy};
pub use state::{NodeState, ViewState};
pub use system::SpatialSystem;
