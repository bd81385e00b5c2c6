#![forbid(unsafe_code)]

//! Spatia public facade crate.
//!
//! This crate provides the stable surface area for hosts. It re-exports the
//! common types of `spatia-core` and `spatia-layout` and offers a prelude for
//! day-to-day usage.
//!
//! ```
//! use spatia::prelude::*;
//!
//! let mut scene = SceneGraph::new();
//! let panel = scene.add_node();
//! scene.set_position(panel, Vec3::new(0.0, 0.0, -2.0));
//!
//! let mut system = SpatialSystem::new(scene);
//! let layout = system.adapter(panel)?.create_layout();
//! layout.add_objective(MagnetizeObjective::new(2.0));
//! layout.add_objective(VisualMaximizeObjective);
//! system.update(1.0 / 60.0, 1.0 / 60.0)?;
//! # Ok::<(), spatia::LayoutError>(())
//! ```

// --- Core re-exports -------------------------------------------------------

pub use spatia_core::{
    Box3, Easing, LayoutFrustum, Mat4, MemoStats, Point, Quat, Rect2, RelativeDifference,
    SyncGroup, TransitionConfig, TransitionOptions, TransitionStatus, Transitionable, Vec2, Vec3,
};

// --- Layout re-exports -----------------------------------------------------

pub use spatia_layout::objectives::{
    AspectMode, AspectObjective, BoundsSpec, MagnetizeObjective, Measure, NumberSpec,
    OcclusionObjective, OrientationFrame, OrientationObjective, QuaternionSpec,
    SpatialBoundsObjective, Vec3Spec, ViewOverlapObjective, VisualBoundsObjective,
    VisualMaximizeObjective,
};
pub use spatia_layout::{
    Accuracy, EpsilonConfig, EvaluationContext, LayoutError, LayoutSolution, NodeBinding,
    NodeKey, NodeState, NodeTransform, NodeUpdate, Objective, OptimizeConfig, OptimizeOptions,
    ParentOverride, Placement, Result, SceneGraph, SceneNode, SpatialAdapter, SpatialConfig,
    SpatialLayout, SpatialMetrics, SpatialSystem, StepDistribution, Unit, ViewState,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AspectObjective, Box3, LayoutError, LayoutFrustum, MagnetizeObjective, NodeBinding,
        NodeTransform, Objective, OcclusionObjective, Point, Quat, SceneGraph, SpatialConfig,
        SpatialLayout, SpatialSystem, TransitionConfig, Vec2, Vec3, VisualMaximizeObjective,
    };

    pub use crate::{core, layout};
}

pub use spatia_core as core;
pub use spatia_layout as layout;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_drives_a_frame() {
        let mut scene = SceneGraph::new();
        let node = scene.add_node();
        let mut system = SpatialSystem::new(scene);
        system
            .adapter(node)
            .unwrap()
            .create_layout()
            .add_objective(AspectObjective::default());
        system.update(0.1, 0.1).unwrap();
        assert_eq!(system.frame(), 1);
        assert!(layout::SpatialAdapter::is_synced(
            system.find_adapter(node).unwrap()
        ));
    }
}
