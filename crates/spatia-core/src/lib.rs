#![forbid(unsafe_code)]

//! Core: geometry glue, memoization, layout frusta and transitions.
//!
//! # Role in Spatia
//! `spatia-core` holds everything the layout engine needs that does not know
//! about nodes or objectives. `spatia-layout` builds node metrics, adapters
//! and the optimizer on top of it.
//!
//! # Primary responsibilities
//! - **geometry**: `nalgebra` aliases, [`Box3`], transform compose/decompose
//!   and epsilon guards.
//! - **difference**: scale-free [`RelativeDifference`] per value type.
//! - **memo**: [`Memo`] and generation-stamped [`Cached`] values.
//! - **frustum**: [`LayoutFrustum`], an angular view volume.
//! - **transition**: [`Transitionable`], the hysteresis filter that smooths
//!   optimizer output into motion.

pub mod difference;
pub mod frustum;
pub mod geometry;
pub mod memo;
pub mod transition;

pub use difference::RelativeDifference;
pub use frustum::{FrustumCorner, LayoutFrustum};
pub use geometry::{Box3, Mat4, Point, Quat, Rect2, Vec2, Vec3};
pub use memo::{Cached, Memo, MemoStats, MemoizationCache};
pub use transition::{
    Easing, SyncGroup, Transition, TransitionConfig, TransitionControl, TransitionOptions,
    TransitionStatus, Transitionable, Transitional,
};
