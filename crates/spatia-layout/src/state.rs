#![forbid(unsafe_code)]

//! Per-node spatial state with memoized derived quantities.
//!
//! A [`NodeState`] is built from a handful of inputs (local transform,
//! parent world matrix, the shared [`ViewState`] and the node's layout
//! bounds). Everything else is derived on first read and cached in a
//! [`Memo`] until an input setter runs.
//!
//! # Frames
//!
//! | Frame | Origin | Axes | Units |
//! |-------|--------|------|-------|
//! | local | node origin | node axes | node units (scaled) |
//! | world | scene origin | scene axes | meters |
//! | layout | center of the layout bounds | world orientation of the node | meters |
//! | view | viewer | viewer axes, looking down -Z | meters |
//! | visual | center of the view | +x right, +y up | pixels (x, y), meters of depth (z) |
//!
//! # Invariants
//!
//! 1. Every derived getter is a pure function of the inputs: two reads with
//!    no setter in between return bit-identical values.
//! 2. Occlusion percentages are outputs of the occlusion pass and never
//!    invalidate derived quantities.
//!
//! # Failure Modes
//!
//! - Corners at or behind the viewer are clamped to [`MIN_VIEW_DEPTH`] before
//!   projection, so visual bounds stay finite but can be very large.
//! - A singular matrix inverts to identity.

use std::sync::Arc;

use spatia_core::geometry::{compose, decompose};
use spatia_core::{Box3, LayoutFrustum, Mat4, Memo, Point, Quat, Rect2, Vec2, Vec3};

use crate::binding::{NodeKey, NodeTransform};

/// Smallest depth (meters) a point is projected at.
pub const MIN_VIEW_DEPTH: f64 = 1e-4;

// ===========================================================================
// ViewState
// ===========================================================================

/// Viewer pose, field of view and output resolution.
#[derive(Debug, Clone)]
pub struct ViewState {
    pose: Mat4,
    view_from_world: Mat4,
    position: Vec3,
    orientation: Quat,
    frustum: LayoutFrustum,
    resolution: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Mat4::identity(), LayoutFrustum::default(), Vec2::new(1920.0, 1080.0))
    }
}

impl ViewState {
    /// Create a view from its world pose (view to world).
    #[must_use]
    pub fn new(pose: Mat4, frustum: LayoutFrustum, resolution: Vec2) -> Self {
        let (position, orientation, _) = decompose(&pose);
        Self {
            view_from_world: pose.try_inverse().unwrap_or_else(Mat4::identity),
            pose,
            position,
            orientation,
            frustum,
            resolution,
        }
    }

    /// View to world.
    #[must_use]
    pub fn pose(&self) -> &Mat4 {
        &self.pose
    }

    /// World to view.
    #[must_use]
    pub fn view_from_world(&self) -> &Mat4 {
        &self.view_from_world
    }

    /// Viewer position in world space.
    #[must_use]
    pub fn position(&self) -> &Vec3 {
        &self.position
    }

    /// Viewer orientation in world space.
    #[must_use]
    pub fn orientation(&self) -> &Quat {
        &self.orientation
    }

    /// Field of view.
    #[must_use]
    pub fn frustum(&self) -> &LayoutFrustum {
        &self.frustum
    }

    /// Output size in pixels.
    #[must_use]
    pub fn resolution(&self) -> &Vec2 {
        &self.resolution
    }

    /// Project a view-space point to visual space and NDC.
    ///
    /// Returns `(visual, ndc, clamped_view_point)`.
    #[must_use]
    pub fn project(&self, p: &Point) -> (Point, Point, Point) {
        let depth = (-p.z).max(MIN_VIEW_DEPTH);
        let q = Point::new(p.x, p.y, -depth);
        let ndc = self.frustum.perspective().transform_point(&q);
        let visual = Point::new(
            ndc.x * self.resolution.x * 0.5,
            ndc.y * self.resolution.y * 0.5,
            depth,
        );
        (visual, ndc, q)
    }

    /// Horizontal visual coordinate (pixels) of the direction `degrees`
    /// away from forward.
    #[must_use]
    pub fn degrees_to_pixels_x(&self, degrees: f64) -> f64 {
        let r = degrees.to_radians();
        self.project(&Point::new(r.sin(), 0.0, -r.cos())).0.x
    }

    /// Vertical visual coordinate (pixels) of the direction `degrees` above
    /// forward.
    #[must_use]
    pub fn degrees_to_pixels_y(&self, degrees: f64) -> f64 {
        let r = degrees.to_radians();
        self.project(&Point::new(0.0, r.sin(), -r.cos())).0.y
    }

    /// Average pixels per degree across the field of view.
    #[must_use]
    pub fn pixels_per_degree(&self) -> Vec2 {
        let size = self.frustum.size_degrees();
        Vec2::new(
            self.resolution.x / size.x.max(f64::EPSILON),
            self.resolution.y / size.y.max(f64::EPSILON),
        )
    }

    /// Visual rectangle of the whole viewport.
    #[must_use]
    pub fn viewport(&self) -> Rect2 {
        let half = self.resolution * 0.5;
        Rect2::new(-half, half)
    }
}

// ===========================================================================
// NodeState
// ===========================================================================

#[derive(Debug, Clone, Copy)]
struct WorldPose {
    position: Vec3,
    orientation: Quat,
    scale: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct Projection {
    visual: Box3,
    ndc: Box3,
}

#[derive(Debug, Clone, Default)]
struct Derived {
    local_matrix: Memo<Mat4>,
    world_matrix: Memo<Mat4>,
    world_matrix_inverse: Memo<Mat4>,
    world_pose: Memo<WorldPose>,
    layout_matrix: Memo<Mat4>,
    layout_from_world: Memo<Mat4>,
    view_from_layout: Memo<Mat4>,
    world_bounds: Memo<Box3>,
    layout_space_bounds: Memo<Box3>,
    view_bounds: Memo<Box3>,
    projection: Memo<Projection>,
    visual_frustum: Memo<LayoutFrustum>,
}

/// Spatial state of one node in one of the raw/current/target variants.
#[derive(Debug, Clone)]
pub struct NodeState {
    parent: Option<NodeKey>,
    local_position: Vec3,
    local_orientation: Quat,
    local_scale: Vec3,
    parent_world: Mat4,
    view: Arc<ViewState>,
    layout_bounds: Box3,
    occluding_percent: f64,
    occluded_percent: f64,
    derived: Derived,
}

impl NodeState {
    /// Create a state from its inputs.
    #[must_use]
    pub fn new(
        parent: Option<NodeKey>,
        transform: &NodeTransform,
        parent_world: Mat4,
        view: Arc<ViewState>,
        layout_bounds: Box3,
    ) -> Self {
        Self {
            parent,
            local_position: transform.position,
            local_orientation: transform.orientation,
            local_scale: transform.scale,
            parent_world,
            view,
            layout_bounds,
            occluding_percent: 0.0,
            occluded_percent: 0.0,
            derived: Derived::default(),
        }
    }

    fn invalidate(&mut self) {
        self.derived = Derived::default();
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Parent slot.
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Local position.
    #[must_use]
    pub fn local_position(&self) -> &Vec3 {
        &self.local_position
    }

    /// Local orientation.
    #[must_use]
    pub fn local_orientation(&self) -> &Quat {
        &self.local_orientation
    }

    /// Local scale.
    #[must_use]
    pub fn local_scale(&self) -> &Vec3 {
        &self.local_scale
    }

    /// Local transform as a host snapshot.
    #[must_use]
    pub fn local_transform(&self) -> NodeTransform {
        NodeTransform {
            position: self.local_position,
            orientation: self.local_orientation,
            scale: self.local_scale,
        }
    }

    /// Parent's world matrix (identity for roots).
    #[must_use]
    pub fn parent_world_matrix(&self) -> &Mat4 {
        &self.parent_world
    }

    /// Shared view.
    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Layout (inner) bounds in local space.
    #[must_use]
    pub fn layout_bounds(&self) -> &Box3 {
        &self.layout_bounds
    }

    /// Set the parent slot and the parent's world matrix.
    pub fn set_parent(&mut self, parent: Option<NodeKey>, parent_world: Mat4) {
        self.parent = parent;
        self.parent_world = parent_world;
        self.invalidate();
    }

    /// Set the local transform.
    pub fn set_local_transform(&mut self, transform: &NodeTransform) {
        self.local_position = transform.position;
        self.local_orientation = transform.orientation;
        self.local_scale = transform.scale;
        self.invalidate();
    }

    /// Set the local position.
    pub fn set_local_position(&mut self, position: Vec3) {
        self.local_position = position;
        self.invalidate();
    }

    /// Set the local orientation.
    pub fn set_local_orientation(&mut self, orientation: Quat) {
        self.local_orientation = orientation;
        self.invalidate();
    }

    /// Set the local scale.
    pub fn set_local_scale(&mut self, scale: Vec3) {
        self.local_scale = scale;
        self.invalidate();
    }

    /// Set the layout bounds.
    pub fn set_layout_bounds(&mut self, bounds: Box3) {
        self.layout_bounds = bounds;
        self.invalidate();
    }

    /// Replace the view.
    pub fn set_view(&mut self, view: Arc<ViewState>) {
        self.view = view;
        self.invalidate();
    }

    // -----------------------------------------------------------------------
    // Occlusion
    // -----------------------------------------------------------------------

    /// Percent of other nodes' visual area this node covers.
    #[must_use]
    pub fn occluding_percent(&self) -> f64 {
        self.occluding_percent
    }

    /// Percent of this node's visual area covered by nearer nodes.
    #[must_use]
    pub fn occluded_percent(&self) -> f64 {
        self.occluded_percent
    }

    /// Store the results of an occlusion pass.
    pub fn set_occlusion(&mut self, occluding: f64, occluded: f64) {
        self.occluding_percent = occluding;
        self.occluded_percent = occluded;
    }

    // -----------------------------------------------------------------------
    // Matrices
    // -----------------------------------------------------------------------

    /// Local to parent.
    #[must_use]
    pub fn local_matrix(&self) -> &Mat4 {
        self.derived.local_matrix.get_or_init(|| {
            compose(
                &self.local_position,
                &self.local_orientation,
                &self.local_scale,
            )
        })
    }

    /// Local to world.
    #[must_use]
    pub fn world_matrix(&self) -> &Mat4 {
        self.derived
            .world_matrix
            .get_or_init(|| self.parent_world * self.local_matrix())
    }

    /// World to local.
    #[must_use]
    pub fn world_matrix_inverse(&self) -> &Mat4 {
        self.derived.world_matrix_inverse.get_or_init(|| {
            self.world_matrix()
                .try_inverse()
                .unwrap_or_else(Mat4::identity)
        })
    }

    fn world_pose(&self) -> &WorldPose {
        self.derived.world_pose.get_or_init(|| {
            let (position, orientation, scale) = decompose(self.world_matrix());
            WorldPose {
                position,
                orientation,
                scale,
            }
        })
    }

    /// World position of the node origin.
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_pose().position
    }

    /// World orientation.
    #[must_use]
    pub fn world_orientation(&self) -> Quat {
        self.world_pose().orientation
    }

    /// World scale.
    #[must_use]
    pub fn world_scale(&self) -> Vec3 {
        self.world_pose().scale
    }

    /// Layout to world: rigid frame at the layout-bounds center.
    #[must_use]
    pub fn layout_matrix(&self) -> &Mat4 {
        self.derived.layout_matrix.get_or_init(|| {
            let center = self
                .world_matrix()
                .transform_point(&self.layout_bounds.center());
            compose(&center.coords, &self.world_orientation(), &Vec3::repeat(1.0))
        })
    }

    /// World to layout.
    #[must_use]
    pub fn layout_from_world(&self) -> &Mat4 {
        self.derived.layout_from_world.get_or_init(|| {
            self.layout_matrix()
                .try_inverse()
                .unwrap_or_else(Mat4::identity)
        })
    }

    /// World to view.
    #[must_use]
    pub fn view_from_world(&self) -> &Mat4 {
        self.view.view_from_world()
    }

    /// Layout to view.
    #[must_use]
    pub fn view_from_layout(&self) -> &Mat4 {
        self.derived
            .view_from_layout
            .get_or_init(|| self.view.view_from_world() * self.layout_matrix())
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Layout bounds in local space (alias of [`layout_bounds`](Self::layout_bounds)).
    #[must_use]
    pub fn local_bounds(&self) -> &Box3 {
        &self.layout_bounds
    }

    // Empty bounds project as a point at the local origin.
    fn projectable_bounds(&self) -> Box3 {
        if self.layout_bounds.is_empty() {
            Box3::new(Point::origin(), Point::origin())
        } else {
            self.layout_bounds
        }
    }

    /// Axis-aligned world bounds of the layout box.
    #[must_use]
    pub fn world_bounds(&self) -> &Box3 {
        self.derived
            .world_bounds
            .get_or_init(|| self.layout_bounds.transformed(self.world_matrix()))
    }

    /// Layout box expressed in its own layout frame (centered, meters).
    #[must_use]
    pub fn layout_space_bounds(&self) -> &Box3 {
        self.derived.layout_space_bounds.get_or_init(|| {
            let m = self.layout_from_world() * self.world_matrix();
            self.layout_bounds.transformed(&m)
        })
    }

    /// Axis-aligned view-space bounds.
    #[must_use]
    pub fn view_bounds(&self) -> &Box3 {
        self.derived.view_bounds.get_or_init(|| {
            let m = self.view.view_from_world() * self.world_matrix();
            self.projectable_bounds().transformed(&m)
        })
    }

    fn projection(&self) -> &Projection {
        self.derived.projection.get_or_init(|| {
            let m = self.view.view_from_world() * self.world_matrix();
            let mut visual = Box3::empty();
            let mut ndc = Box3::empty();
            for corner in &self.projectable_bounds().corners() {
                let (v, n, _) = self.view.project(&m.transform_point(corner));
                visual.expand_by_point(&v);
                ndc.expand_by_point(&n);
            }
            Projection { visual, ndc }
        })
    }

    /// Visual bounds: pixels on x/y, depth in meters on z.
    #[must_use]
    pub fn visual_bounds(&self) -> &Box3 {
        &self.projection().visual
    }

    /// Normalized device coordinate bounds.
    #[must_use]
    pub fn ndc_bounds(&self) -> &Box3 {
        &self.projection().ndc
    }

    /// Planar footprint of the visual bounds.
    #[must_use]
    pub fn visual_rect(&self) -> Rect2 {
        Rect2::from_box_xy(self.visual_bounds())
    }

    /// Angular extent of the layout box as seen by the viewer.
    #[must_use]
    pub fn visual_frustum(&self) -> &LayoutFrustum {
        self.derived.visual_frustum.get_or_init(|| {
            let m = self.view.view_from_world() * self.world_matrix();
            let corners = self
                .projectable_bounds()
                .corners()
                .map(|c| self.view.project(&m.transform_point(&c)).2);
            LayoutFrustum::from_view_points(&corners).unwrap_or_default()
        })
    }

    /// Direction of the layout center from the viewer, in degrees
    /// (horizontal, vertical).
    #[must_use]
    pub fn view_direction_degrees(&self) -> Vec2 {
        let c = self
            .view_from_layout()
            .transform_point(&Point::origin());
        let depth = -c.z;
        Vec2::new(
            c.x.atan2(depth).to_degrees(),
            c.y.atan2(depth).to_degrees(),
        )
    }

    /// Distance from the viewer to the layout center (meters).
    #[must_use]
    pub fn view_distance(&self) -> f64 {
        self.view_from_layout()
            .transform_point(&Point::origin())
            .coords
            .norm()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::f64::consts::FRAC_PI_2;

    fn view() -> Arc<ViewState> {
        Arc::new(ViewState::new(
            Mat4::identity(),
            LayoutFrustum::from_fov(90.0, 90.0, 0.1, 100.0),
            Vec2::new(1000.0, 1000.0),
        ))
    }

    fn cube_at(z: f64) -> NodeState {
        NodeState::new(
            None,
            &NodeTransform::default().with_position(Vec3::new(0.0, 0.0, z)),
            Mat4::identity(),
            view(),
            Box3::from_center_size(Point::origin(), Vec3::repeat(1.0)),
        )
    }

    #[test]
    fn world_matrix_composes_parent() {
        let parent = compose(
            &Vec3::new(10.0, 0.0, 0.0),
            &Quat::identity(),
            &Vec3::new(1.0, 2.0, 2.0),
        );
        let s = NodeState::new(
            None,
            &NodeTransform::default().with_position(Vec3::new(1.0, 1.0, 0.0)),
            parent,
            view(),
            Box3::unit(),
        );
        assert!((s.world_position() - Vec3::new(11.0, 2.0, 0.0)).norm() < 1e-12);
        assert!((s.world_scale() - Vec3::new(1.0, 2.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn layout_frame_is_rigid_and_centered() {
        let rot = Quat::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        let s = NodeState::new(
            None,
            &NodeTransform::default()
                .with_orientation(rot)
                .with_scale(Vec3::new(2.0, 3.0, 4.0)),
            Mat4::identity(),
            view(),
            Box3::from_center_size(Point::new(1.0, 0.0, 0.0), Vec3::repeat(1.0)),
        );
        let origin = s.layout_matrix().transform_point(&Point::origin());
        // Local (1,0,0) scaled by 2 then rotated 90 deg about Y lands on -Z.
        assert!((origin.coords - Vec3::new(0.0, 0.0, -2.0)).norm() < 1e-9);
        let size = s.layout_space_bounds().size();
        assert!((size - Vec3::new(2.0, 3.0, 4.0)).norm() < 1e-9);
    }

    #[test]
    fn visual_bounds_are_symmetric_for_centered_box() {
        let s = cube_at(-5.0);
        let vb = *s.visual_bounds();
        assert!((vb.min.x + vb.max.x).abs() < 1e-9);
        assert!((vb.min.y + vb.max.y).abs() < 1e-9);
        assert!((vb.min.z - 4.5).abs() < 1e-9);
        assert!((vb.max.z - 5.5).abs() < 1e-9);
        // Front face half-width 0.5 at depth 4.5 with a 90 deg fov.
        let expected = 0.5 / 4.5 * 500.0;
        assert!((vb.max.x - expected).abs() < 1e-6);
    }

    #[test]
    fn points_behind_viewer_stay_finite() {
        let s = cube_at(5.0);
        assert!(s.visual_bounds().is_finite());
        assert!(s.ndc_bounds().is_finite());
    }

    #[test]
    fn reads_are_idempotent_and_setters_invalidate() {
        let mut s = cube_at(-3.0);
        let a = *s.visual_bounds();
        let b = *s.visual_bounds();
        assert_eq!(a, b);
        assert_eq!(s.world_matrix(), s.world_matrix());
        s.set_local_position(Vec3::new(1.0, 0.0, -3.0));
        assert_ne!(*s.visual_bounds(), a);
    }

    #[test]
    fn occlusion_does_not_invalidate() {
        let mut s = cube_at(-3.0);
        let before = *s.world_bounds();
        s.set_occlusion(10.0, 20.0);
        assert_eq!(*s.world_bounds(), before);
        assert_eq!(s.occluded_percent(), 20.0);
    }

    #[test]
    fn view_direction_of_centered_node_is_forward() {
        let s = cube_at(-2.0);
        assert!(s.view_direction_degrees().norm() < 1e-9);
        assert!((s.view_distance() - 2.0).abs() < 1e-12);
        let f = s.visual_frustum();
        assert!((f.center_degrees()).norm() < 1e-9);
    }

    #[test]
    fn degrees_map_to_pixels() {
        let v = view();
        assert!((v.degrees_to_pixels_x(45.0) - 500.0).abs() < 1e-6);
        assert!((v.degrees_to_pixels_y(-45.0) + 500.0).abs() < 1e-6);
    }
}
