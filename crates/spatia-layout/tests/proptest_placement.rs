//! Placement frames invert `Placement::of` under rigid, uniformly scaled
//! parents.

use std::sync::Arc;

use proptest::prelude::*;
use spatia_core::geometry::compose;
use spatia_core::{Box3, Point, Quat, Vec3};
use spatia_layout::{Placement, PlacementFrame, ViewState};

fn vec3(range: std::ops::Range<f64>) -> impl Strategy<Value = Vec3> {
    (range.clone(), range.clone(), range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn quat() -> impl Strategy<Value = Quat> {
    (-3.0..3.0_f64, -1.5..1.5_f64, -3.0..3.0_f64)
        .prop_map(|(r, p, y)| Quat::from_euler_angles(r, p, y))
}

proptest! {
    #[test]
    fn placement_round_trips(
        center in vec3(-20.0..20.0),
        size in vec3(0.1..10.0),
        orientation in quat(),
        parent_position in vec3(-5.0..5.0),
        parent_orientation in quat(),
        parent_scale in 0.2..4.0_f64,
        inner_center in vec3(-1.0..1.0),
        inner_size in vec3(0.2..3.0),
    ) {
        let parent_world = compose(&parent_position, &parent_orientation, &Vec3::repeat(parent_scale));
        let inner = Box3::from_center_size(Point::from(inner_center), inner_size);
        let frame = PlacementFrame::new(None, parent_world, inner, Arc::new(ViewState::default()), 1e-10);
        let placement = Placement {
            orientation,
            bounds: Box3::from_center_size(Point::from(center), size),
        };

        let back = Placement::of(&frame.state_for(&placement));
        prop_assert!(back.orientation.angle_to(&orientation) < 1e-6);
        prop_assert!((back.bounds.center() - placement.bounds.center()).norm() < 1e-6);
        prop_assert!((back.bounds.size() - size).norm() < 1e-6 * size.norm());
    }

    #[test]
    fn local_transforms_stay_finite_for_degenerate_inner_bounds(
        flat_axis in 0usize..3,
        size in vec3(0.0..5.0),
    ) {
        let mut extent = Vec3::repeat(1.0);
        extent[flat_axis] = 0.0;
        let inner = Box3::from_center_size(Point::origin(), extent);
        let frame = PlacementFrame::new(None, spatia_core::Mat4::identity(), inner, Arc::new(ViewState::default()), 1e-10);
        let t = frame.local_transform(&Placement {
            orientation: Quat::identity(),
            bounds: Box3::from_center_size(Point::origin(), size),
        });
        prop_assert!(t.scale.iter().chain(t.position.iter()).all(|v| v.is_finite()));
    }
}
