//! Rendering: ground grid, foot pop gizmos and visual sync.

use bevy::math::Isometry3d;
use bevy::prelude::*;
use rapier3d::prelude::Isometry;

use crate::scene::{RayWheel, RigLink, VisualOffset};
use crate::web_bevy::BikeState;

/// Draw ground grid using gizmos.
pub fn draw_ground_grid(mut gizmos: Gizmos) {
    let grid_color = Color::srgb(0.15, 0.15, 0.18);
    let grid_size = 20.0;
    let grid_step = 1.0;

    let steps = (grid_size / grid_step) as i32;
    for i in -steps..=steps {
        let pos = i as f32 * grid_step;
        gizmos.line(Vec3::new(-grid_size, 0.0, pos), Vec3::new(grid_size, 0.0, pos), grid_color);
        gizmos.line(Vec3::new(pos, 0.0, -grid_size), Vec3::new(pos, 0.0, grid_size), grid_color);
    }

    let axis_color = Color::srgb(0.3, 0.3, 0.35);
    gizmos.line(Vec3::new(-grid_size, 0.0, 0.0), Vec3::new(grid_size, 0.0, 0.0), axis_color);
    gizmos.line(Vec3::new(0.0, 0.0, -grid_size), Vec3::new(0.0, 0.0, grid_size), axis_color);
}

/// Physics pose as a Bevy transform.
pub fn to_transform(pose: &Isometry<f32>) -> Transform {
    let t = pose.translation;
    let r = pose.rotation;
    Transform {
        translation: Vec3::new(t.x, t.y, t.z),
        rotation: Quat::from_xyzw(r.i, r.j, r.k, r.w),
        scale: Vec3::ONE,
    }
}

/// Ring the foot pop markers so they stay visible inside the target spheres.
pub fn draw_foot_pops(state: Res<BikeState>, mut gizmos: Gizmos) {
    let (right, left) = state.world.foot_pops();
    let pops = [
        (right, Color::srgb(0.4, 1.0, 0.5)),
        (left, Color::srgb(0.4, 0.6, 1.0)),
    ];
    for (pop, color) in pops {
        if let Some(p) = pop {
            let at = Isometry3d::from_translation(Vec3::new(p.x, p.y, p.z));
            gizmos.sphere(at, 0.06, color);
        }
    }
}

/// Sync visual meshes to physics body poses.
pub fn sync_visuals(
    state: Res<BikeState>,
    mut links: Query<(&mut Transform, &RigLink, &VisualOffset), Without<RayWheel>>,
    mut wheels: Query<(&mut Transform, &RayWheel, &VisualOffset), Without<RigLink>>,
) {
    for (mut transform, link, offset) in links.iter_mut() {
        if let Some(pose) = state.world.physics.body_pose(link.handle) {
            *transform = to_transform(&pose) * offset.offset;
        }
    }

    let wheel_poses = state.world.ray_wheel_poses();
    for (mut transform, wheel, offset) in wheels.iter_mut() {
        if let Some(pose) = wheel_poses.get(wheel.index) {
            *transform = to_transform(pose) * offset.offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::na;

    #[test]
    fn test_pose_conversion_keeps_rotation() {
        let pose = Isometry::from_parts(
            na::Translation3::new(1.0, 2.0, 3.0),
            na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), 0.5),
        );
        let transform = to_transform(&pose);
        assert_eq!(transform.translation, Vec3::new(1.0, 2.0, 3.0));

        let expected = Quat::from_rotation_y(0.5);
        assert!(transform.rotation.angle_between(expected) < 1e-5);
    }
}
