//! Scene setup: camera, light and bike meshes.

use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::prelude::*;
use rapier3d::prelude::RigidBodyHandle;

use bike_physics::{BikeGeometry, BikeLink};

use crate::camera::{CameraOrbit, MainCamera};
use crate::web_bevy::BikeState;

/// Mesh that tracks a rig body.
#[derive(Component)]
pub struct RigLink {
    pub link: BikeLink,
    pub handle: RigidBodyHandle,
}

/// Mesh that tracks a ray-cast wheel by index.
#[derive(Component)]
pub struct RayWheel {
    pub index: usize,
}

/// Mesh transform relative to the body it tracks.
#[derive(Component)]
pub struct VisualOffset {
    pub offset: Transform,
}

/// Everything spawned for the current rig, despawned on rebuild.
#[derive(Component)]
pub struct BikeVisual;

/// Setup the scene: camera and lights. Bike meshes follow in spawn_bike_visuals.
pub fn setup_scene(mut commands: Commands) {
    // Tonemapping and MSAA off for WebGL2
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(2.0, 2.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
        Tonemapping::None,
        bevy::render::view::Msaa::Off,
        MainCamera,
    ));
    commands.init_resource::<CameraOrbit>();

    // Ambient light only, materials are unlit
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 2000.0,
    });

    // Ground grid is drawn via gizmos in draw_ground_grid system
}

fn unlit(materials: &mut Assets<StandardMaterial>, color: Color) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: color,
        unlit: true,
        ..Default::default()
    })
}

/// Wheels are drawn as tori spun onto the Z axle.
fn wheel_mesh(meshes: &mut Assets<Mesh>) -> (Handle<Mesh>, Transform) {
    let r = BikeGeometry::WHEEL_RADIUS;
    let mesh = meshes.add(Torus::new(r - 0.04, r));
    let offset = Transform::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
    (mesh, offset)
}

fn link_mesh(link: BikeLink, meshes: &mut Assets<Mesh>) -> (Handle<Mesh>, Transform) {
    let [hx, hy, hz] = BikeGeometry::FRAME_HALF_EXTENTS;
    match link {
        BikeLink::Frame => (meshes.add(Cuboid::new(hx * 2.0, hy * 2.0, hz * 2.0)), Transform::IDENTITY),
        BikeLink::RearWheel | BikeLink::FrontWheel => wheel_mesh(meshes),
        BikeLink::Fork => (meshes.add(Cuboid::new(0.06, 0.3, 0.06)), Transform::IDENTITY),
        BikeLink::Crank => (
            meshes.add(Cuboid::new(0.03, BikeGeometry::CRANK_ARM * 2.0, 0.03)),
            Transform::IDENTITY,
        ),
        BikeLink::Handlebars => (meshes.add(Cuboid::new(0.05, 0.04, 0.5)), Transform::IDENTITY),
        BikeLink::RightFootTarget | BikeLink::LeftFootTarget => {
            (meshes.add(Sphere::new(0.04)), Transform::IDENTITY)
        }
    }
}

fn link_color(link: BikeLink) -> Color {
    match link {
        BikeLink::Frame => Color::srgb(0.85, 0.25, 0.2),
        BikeLink::RearWheel | BikeLink::FrontWheel => Color::srgb(0.15, 0.15, 0.15),
        BikeLink::Fork | BikeLink::Handlebars => Color::srgb(0.7, 0.7, 0.75),
        BikeLink::Crank => Color::srgb(0.9, 0.8, 0.3),
        BikeLink::RightFootTarget => Color::srgb(0.3, 0.8, 0.4),
        BikeLink::LeftFootTarget => Color::srgb(0.3, 0.5, 0.9),
    }
}

/// Spawn meshes for the current rig whenever it was (re)built.
pub fn spawn_bike_visuals(
    mut commands: Commands,
    mut state: ResMut<BikeState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<BikeVisual>>,
) {
    if !state.visuals_dirty {
        return;
    }

    // Old rig bodies are gone after a rebuild
    for entity in existing.iter() {
        commands.entity(entity).despawn_recursive();
    }

    // One mesh per rig body
    for (link, handle) in state.world.links() {
        let (mesh, offset) = link_mesh(link, &mut meshes);
        commands.spawn((
            Mesh3d(mesh),
            MeshMaterial3d(unlit(&mut materials, link_color(link))),
            Transform::default(),
            RigLink { link, handle },
            VisualOffset { offset },
            BikeVisual,
        ));
    }

    // Ray-cast wheels have no body, they are posed from the frame
    for index in 0..state.world.ray_wheel_poses().len() {
        let (mesh, offset) = wheel_mesh(&mut meshes);
        commands.spawn((
            Mesh3d(mesh),
            MeshMaterial3d(unlit(&mut materials, link_color(BikeLink::RearWheel))),
            Transform::default(),
            RayWheel { index },
            VisualOffset { offset },
            BikeVisual,
        ));
    }

    log::info!("spawned bike visuals for {:?} rig", state.world.drivetrain());
    state.visuals_dirty = false;
}
