//! Rapier bike rig and its [`BikeRig`] implementation.
//!
//! Forward is +X and up is +Y, so wheels and crank spin around local Z.
//! The hinge-motor rig hangs everything off the frame with impulse joints:
//! rear wheel on a motorised revolute joint, fork on a steering joint, crank
//! on a free revolute joint. The wheel-torque rig uses Rapier's ray-cast
//! vehicle controller on the frame and spins a kinematic crank for show.
//! Both frames are held upright after every step; nobody balances the bike.

use bike_control::{BikeConfig, BikeRig, DriveCommand, Drivetrain, FootPair, RigFault, RigPart};
use nalgebra as na;
use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::prelude::*;

use crate::physics::PhysicsWorld;

pub struct BikeGeometry;

impl BikeGeometry {
    pub const WHEEL_RADIUS: f32 = 0.35;
    pub const WHEELBASE_HALF: f32 = 0.55;
    pub const FRAME_HALF_EXTENTS: [f32; 3] = [0.6, 0.06, 0.05];
    pub const FRAME_SPAWN_HEIGHT: f32 = 0.75;
    pub const RIDER_MASS: f32 = 70.0;
    pub const DENSITY: f32 = 200.0;

    pub const CRANK_MOUNT: [f32; 3] = [0.0, -0.3, 0.0];
    pub const CRANK_ARM: f32 = 0.17;
    pub const PEDAL_SPREAD: f32 = 0.12;
    pub const HANDLEBAR_MOUNT: [f32; 3] = [0.5, 0.35, 0.0];
    pub const FORK_MOUNT: [f32; 3] = [0.55, -0.1, 0.0];

    // Joint motors
    pub const WHEEL_MOTOR_FACTOR: f32 = 1.0;
    pub const STEER_STIFFNESS: f32 = 400.0;
    pub const STEER_DAMPING: f32 = 40.0;

    // Ray-cast wheels
    pub const SUSPENSION_REST: f32 = 0.25;
    pub const FRONT: usize = 0;
    pub const REAR: usize = 1;

    /// Positive drive spins the wheels so the bike rolls toward +X.
    pub const FORWARD_SPIN: f32 = -1.0;
}

fn mount(offset: [f32; 3]) -> Isometry<f32> {
    Isometry::translation(offset[0], offset[1], offset[2])
}

fn spin(angle_deg: f32) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::from_axis_angle(&Vector::z_axis(), BikeGeometry::FORWARD_SPIN * angle_deg.to_radians())
}

/// Bike parts only collide with the ground.
fn bike_groups() -> InteractionGroups {
    InteractionGroups::new(Group::GROUP_2, Group::GROUP_1)
}

/// How the rear wheel is driven.
#[derive(Clone, Copy, Debug)]
pub enum RearWheel {
    Hinge { body: RigidBodyHandle, joint: ImpulseJointHandle },
    RayCast,
}

/// How the front wheel is steered.
#[derive(Clone, Copy, Debug)]
pub enum FrontWheel {
    Hinge { fork: RigidBodyHandle, wheel: RigidBodyHandle, joint: ImpulseJointHandle },
    RayCast,
}

/// Orientation-only stand-in for the handlebars, smoothed before it is
/// copied onto the real body.
#[derive(Clone, Copy, Debug)]
pub struct HandlebarProxy {
    pub mount: Isometry<f32>,
    pub yaw_deg: f32,
}

/// Render-facing names for rig bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BikeLink {
    Frame,
    RearWheel,
    FrontWheel,
    Fork,
    Crank,
    Handlebars,
    RightFootTarget,
    LeftFootTarget,
}

pub struct BikeParts {
    pub frame: RigidBodyHandle,
    pub crank: Option<RigidBodyHandle>,
    pub rear_wheel: Option<RearWheel>,
    pub front_wheel: Option<FrontWheel>,
    pub handlebars: Option<RigidBodyHandle>,
    pub proxy: Option<HandlebarProxy>,
    pub right_foot_target: Option<RigidBodyHandle>,
    pub left_foot_target: Option<RigidBodyHandle>,
    pub right_foot_pop: Option<Point<f32>>,
    pub left_foot_pop: Option<Point<f32>>,
}

/// Physics world with one bike in it.
pub struct BikeWorld {
    pub physics: PhysicsWorld,
    pub parts: BikeParts,
    pub vehicle: Option<DynamicRayCastVehicleController>,
    drivetrain: Drivetrain,
    crank_angle_deg: f32,
}

impl BikeWorld {
    pub fn new(config: &BikeConfig) -> Self {
        let mut physics = PhysicsWorld::new(config.fixed_dt);
        physics.add_ground();

        let frame = Self::build_frame(&mut physics);
        let mut vehicle = None;

        let (crank, rear_wheel, front_wheel) = match config.drivetrain {
            Drivetrain::HingeMotor => {
                let crank = Self::build_hinge_crank(&mut physics, frame);
                let rear = Self::build_hinge_rear(&mut physics, frame);
                let front = Self::build_hinge_front(&mut physics, frame);
                (Some(crank), Some(rear), Some(front))
            }
            Drivetrain::WheelTorque => {
                vehicle = Some(Self::build_ray_cast_wheels(frame));
                let crank = Self::kinematic(&mut physics, BikeGeometry::CRANK_MOUNT, Some(0.04));
                (Some(crank), Some(RearWheel::RayCast), Some(FrontWheel::RayCast))
            }
        };

        let handlebars = Self::kinematic(&mut physics, BikeGeometry::HANDLEBAR_MOUNT, None);
        let right_foot_target = Self::kinematic(&mut physics, BikeGeometry::CRANK_MOUNT, None);
        let left_foot_target = Self::kinematic(&mut physics, BikeGeometry::CRANK_MOUNT, None);

        let parts = BikeParts {
            frame,
            crank,
            rear_wheel,
            front_wheel,
            handlebars: Some(handlebars),
            proxy: Some(HandlebarProxy {
                mount: mount(BikeGeometry::HANDLEBAR_MOUNT),
                yaw_deg: 0.0,
            }),
            right_foot_target: Some(right_foot_target),
            left_foot_target: Some(left_foot_target),
            right_foot_pop: Some(Point::origin()),
            left_foot_pop: Some(Point::origin()),
        };

        log::info!(
            "built {:?} bike rig: {} bodies, {} colliders",
            config.drivetrain,
            physics.rigid_body_set.len(),
            physics.collider_set.len()
        );

        let mut world = Self {
            physics,
            parts,
            vehicle,
            drivetrain: config.drivetrain,
            crank_angle_deg: 0.0,
        };
        world.follow_frame();
        world
    }

    fn build_frame(physics: &mut PhysicsWorld) -> RigidBodyHandle {
        // Roll is removed in hold_upright, not by locked axes.
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![0.0, BikeGeometry::FRAME_SPAWN_HEIGHT, 0.0])
            .additional_mass(BikeGeometry::RIDER_MASS)
            .can_sleep(false)
            .build();
        let handle = physics.rigid_body_set.insert(body);

        let [hx, hy, hz] = BikeGeometry::FRAME_HALF_EXTENTS;
        let collider = ColliderBuilder::cuboid(hx, hy, hz)
            .density(BikeGeometry::DENSITY)
            .collision_groups(bike_groups())
            .build();
        physics.collider_set.insert_with_parent(collider, handle, &mut physics.rigid_body_set);
        handle
    }

    fn dynamic_wheel(physics: &mut PhysicsWorld, at: Vector<f32>) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic().translation(at).can_sleep(false).build();
        let handle = physics.rigid_body_set.insert(body);
        let collider = ColliderBuilder::ball(BikeGeometry::WHEEL_RADIUS)
            .density(BikeGeometry::DENSITY)
            .friction(1.2)
            .collision_groups(bike_groups())
            .build();
        physics.collider_set.insert_with_parent(collider, handle, &mut physics.rigid_body_set);
        handle
    }

    fn hinge(anchor: [f32; 3], axis: na::UnitVector3<f32>) -> GenericJoint {
        RevoluteJointBuilder::new(axis)
            .local_anchor1(point![anchor[0], anchor[1], anchor[2]])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .contacts_enabled(false)
            .build()
            .into()
    }

    fn spawn_point(offset: [f32; 3]) -> Vector<f32> {
        vector![offset[0], BikeGeometry::FRAME_SPAWN_HEIGHT + offset[1], offset[2]]
    }

    fn build_hinge_rear(physics: &mut PhysicsWorld, frame: RigidBodyHandle) -> RearWheel {
        let anchor = [-BikeGeometry::WHEELBASE_HALF, BikeGeometry::WHEEL_RADIUS - BikeGeometry::FRAME_SPAWN_HEIGHT, 0.0];
        let body = Self::dynamic_wheel(physics, Self::spawn_point(anchor));
        let joint = physics
            .impulse_joint_set
            .insert(frame, body, Self::hinge(anchor, Vector::z_axis()), true);
        RearWheel::Hinge { body, joint }
    }

    fn build_hinge_front(physics: &mut PhysicsWorld, frame: RigidBodyHandle) -> FrontWheel {
        let fork_anchor = BikeGeometry::FORK_MOUNT;
        let fork_body = RigidBodyBuilder::dynamic()
            .translation(Self::spawn_point(fork_anchor))
            .can_sleep(false)
            .build();
        let fork = physics.rigid_body_set.insert(fork_body);
        let fork_collider = ColliderBuilder::cuboid(0.03, 0.15, 0.03)
            .density(BikeGeometry::DENSITY)
            .collision_groups(bike_groups())
            .build();
        physics.collider_set.insert_with_parent(fork_collider, fork, &mut physics.rigid_body_set);

        let mut steer = Self::hinge(fork_anchor, Vector::y_axis());
        steer.set_motor_position(JointAxis::AngX, 0.0, BikeGeometry::STEER_STIFFNESS, BikeGeometry::STEER_DAMPING);
        let joint = physics.impulse_joint_set.insert(frame, fork, steer, true);

        let wheel_anchor = [0.0, BikeGeometry::WHEEL_RADIUS - BikeGeometry::FRAME_SPAWN_HEIGHT - fork_anchor[1], 0.0];
        let wheel_at = Self::spawn_point([fork_anchor[0], BikeGeometry::WHEEL_RADIUS - BikeGeometry::FRAME_SPAWN_HEIGHT, 0.0]);
        let wheel = Self::dynamic_wheel(physics, wheel_at);
        physics
            .impulse_joint_set
            .insert(fork, wheel, Self::hinge(wheel_anchor, Vector::z_axis()), true);

        FrontWheel::Hinge { fork, wheel, joint }
    }

    fn build_hinge_crank(physics: &mut PhysicsWorld, frame: RigidBodyHandle) -> RigidBodyHandle {
        let anchor = BikeGeometry::CRANK_MOUNT;
        let body = RigidBodyBuilder::dynamic()
            .translation(Self::spawn_point(anchor))
            .angular_damping(2.0)
            .can_sleep(false)
            .build();
        let crank = physics.rigid_body_set.insert(body);
        let collider = ColliderBuilder::ball(0.04)
            .density(BikeGeometry::DENSITY)
            .collision_groups(InteractionGroups::none())
            .build();
        physics.collider_set.insert_with_parent(collider, crank, &mut physics.rigid_body_set);

        physics
            .impulse_joint_set
            .insert(frame, crank, Self::hinge(anchor, Vector::z_axis()), true);
        crank
    }

    /// Kinematic body that tracks the frame; optional ball collider that touches nothing.
    fn kinematic(
        physics: &mut PhysicsWorld,
        offset: [f32; 3],
        radius: Option<f32>,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(Self::spawn_point(offset))
            .build();
        let handle = physics.rigid_body_set.insert(body);
        if let Some(radius) = radius {
            let collider = ColliderBuilder::ball(radius)
                .collision_groups(InteractionGroups::none())
                .build();
            physics.collider_set.insert_with_parent(collider, handle, &mut physics.rigid_body_set);
        }
        handle
    }

    fn build_ray_cast_wheels(frame: RigidBodyHandle) -> DynamicRayCastVehicleController {
        let mut vehicle = DynamicRayCastVehicleController::new(frame);
        let tuning = WheelTuning {
            suspension_stiffness: 60.0,
            suspension_damping: 6.0,
            friction_slip: 2.0,
            ..WheelTuning::default()
        };
        let down = -Vector::y();
        let axle = Vector::z();
        let mount_y = -BikeGeometry::FRAME_HALF_EXTENTS[1];
        // FRONT first, REAR second.
        for x in [BikeGeometry::WHEELBASE_HALF, -BikeGeometry::WHEELBASE_HALF] {
            vehicle.add_wheel(
                point![x, mount_y, 0.0],
                down,
                axle,
                BikeGeometry::SUSPENSION_REST,
                BikeGeometry::WHEEL_RADIUS,
                &tuning,
            );
        }
        vehicle
    }

    pub fn drivetrain(&self) -> Drivetrain {
        self.drivetrain
    }

    pub fn crank_angle_deg(&self) -> f32 {
        self.crank_angle_deg
    }

    pub fn frame_pose(&self) -> Option<Isometry<f32>> {
        self.physics.body_pose(self.parts.frame)
    }

    /// Drop a part, as if its handle had never been assigned.
    pub fn detach(&mut self, part: RigPart) {
        let parts = &mut self.parts;
        match part {
            RigPart::Crank => parts.crank = None,
            RigPart::RearWheel => parts.rear_wheel = None,
            RigPart::FrontWheel => parts.front_wheel = None,
            RigPart::HandlebarProxy => parts.proxy = None,
            RigPart::Handlebars => parts.handlebars = None,
            RigPart::RightFootTarget => parts.right_foot_target = None,
            RigPart::LeftFootTarget => parts.left_foot_target = None,
            RigPart::RightFootPop => parts.right_foot_pop = None,
            RigPart::LeftFootPop => parts.left_foot_pop = None,
        }
        log::info!("detached {} from bike rig", part);
    }

    /// Advance the vehicle controller (if any), the physics world, then the
    /// bodies that follow the frame.
    pub fn step(&mut self) {
        let dt = self.physics.dt();
        if let Some(vehicle) = self.vehicle.as_mut() {
            vehicle.update_vehicle(
                dt,
                &mut self.physics.rigid_body_set,
                &self.physics.collider_set,
                &self.physics.query_pipeline,
                QueryFilter::exclude_dynamic().exclude_rigid_body(self.parts.frame),
            );
        }
        self.physics.step();
        self.hold_upright();
        self.follow_frame();
    }

    /// Strip roll from the frame's pose and spin, keeping heading and pitch.
    fn hold_upright(&mut self) {
        let Some(frame) = self.physics.rigid_body_set.get_mut(self.parts.frame) else {
            return;
        };
        let forward = frame.rotation() * Vector::x();
        let level = forward.x.hypot(forward.z);
        // Nose straight up or down: heading is undefined.
        if level < 1e-6 {
            return;
        }
        let heading = (-forward.z).atan2(forward.x);
        let pitch = forward.y.atan2(level);
        let upright = na::UnitQuaternion::from_axis_angle(&Vector::y_axis(), heading)
            * na::UnitQuaternion::from_axis_angle(&Vector::z_axis(), pitch);
        frame.set_rotation(upright, false);

        let axis = upright * Vector::x();
        let angvel = *frame.angvel();
        frame.set_angvel(angvel - axis * angvel.dot(&axis), false);
    }

    /// Sideways lean of the frame in radians.
    pub fn frame_roll(&self) -> Option<f32> {
        let rotation = self.frame_pose()?.rotation;
        let forward = rotation * Vector::x();
        let side = forward.cross(&Vector::y());
        if side.norm() < 1e-6 {
            return None;
        }
        let up = rotation * Vector::y();
        Some(up.dot(&side.normalize()).clamp(-1.0, 1.0).asin())
    }

    /// Re-seat the kinematic crank and the foot targets on the current poses.
    fn follow_frame(&mut self) {
        let Some(frame_pose) = self.frame_pose() else {
            return;
        };
        let crank_mount = frame_pose * mount(BikeGeometry::CRANK_MOUNT);

        let crank_pose = match (self.drivetrain, self.parts.crank) {
            (Drivetrain::WheelTorque, Some(crank)) => {
                let pose = crank_mount * Isometry::from_parts(na::Translation3::identity(), spin(self.crank_angle_deg));
                if let Some(body) = self.physics.rigid_body_set.get_mut(crank) {
                    body.set_next_kinematic_position(pose);
                }
                pose
            }
            (Drivetrain::HingeMotor, Some(crank)) => self.physics.body_pose(crank).unwrap_or(crank_mount),
            (_, None) => crank_mount,
        };

        let arm = BikeGeometry::CRANK_ARM;
        let spread = BikeGeometry::PEDAL_SPREAD;
        let pedals = [
            (self.parts.right_foot_target, vector![0.0, -arm, spread]),
            (self.parts.left_foot_target, vector![0.0, arm, -spread]),
        ];
        for (target, arm_local) in pedals {
            let Some(handle) = target else { continue };
            let position = crank_pose * Point::from(arm_local);
            if let Some(body) = self.physics.rigid_body_set.get_mut(handle) {
                body.set_next_kinematic_translation(position.coords);
            }
        }
    }

    /// Bodies to draw, keyed by role.
    pub fn links(&self) -> Vec<(BikeLink, RigidBodyHandle)> {
        let p = &self.parts;
        let mut links = vec![(BikeLink::Frame, p.frame)];
        if let Some(RearWheel::Hinge { body, .. }) = p.rear_wheel {
            links.push((BikeLink::RearWheel, body));
        }
        if let Some(FrontWheel::Hinge { fork, wheel, .. }) = p.front_wheel {
            links.push((BikeLink::Fork, fork));
            links.push((BikeLink::FrontWheel, wheel));
        }
        let optional = [
            (BikeLink::Crank, p.crank),
            (BikeLink::Handlebars, p.handlebars),
            (BikeLink::RightFootTarget, p.right_foot_target),
            (BikeLink::LeftFootTarget, p.left_foot_target),
        ];
        links.extend(optional.into_iter().filter_map(|(link, handle)| handle.map(|h| (link, h))));
        links
    }

    /// World poses of the ray-cast wheels at rest length, front first.
    pub fn ray_wheel_poses(&self) -> Vec<Isometry<f32>> {
        let (Some(vehicle), Some(frame_pose)) = (self.vehicle.as_ref(), self.frame_pose()) else {
            return Vec::new();
        };
        vehicle
            .wheels()
            .iter()
            .map(|wheel| {
                let local = wheel.chassis_connection_point_cs + wheel.direction_cs * wheel.suspension_rest_length;
                let steer = na::UnitQuaternion::from_axis_angle(&Vector::y_axis(), wheel.steering);
                frame_pose * Isometry::from_parts(na::Translation3::from(local.coords), steer)
            })
            .collect()
    }

    pub fn foot_pops(&self) -> (Option<Point<f32>>, Option<Point<f32>>) {
        (self.parts.right_foot_pop, self.parts.left_foot_pop)
    }

    fn body(&self, part: RigPart, handle: Option<RigidBodyHandle>) -> Result<&RigidBody, RigFault> {
        let handle = handle.ok_or(RigFault::Missing(part))?;
        self.physics.rigid_body_set.get(handle).ok_or(RigFault::Stale(part))
    }

    fn body_mut(&mut self, part: RigPart, handle: Option<RigidBodyHandle>) -> Result<&mut RigidBody, RigFault> {
        let handle = handle.ok_or(RigFault::Missing(part))?;
        self.physics.rigid_body_set.get_mut(handle).ok_or(RigFault::Stale(part))
    }

    fn joint_exists(&self, part: RigPart, joint: ImpulseJointHandle) -> Result<(), RigFault> {
        self.physics
            .impulse_joint_set
            .get(joint)
            .map(|_| ())
            .ok_or(RigFault::Stale(part))
    }

    fn joint_data_mut(&mut self, part: RigPart, joint: ImpulseJointHandle) -> Result<&mut GenericJoint, RigFault> {
        self.physics
            .impulse_joint_set
            .iter_mut()
            .find(|(handle, _)| *handle == joint)
            .map(|(_, impulse_joint)| &mut impulse_joint.data)
            .ok_or(RigFault::Stale(part))
    }

    fn proxy(&self) -> Result<&HandlebarProxy, RigFault> {
        self.parts.proxy.as_ref().ok_or(RigFault::Missing(RigPart::HandlebarProxy))
    }

    fn frame_rotation(&self, part: RigPart) -> Result<na::UnitQuaternion<f32>, RigFault> {
        self.frame_pose().map(|pose| pose.rotation).ok_or(RigFault::Stale(part))
    }

    fn ray_wheel_mut(&mut self, part: RigPart, index: usize) -> Result<&mut rapier3d::control::Wheel, RigFault> {
        self.vehicle
            .as_mut()
            .and_then(|vehicle| vehicle.wheels_mut().get_mut(index))
            .ok_or(RigFault::Stale(part))
    }
}

impl BikeRig for BikeWorld {
    fn has(&self, part: RigPart) -> Result<(), RigFault> {
        let p = &self.parts;
        match part {
            RigPart::Crank => self.body(part, p.crank).map(|_| ()),
            RigPart::Handlebars => self.body(part, p.handlebars).map(|_| ()),
            RigPart::RightFootTarget => self.body(part, p.right_foot_target).map(|_| ()),
            RigPart::LeftFootTarget => self.body(part, p.left_foot_target).map(|_| ()),
            RigPart::RightFootPop => p.right_foot_pop.map(|_| ()).ok_or(RigFault::Missing(part)),
            RigPart::LeftFootPop => p.left_foot_pop.map(|_| ()).ok_or(RigFault::Missing(part)),
            RigPart::HandlebarProxy => {
                self.proxy()?;
                self.frame_rotation(part).map(|_| ())
            }
            RigPart::RearWheel => match p.rear_wheel.as_ref().ok_or(RigFault::Missing(part))? {
                RearWheel::Hinge { body, joint } => {
                    self.body(part, Some(*body))?;
                    self.joint_exists(part, *joint)
                }
                RearWheel::RayCast => self.vehicle.as_ref().map(|_| ()).ok_or(RigFault::Stale(part)),
            },
            RigPart::FrontWheel => match p.front_wheel.as_ref().ok_or(RigFault::Missing(part))? {
                FrontWheel::Hinge { wheel, joint, .. } => {
                    self.body(part, Some(*wheel))?;
                    self.joint_exists(part, *joint)
                }
                FrontWheel::RayCast => self.vehicle.as_ref().map(|_| ()).ok_or(RigFault::Stale(part)),
            },
        }
    }

    fn check(&self, config: &BikeConfig) -> Result<(), RigFault> {
        for part in bike_control::rig::required_parts(config) {
            self.has(part)?;
        }
        // A rig built for the other drivetrain has no actuator for this command.
        if config.drivetrain != self.drivetrain {
            return Err(RigFault::Missing(RigPart::RearWheel));
        }
        Ok(())
    }

    fn foot_targets(&self) -> Result<FootPair, RigFault> {
        let right = self.body(RigPart::RightFootTarget, self.parts.right_foot_target)?;
        let left = self.body(RigPart::LeftFootTarget, self.parts.left_foot_target)?;
        Ok(FootPair::new(
            na::Point3::from(*right.translation()),
            na::Point3::from(*left.translation()),
        ))
    }

    fn set_foot_pops(&mut self, pops: &FootPair) -> Result<(), RigFault> {
        let right = self.parts.right_foot_pop.as_mut().ok_or(RigFault::Missing(RigPart::RightFootPop))?;
        *right = pops.right;
        let left = self.parts.left_foot_pop.as_mut().ok_or(RigFault::Missing(RigPart::LeftFootPop))?;
        *left = pops.left;
        Ok(())
    }

    fn apply_crank_impulse(&mut self, torque: f32) -> Result<(), RigFault> {
        let crank = self.body_mut(RigPart::Crank, self.parts.crank)?;
        let axle = crank.rotation() * Vector::z();
        crank.apply_torque_impulse(axle * (BikeGeometry::FORWARD_SPIN * torque), true);
        Ok(())
    }

    fn drive(&mut self, command: &DriveCommand) -> Result<(), RigFault> {
        let part = RigPart::RearWheel;
        match (*command, self.parts.rear_wheel) {
            (DriveCommand::HingeMotor { target_velocity, force }, Some(RearWheel::Hinge { joint, .. })) => {
                let data = self.joint_data_mut(part, joint)?;
                data.set_motor_velocity(
                    JointAxis::AngX,
                    BikeGeometry::FORWARD_SPIN * target_velocity.to_radians(),
                    BikeGeometry::WHEEL_MOTOR_FACTOR,
                );
                data.set_motor_max_force(JointAxis::AngX, force);
                Ok(())
            }
            (DriveCommand::WheelTorque { motor_torque, crank_rotation_deg }, Some(RearWheel::RayCast)) => {
                let wheel = self.ray_wheel_mut(part, BikeGeometry::REAR)?;
                wheel.engine_force = motor_torque / BikeGeometry::WHEEL_RADIUS;
                self.crank_angle_deg = (self.crank_angle_deg + crank_rotation_deg) % 360.0;
                Ok(())
            }
            _ => Err(RigFault::Missing(part)),
        }
    }

    fn set_proxy_yaw(&mut self, yaw_deg: f32) -> Result<(), RigFault> {
        let proxy = self.parts.proxy.as_mut().ok_or(RigFault::Missing(RigPart::HandlebarProxy))?;
        proxy.yaw_deg = yaw_deg;
        Ok(())
    }

    fn proxy_rotation(&self) -> Result<na::UnitQuaternion<f32>, RigFault> {
        let proxy = self.proxy()?;
        let frame = self.frame_rotation(RigPart::HandlebarProxy)?;
        let yaw = na::UnitQuaternion::from_axis_angle(&Vector::y_axis(), proxy.yaw_deg.to_radians());
        Ok(frame * proxy.mount.rotation * yaw)
    }

    fn set_handlebar_rotation(&mut self, rotation: na::UnitQuaternion<f32>) -> Result<(), RigFault> {
        let frame_pose = self.frame_pose().ok_or(RigFault::Stale(RigPart::Handlebars))?;
        let bar_mount = self.parts.proxy.map(|p| p.mount).unwrap_or_else(|| mount(BikeGeometry::HANDLEBAR_MOUNT));
        let position = frame_pose * Point::from(bar_mount.translation.vector);
        let handlebars = self.body_mut(RigPart::Handlebars, self.parts.handlebars)?;
        handlebars.set_next_kinematic_position(Isometry::from_parts(na::Translation3::from(position.coords), rotation));
        Ok(())
    }

    fn set_front_wheel_steer(&mut self, angle_deg: f32) -> Result<(), RigFault> {
        let part = RigPart::FrontWheel;
        match self.parts.front_wheel.ok_or(RigFault::Missing(part))? {
            FrontWheel::Hinge { joint, .. } => {
                let data = self.joint_data_mut(part, joint)?;
                data.set_motor_position(
                    JointAxis::AngX,
                    angle_deg.to_radians(),
                    BikeGeometry::STEER_STIFFNESS,
                    BikeGeometry::STEER_DAMPING,
                );
                Ok(())
            }
            FrontWheel::RayCast => {
                let wheel = self.ray_wheel_mut(part, BikeGeometry::FRONT)?;
                wheel.steering = angle_deg.to_radians();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bike_control::{BikeControlLoop, SteeringMode, TickError};

    fn pedal_stroke(tick: usize) -> f32 {
        // Full left stroke, full right stroke, repeat.
        let phase = (tick % 40) as f32 / 10.0;
        match tick % 80 {
            0..=39 => -(phase.min(1.0)),
            _ => phase.min(1.0),
        }
    }

    fn run(config: BikeConfig, ticks: usize) -> (BikeWorld, BikeControlLoop) {
        let mut world = BikeWorld::new(&config);
        let mut bike = BikeControlLoop::new(config.clone());
        bike.enable();
        for tick in 0..ticks {
            bike.drive(pedal_stroke(tick), 0.6, config.fixed_dt, &mut world).unwrap();
            world.step();
        }
        (world, bike)
    }

    #[test]
    fn test_hinge_rig_drives_rear_motor() {
        let (mut world, bike) = run(BikeConfig::default(), 12);
        assert!(bike.telemetry().force_to_apply > 0.0);

        let Some(RearWheel::Hinge { joint, .. }) = world.parts.rear_wheel else {
            panic!("hinge rig without hinge rear wheel");
        };
        let data = world.joint_data_mut(RigPart::RearWheel, joint).unwrap();
        let motor = data.motor(JointAxis::AngX).unwrap();
        assert!(motor.max_force > 0.0);
        assert!(motor.target_vel < 0.0);
    }

    #[test]
    fn test_idle_hinge_rig_stays_upright() {
        let config = BikeConfig::default();
        let mut world = BikeWorld::new(&config);
        for _ in 0..300 {
            world.step();
        }
        assert!(world.frame_roll().unwrap().abs() < 1e-3);
        assert!(world.frame_pose().unwrap().translation.y > 0.5);
    }

    #[test]
    fn test_pedalled_hinge_rig_rolls_forward_upright() {
        let config = BikeConfig { back_wheel_torque_multiplier: 2000.0, ..Default::default() };
        let (world, bike) = run(config, 400);
        assert_eq!(bike.telemetry().skipped_ticks, 0);

        let pose = world.frame_pose().unwrap();
        assert!(world.frame_roll().unwrap().abs() < 0.05);
        assert!(pose.translation.y > 0.5);
        assert!(pose.translation.x > 0.3, "frame only reached x = {}", pose.translation.x);
        assert!(pose.translation.z.abs() < 0.2);
    }

    #[test]
    fn test_wheel_torque_rig_sets_engine_force_and_steer() {
        let config = BikeConfig {
            drivetrain: Drivetrain::WheelTorque,
            steering: SteeringMode::ProxyAndFrontWheel,
            ..Default::default()
        };
        let (world, bike) = run(config, 12);
        let vehicle = world.vehicle.as_ref().unwrap();
        assert!(vehicle.wheels()[BikeGeometry::REAR].engine_force > 0.0);
        let heading = bike.telemetry().turn_rotation;
        assert!(heading > 0.0);
        assert!((vehicle.wheels()[BikeGeometry::FRONT].steering - heading.to_radians()).abs() < 1e-6);
        assert!(world.crank_angle_deg() > 0.0);
    }

    #[test]
    fn test_foot_pops_follow_targets() {
        let (world, _) = run(BikeConfig::default(), 5);
        let targets = world.foot_targets().unwrap();
        let (right, left) = world.foot_pops();
        // Pops lag targets by the final physics step at most.
        assert!((right.unwrap() - targets.right).norm() < 0.5);
        assert!((left.unwrap() - targets.left).norm() < 0.5);
        assert_ne!(right, left);
    }

    #[test]
    fn test_detached_handlebars_skip_tick() {
        let config = BikeConfig::default();
        let mut world = BikeWorld::new(&config);
        world.detach(RigPart::Handlebars);
        let mut bike = BikeControlLoop::new(config);
        bike.enable();
        let err = bike.drive(-0.5, 0.0, 0.02, &mut world).unwrap_err();
        assert_eq!(err, TickError::NotReady(RigFault::Missing(RigPart::Handlebars)));
        assert_eq!(bike.telemetry().force_to_apply, 0.0);
    }

    #[test]
    fn test_removed_body_is_stale() {
        let config = BikeConfig::default();
        let mut world = BikeWorld::new(&config);
        let handle = world.parts.right_foot_target.unwrap();
        world.physics.remove_body(handle);
        assert_eq!(world.has(RigPart::RightFootTarget), Err(RigFault::Stale(RigPart::RightFootTarget)));
    }

    #[test]
    fn test_mismatched_drivetrain_rejected() {
        let world = BikeWorld::new(&BikeConfig::default());
        let other = BikeConfig { drivetrain: Drivetrain::WheelTorque, ..Default::default() };
        assert_eq!(world.check(&other), Err(RigFault::Missing(RigPart::RearWheel)));
    }
}
