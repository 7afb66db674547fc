//! Capsule character controller on top of the Rapier KCC.
//!
//! Policy: collide-and-slide and stepping go through Rapier's KCC; this crate only
//! tracks grounding, velocity and contact flags between moves.
#![forbid(unsafe_code)]

use log::trace;
use physics_rapier::PhysicsWorld;
use rapier3d::control::{
    CharacterAutostep, CharacterLength, EffectiveCharacterMovement, KinematicCharacterController,
};
use rapier3d::math::{Isometry, Point, Rotation, Translation, UnitVector, Vector};
use rapier3d::prelude::{Capsule, QueryFilter, Ray, Real};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionProfile {
    /// Capsule radius in meters.
    pub radius: Real,
    /// Total capsule height in meters, caps included.
    pub height: Real,
    /// Maximum ledge height climbed without jumping.
    pub step_offset: Real,
    /// Maximum walkable slope in radians.
    pub slope_limit: Real,
    /// Separation kept between the capsule and the level.
    pub skin_width: Real,
    /// Distance the capsule snaps down to keep ground contact.
    pub ground_snap_distance: Real,
    /// Moves shorter than this are skipped.
    pub min_move_distance: Real,
}

impl Default for CollisionProfile {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 2.0,
            step_offset: 0.3,
            slope_limit: 45.0_f32.to_radians(),
            skin_width: 0.08,
            ground_snap_distance: 0.1,
            min_move_distance: 0.001,
        }
    }
}

impl CollisionProfile {
    /// Distance between the two sphere centres.
    pub fn cylinder_height(&self) -> Real {
        (self.height - 2.0 * self.radius).max(0.0)
    }

    fn capsule(&self) -> Capsule {
        Capsule::new_y(self.cylinder_height() * 0.5, self.radius)
    }

    fn apply_to(&self, controller: &mut KinematicCharacterController) {
        controller.autostep = if self.step_offset > 0.0 {
            Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(self.step_offset),
                min_width: CharacterLength::Absolute(self.radius * 0.5),
                include_dynamic_bodies: false,
            })
        } else {
            None
        };
        controller.max_slope_climb_angle = self.slope_limit;
        controller.min_slope_slide_angle = self.slope_limit;
        controller.snap_to_ground = if self.ground_snap_distance > 0.0 {
            Some(CharacterLength::Absolute(self.ground_snap_distance))
        } else {
            None
        };
        controller.offset = CharacterLength::Absolute(self.skin_width);
    }
}

/// Which parts of the capsule touched the level during the last move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionFlags {
    pub sides: bool,
    pub above: bool,
    pub below: bool,
}

impl CollisionFlags {
    pub fn is_none(&self) -> bool {
        !(self.sides || self.above || self.below)
    }
}

pub struct CharacterController {
    profile: CollisionProfile,
    controller: KinematicCharacterController,
    capsule: Capsule,
    position: Isometry<Real>,
    rotation: Rotation<Real>,
    velocity: Vector<Real>,
    grounded: bool,
    flags: CollisionFlags,
}

impl CharacterController {
    pub fn new(profile: CollisionProfile, position: Vector<Real>) -> Self {
        let mut controller = KinematicCharacterController::default();
        profile.apply_to(&mut controller);
        Self {
            profile,
            controller,
            capsule: profile.capsule(),
            position: Isometry::translation(position.x, position.y, position.z),
            rotation: Rotation::identity(),
            velocity: Vector::zeros(),
            grounded: false,
            flags: CollisionFlags::default(),
        }
    }

    pub fn profile(&self) -> CollisionProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: CollisionProfile) {
        self.profile = profile;
        self.capsule = profile.capsule();
        profile.apply_to(&mut self.controller);
    }

    pub fn capsule(&self) -> &Capsule {
        &self.capsule
    }

    /// Capsule centre in world space.
    pub fn position(&self) -> Vector<Real> {
        self.position.translation.vector
    }

    /// Facing of the avatar. The capsule itself stays upright.
    pub fn rotation(&self) -> Rotation<Real> {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation<Real>) {
        self.rotation = rotation;
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Displacement actually applied by the last move, per second.
    pub fn velocity(&self) -> Vector<Real> {
        self.velocity
    }

    pub fn collision_flags(&self) -> CollisionFlags {
        self.flags
    }

    /// Places the capsule without sweeping and clears contact state.
    pub fn teleport(&mut self, position: Vector<Real>) {
        self.position = Isometry::translation(position.x, position.y, position.z);
        self.velocity = Vector::zeros();
        self.grounded = false;
        self.flags = CollisionFlags::default();
    }

    /// Collide-and-slide move. Lateral and vertical parts are swept separately so a
    /// ground pull never blocks autostep onto a ledge.
    pub fn move_by(&mut self, world: &PhysicsWorld, motion: Vector<Real>, dt: Real) -> CollisionFlags {
        let up = world_up(world);
        self.controller.up = UnitVector::new_normalize(up);
        let moving_up = motion.dot(&up) > 0.0;

        if motion.norm() < self.profile.min_move_distance {
            self.velocity = Vector::zeros();
            self.grounded = !moving_up && self.probe_ground(world, self.position, up);
            self.flags = CollisionFlags {
                below: self.grounded,
                ..CollisionFlags::default()
            };
            return self.flags;
        }

        let start = self.position;
        let original_autostep = self.controller.autostep;
        let original_snap = self.controller.snap_to_ground;
        let mut flags = CollisionFlags::default();
        let mut swept_grounded = false;

        if moving_up {
            self.controller.autostep = None;
            self.controller.snap_to_ground = None;
            let output = self.sweep(world, motion, dt, &mut flags);
            self.position = Translation::from(output.translation) * self.position;
        } else {
            let vertical = up * motion.dot(&up);
            let lateral = motion - vertical;
            if lateral.norm_squared() > 0.0 {
                let mut output = self.sweep(world, lateral, dt, &mut flags);
                let climbed = output.translation.dot(&up);
                if climbed > 1.0e-4 {
                    let stepped = Translation::from(output.translation) * self.position;
                    let support = self.profile.step_offset + self.profile.skin_width + 1.0e-3;
                    if !self.probe_ground_within(world, stepped, up, support) {
                        self.controller.autostep = None;
                        output = self.sweep(world, lateral, dt, &mut flags);
                    }
                }
                self.position = Translation::from(output.translation) * self.position;
                swept_grounded = output.grounded;
            }
            if vertical.norm_squared() > 0.0 {
                self.controller.autostep = None;
                let output = self.sweep(world, vertical, dt, &mut flags);
                self.position = Translation::from(output.translation) * self.position;
                swept_grounded = output.grounded;
            }
        }
        self.controller.autostep = original_autostep;
        self.controller.snap_to_ground = original_snap;

        let applied = self.position.translation.vector - start.translation.vector;
        self.velocity = if dt > 0.0 { applied / dt } else { Vector::zeros() };
        self.grounded = !moving_up
            && (swept_grounded || flags.below || self.probe_ground(world, self.position, up));
        flags.below = self.grounded;
        self.flags = flags;
        trace!(
            "capsule move: requested {:?} applied {:?} grounded {} flags {:?}",
            motion,
            applied,
            self.grounded,
            flags
        );
        flags
    }

    fn sweep(
        &self,
        world: &PhysicsWorld,
        translation: Vector<Real>,
        dt: Real,
        flags: &mut CollisionFlags,
    ) -> EffectiveCharacterMovement {
        let up = self.controller.up;
        let wall_dot = self.controller.max_slope_climb_angle.cos();
        self.controller.move_shape(
            dt,
            world.bodies(),
            world.colliders(),
            world.query_pipeline(),
            &self.capsule,
            &self.position,
            translation,
            QueryFilter::default(),
            |collision| {
                let up_dot = collision.hit.normal1.dot(&up);
                if up_dot < -0.1 {
                    flags.above = true;
                } else if up_dot <= wall_dot {
                    flags.sides = true;
                } else {
                    flags.below = true;
                }
            },
        )
    }

    fn probe_ground(&self, world: &PhysicsWorld, position: Isometry<Real>, up: Vector<Real>) -> bool {
        let snap_distance = self.profile.ground_snap_distance.max(0.0);
        self.probe_ground_within(world, position, up, snap_distance + self.profile.skin_width)
    }

    fn probe_ground_within(
        &self,
        world: &PhysicsWorld,
        position: Isometry<Real>,
        up: Vector<Real>,
        distance: Real,
    ) -> bool {
        // Foot probe narrower than the capsule so wall contacts do not count as ground.
        let foot_radius = self.profile.radius * 0.75;
        let foot_offset = -(self.profile.cylinder_height() * 0.5 + self.profile.radius) + foot_radius;
        let foot_center = position.translation.vector + up * foot_offset;
        let ray = Ray::new(Point::from(foot_center), -up);
        let max_toi = foot_radius + distance.max(0.0) + 1.0e-3;
        let Some((_, hit)) = world.query_pipeline().cast_ray_and_get_normal(
            world.bodies(),
            world.colliders(),
            &ray,
            max_toi,
            false,
            QueryFilter::default(),
        ) else {
            return false;
        };
        let up_dot = hit.normal.dot(&up);
        up_dot > 0.0 && up_dot >= self.controller.max_slope_climb_angle.cos()
    }
}

fn world_up(world: &PhysicsWorld) -> Vector<Real> {
    if world.gravity.norm_squared() > 1.0e-6 {
        -world.gravity.normalize()
    } else {
        Vector::y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapier3d::prelude::*;

    const DT: Real = 1.0 / 60.0;

    fn floor_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(vector![0.0, -9.81, 0.0]);
        world.insert_floor(10.0);
        world.refresh_queries();
        world
    }

    #[test]
    fn settles_on_floor_and_reports_ground() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.5, 0.0]);
        for _ in 0..30 {
            controller.move_by(&world, vector![0.0, -0.2, 0.0], DT);
        }
        assert!(controller.is_grounded());
        assert!(controller.collision_flags().below);
        assert!(controller.position().y > 0.9);
        assert!(controller.position().y < 1.2);
    }

    #[test]
    fn upward_move_is_never_grounded() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        controller.move_by(&world, vector![0.0, -0.1, 0.0], DT);
        assert!(controller.is_grounded());
        controller.move_by(&world, vector![0.0, 0.1, 0.0], DT);
        assert!(!controller.is_grounded());
        assert!(controller.velocity().y > 0.0);
    }

    #[test]
    fn velocity_reflects_applied_motion() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 3.0, 0.0]);
        controller.move_by(&world, vector![0.05, 0.0, 0.0], DT);
        assert!((controller.velocity().x - 0.05 / DT).abs() < 0.05);
        assert!(!controller.is_grounded());
    }

    #[test]
    fn wall_sets_side_flag_and_blocks() {
        let mut world = floor_world();
        let wall = ColliderBuilder::cuboid(0.1, 2.0, 3.0)
            .translation(vector![1.0, 2.0, 0.0])
            .build();
        world.insert_static_collider(wall);
        world.refresh_queries();

        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        let mut saw_side = false;
        for _ in 0..60 {
            let flags = controller.move_by(&world, vector![0.1, -0.05, 0.0], DT);
            saw_side |= flags.sides;
        }
        assert!(saw_side);
        assert!(controller.position().x < 0.9);
    }

    #[test]
    fn tiny_move_is_skipped() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 3.0, 0.0]);
        controller.move_by(&world, vector![0.0005, 0.0, 0.0], DT);
        assert_eq!(controller.position(), vector![0.0, 3.0, 0.0]);
        assert_eq!(controller.velocity(), Vector::zeros());
    }

    #[test]
    fn tiny_move_on_floor_keeps_ground_contact() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        for _ in 0..5 {
            controller.move_by(&world, vector![0.0, -0.1, 0.0], DT);
        }
        assert!(controller.is_grounded());
        let rest = controller.position();

        let flags = controller.move_by(&world, vector![0.0, -0.0005, 0.0], DT);
        assert_eq!(controller.position(), rest);
        assert!(controller.is_grounded());
        assert!(flags.below);
        assert!(!flags.sides && !flags.above);
    }

    #[test]
    fn pulled_move_climbs_ledge_below_step_offset() {
        let mut world = floor_world();
        let ledge = ColliderBuilder::cuboid(2.0, 0.1, 2.0)
            .translation(vector![0.0, 0.1, 3.0])
            .build();
        world.insert_static_collider(ledge);
        world.refresh_queries();

        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        for _ in 0..90 {
            controller.move_by(&world, vector![0.0, -10.0 * DT, 0.05], DT);
        }
        let position = controller.position();
        assert!(position.z > 1.5, "stuck at {:?}", position);
        assert!(position.y > 1.15, "not on ledge: {:?}", position);
        assert!(controller.is_grounded());
    }

    #[test]
    fn ledge_above_step_offset_blocks() {
        let mut world = floor_world();
        let ledge = ColliderBuilder::cuboid(2.0, 0.3, 2.0)
            .translation(vector![0.0, 0.3, 3.0])
            .build();
        world.insert_static_collider(ledge);
        world.refresh_queries();

        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        for _ in 0..90 {
            controller.move_by(&world, vector![0.0, -10.0 * DT, 0.05], DT);
        }
        let position = controller.position();
        assert!(position.z < 0.6, "passed through at {:?}", position);
        assert!(position.y < 1.2);
    }

    #[test]
    fn teleport_clears_contact_state() {
        let world = floor_world();
        let mut controller = CharacterController::new(CollisionProfile::default(), vector![0.0, 1.05, 0.0]);
        controller.move_by(&world, vector![0.0, -0.1, 0.0], DT);
        controller.teleport(vector![2.0, 5.0, 0.0]);
        assert!(!controller.is_grounded());
        assert!(controller.collision_flags().is_none());
        assert_eq!(controller.position(), vector![2.0, 5.0, 0.0]);
    }
}
