//! Avatar movement motor (camera-relative facing, lateral move, gravity, jump).
//!
//! Conventions: +Y is up, forward is +Z, and yaw turns +Z toward +X.
#![forbid(unsafe_code)]

use rapier3d::math::{Rotation, Vector};
use rapier3d::prelude::Real;

/// Squared stick magnitude below which the avatar keeps its current facing.
pub const STICK_DEAD_ZONE_SQ: Real = 0.1;

const SLERP_EPSILON: Real = 1.0e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvatarMotorConfig {
    /// Lateral speed in m/s.
    pub speed: Real,
    /// Per-tick slerp factor toward the target facing, in `[0, 1]`.
    pub rotation_smoothing: Real,
    /// Downward speed applied while grounded so slopes keep contact.
    pub pull_strength: Real,
    /// Desired jump apex height in meters.
    pub jump_height: Real,
}

impl Default for AvatarMotorConfig {
    fn default() -> Self {
        Self {
            speed: 5.0,
            rotation_smoothing: 0.2,
            pull_strength: 10.0,
            jump_height: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MotorInput {
    pub move_axis: [Real; 2],
    pub jump_pressed: bool,
    pub aiming: bool,
    /// Camera yaw in radians.
    pub camera_yaw: Real,
}

#[derive(Clone, Copy, Debug)]
pub struct MotorState {
    pub rotation: Rotation<Real>,
    pub grounded: bool,
    pub velocity: Vector<Real>,
}

#[derive(Clone, Copy, Debug)]
pub struct MotorContext {
    pub dt: Real,
    pub gravity: Vector<Real>,
}

#[derive(Clone, Copy, Debug)]
pub struct MotorOutput {
    pub rotation: Rotation<Real>,
    /// Summed lateral, gravity and jump velocity for this tick.
    pub move_velocity: Vector<Real>,
    pub desired_translation: Vector<Real>,
    /// The pending jump press was spent this tick.
    pub jumped: bool,
}

pub struct AvatarMotor {
    config: AvatarMotorConfig,
    was_grounded_last_frame: bool,
}

impl AvatarMotor {
    pub fn new(config: AvatarMotorConfig) -> Self {
        Self {
            config,
            was_grounded_last_frame: false,
        }
    }

    pub fn config(&self) -> AvatarMotorConfig {
        self.config
    }

    pub fn config_mut(&mut self) -> &mut AvatarMotorConfig {
        &mut self.config
    }

    pub fn was_grounded_last_frame(&self) -> bool {
        self.was_grounded_last_frame
    }

    pub fn reset_state(&mut self) {
        self.was_grounded_last_frame = false;
    }

    pub fn step(&mut self, input: MotorInput, state: MotorState, ctx: MotorContext) -> MotorOutput {
        let dt = ctx.dt.max(0.0);
        let mut rotation = state.rotation;
        let mut move_velocity = Vector::zeros();

        if axis_length_sq(input.move_axis) >= STICK_DEAD_ZONE_SQ || input.aiming {
            rotation = target_rotation(
                state.rotation,
                input.camera_yaw,
                input.move_axis,
                self.config.rotation_smoothing,
            );
            move_velocity = lateral_movement(rotation, input.move_axis, self.config.speed);
        }

        move_velocity += gravity_term(
            self.config.pull_strength,
            state.grounded,
            input.jump_pressed,
            self.was_grounded_last_frame,
            state.velocity.y,
            ctx.gravity,
            dt,
        );
        let jump = jump_force(
            self.config.jump_height,
            state.grounded,
            input.jump_pressed,
            ctx.gravity,
        );
        let jumped = jump.is_some();
        if let Some(impulse) = jump {
            move_velocity += impulse;
        }
        self.was_grounded_last_frame = state.grounded;

        MotorOutput {
            rotation,
            move_velocity,
            desired_translation: move_velocity * dt,
            jumped,
        }
    }
}

/// Facing for the stick direction relative to the camera, slerped from `current`.
pub fn target_rotation(
    current: Rotation<Real>,
    camera_yaw: Real,
    axis: [Real; 2],
    smoothing: Real,
) -> Rotation<Real> {
    let stick_angle = axis[0].atan2(axis[1]);
    let target = yaw_rotation(stick_angle + camera_yaw);
    let t = smoothing.clamp(0.0, 1.0);
    current
        .try_slerp(&target, t, SLERP_EPSILON)
        .unwrap_or(target)
}

pub fn lateral_movement(rotation: Rotation<Real>, axis: [Real; 2], speed: Real) -> Vector<Real> {
    if axis_length_sq(axis) == 0.0 {
        return Vector::zeros();
    }
    rotation * Vector::z() * speed
}

pub fn gravity_term(
    pull_strength: Real,
    grounded: bool,
    jump_pressed: bool,
    was_grounded_last_frame: bool,
    velocity_y: Real,
    gravity: Vector<Real>,
    dt: Real,
) -> Vector<Real> {
    if grounded && !jump_pressed {
        return Vector::new(0.0, -pull_strength, 0.0);
    }
    if was_grounded_last_frame && velocity_y < 0.0 {
        return Vector::zeros();
    }
    Vector::new(0.0, velocity_y, 0.0) + gravity * dt
}

/// Launch velocity reaching `jump_height` under `gravity`: `sqrt(h * -2 * g.y)`.
///
/// Returns `None` when no jump happens this tick. Non-downward gravity yields a
/// zero impulse but still spends the press.
pub fn jump_force(
    jump_height: Real,
    grounded: bool,
    jump_pressed: bool,
    gravity: Vector<Real>,
) -> Option<Vector<Real>> {
    if !(grounded && jump_pressed) {
        return None;
    }
    let vertical = (jump_height.max(0.0) * -2.0 * gravity.y).max(0.0).sqrt();
    Some(Vector::new(0.0, vertical, 0.0))
}

pub fn yaw_rotation(yaw: Real) -> Rotation<Real> {
    Rotation::from_axis_angle(&Vector::y_axis(), yaw)
}

/// Yaw of `rotation`'s forward axis projected on the ground plane.
pub fn yaw_of(rotation: Rotation<Real>) -> Real {
    let forward = rotation * Vector::z();
    forward.x.atan2(forward.z)
}

fn axis_length_sq(axis: [Real; 2]) -> Real {
    axis[0] * axis[0] + axis[1] * axis[1]
}
