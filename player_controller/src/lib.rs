//! Player controller composition (input actions + motor + capsule + camera + animator).
#![forbid(unsafe_code)]

pub mod animator;
pub mod input;

use avatar_motor::{AvatarMotor, AvatarMotorConfig, MotorContext, MotorInput, MotorState};
use character_collision::{CharacterController, CollisionFlags, CollisionProfile};
use log::debug;
use physics_rapier::PhysicsWorld;
use player_camera::{CameraPose, PlayerCamera};
use rapier3d::math::{Rotation, Vector};
use rapier3d::prelude::Real;

pub use animator::{AnimatorParameters, AnimatorSink, NullAnimator};
pub use input::{Action, ActionChange, ActionState, InputEvent};

#[derive(Clone, Copy, Debug)]
pub struct PlayerFrame {
    pub position: Vector<Real>,
    pub rotation: Rotation<Real>,
    pub velocity: Vector<Real>,
    pub grounded: bool,
    /// World-space displacement produced by this tick.
    pub position_delta: Vector<Real>,
    pub flags: CollisionFlags,
    pub camera: CameraPose,
    pub jumped: bool,
}

pub struct PlayerController<S: AnimatorSink> {
    input: ActionState,
    motor: AvatarMotor,
    character: CharacterController,
    camera: PlayerCamera,
    animator: S,
}

impl<S: AnimatorSink> PlayerController<S> {
    pub fn new(
        motor: AvatarMotorConfig,
        profile: CollisionProfile,
        camera: PlayerCamera,
        position: Vector<Real>,
        animator: S,
    ) -> Self {
        Self {
            input: ActionState::default(),
            motor: AvatarMotor::new(motor),
            character: CharacterController::new(profile, position),
            camera,
            animator,
        }
    }

    pub fn input(&self) -> &ActionState {
        &self.input
    }

    pub fn motor(&self) -> &AvatarMotor {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut AvatarMotor {
        &mut self.motor
    }

    pub fn character(&self) -> &CharacterController {
        &self.character
    }

    pub fn character_mut(&mut self) -> &mut CharacterController {
        &mut self.character
    }

    pub fn camera(&self) -> &PlayerCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut PlayerCamera {
        &mut self.camera
    }

    pub fn animator(&self) -> &S {
        &self.animator
    }

    pub fn handle(&mut self, action: Action, event: InputEvent) {
        let grounded = self.character.is_grounded();
        match self.input.apply(action, event, grounded) {
            ActionChange::Aiming(aiming) => self.animator.set_bool(animator::IS_AIMING, aiming),
            ActionChange::None => {}
        }
    }

    pub fn tick(&mut self, world: &PhysicsWorld, dt: Real) -> PlayerFrame {
        let look_delta = self.input.take_look_delta();
        self.camera.apply_look_delta(look_delta);

        let old_position = self.character.position();
        let was_grounded = self.character.is_grounded();
        let output = self.motor.step(
            MotorInput {
                move_axis: self.input.move_direction,
                jump_pressed: self.input.jump_pressed,
                aiming: self.input.aiming,
                camera_yaw: self.camera.yaw(),
            },
            MotorState {
                rotation: self.character.rotation(),
                grounded: was_grounded,
                velocity: self.character.velocity(),
            },
            MotorContext {
                dt,
                gravity: world.gravity,
            },
        );
        self.character.set_rotation(output.rotation);
        if output.jumped {
            self.input.jump_pressed = false;
            debug!("jump: launch speed {:.3}", output.move_velocity.y);
        }

        let flags = self
            .character
            .move_by(world, output.desired_translation, dt);
        let grounded = self.character.is_grounded();
        if grounded != was_grounded {
            if grounded {
                debug!("landed at {:?}", self.character.position());
            } else {
                debug!("left ground at {:?}", self.character.position());
            }
        }

        self.animator
            .set_float(animator::FORWARD_SPEED, self.input.move_direction[1]);
        self.animator
            .set_float(animator::LATERAL_SPEED, self.input.move_direction[0]);

        let position = self.character.position();
        let camera = self.camera.update_from_target(position);
        PlayerFrame {
            position,
            rotation: output.rotation,
            velocity: self.character.velocity(),
            grounded,
            position_delta: position - old_position,
            flags,
            camera,
            jumped: output.jumped,
        }
    }
}
