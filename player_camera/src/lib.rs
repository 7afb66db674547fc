//! Third-person follow camera; its yaw defines "forward" for stick input.
#![forbid(unsafe_code)]

use std::f32::consts::TAU;

use rapier3d::math::Vector;
use rapier3d::prelude::Real;

const PITCH_LIMIT: Real = 1.54;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    /// Orbit distance from the look target in meters.
    pub distance: Real,
    /// Look target height above the avatar origin.
    pub height: Real,
    pub min_pitch: Real,
    pub max_pitch: Real,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            distance: 4.0,
            height: 1.5,
            min_pitch: -1.2,
            max_pitch: 1.2,
        }
    }
}

impl CameraRig {
    fn clamp_pitch(&self, pitch: Real) -> Real {
        let min = self.min_pitch.max(-PITCH_LIMIT);
        let max = self.max_pitch.min(PITCH_LIMIT).max(min);
        pitch.clamp(min, max)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CameraPose {
    pub eye: Vector<Real>,
    pub target: Vector<Real>,
    pub yaw: Real,
    pub pitch: Real,
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerCamera {
    rig: CameraRig,
    yaw: Real,
    pitch: Real,
    eye: Vector<Real>,
    target: Vector<Real>,
}

impl PlayerCamera {
    pub fn new(rig: CameraRig) -> Self {
        Self {
            rig,
            yaw: 0.0,
            pitch: 0.0,
            eye: Vector::zeros(),
            target: Vector::zeros(),
        }
    }

    pub fn rig(&self) -> CameraRig {
        self.rig
    }

    pub fn yaw(&self) -> Real {
        self.yaw
    }

    /// Yaw in degrees normalised to `[0, 360)`.
    pub fn yaw_degrees(&self) -> Real {
        let degrees = self.yaw.rem_euclid(TAU).to_degrees();
        if degrees >= 360.0 {
            0.0
        } else {
            degrees
        }
    }

    pub fn pitch(&self) -> Real {
        self.pitch
    }

    pub fn set_look(&mut self, yaw: Real, pitch: Real) {
        self.yaw = yaw;
        self.pitch = self.rig.clamp_pitch(pitch);
    }

    pub fn apply_look_delta(&mut self, delta: [Real; 2]) {
        self.yaw += delta[0];
        self.pitch = self.rig.clamp_pitch(self.pitch + delta[1]);
    }

    /// Horizontal view direction; yaw 0 looks down +Z.
    pub fn forward(&self) -> Vector<Real> {
        Vector::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn update_from_target(&mut self, origin: Vector<Real>) -> CameraPose {
        self.target = origin + Vector::new(0.0, self.rig.height, 0.0);
        let back = -self.forward() * self.pitch.cos();
        let lift = Vector::new(0.0, self.pitch.sin(), 0.0);
        self.eye = self.target + (back + lift) * self.rig.distance;
        self.pose()
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            eye: self.eye,
            target: self.target,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}
