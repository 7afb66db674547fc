//! Animator parameter binding.

use std::collections::HashMap;

use rapier3d::prelude::Real;

pub const FORWARD_SPEED: &str = "ForwardSpeed";
pub const LATERAL_SPEED: &str = "LateralSpeed";
pub const IS_AIMING: &str = "IsAiming";

pub trait AnimatorSink {
    fn set_float(&mut self, name: &str, value: Real);
    fn set_bool(&mut self, name: &str, value: bool);
}

#[derive(Clone, Debug, Default)]
pub struct AnimatorParameters {
    floats: HashMap<String, Real>,
    bools: HashMap<String, bool>,
}

impl AnimatorParameters {
    pub fn float(&self, name: &str) -> Option<Real> {
        self.floats.get(name).copied()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }
}

impl AnimatorSink for AnimatorParameters {
    fn set_float(&mut self, name: &str, value: Real) {
        self.floats.insert(name.to_string(), value);
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(name.to_string(), value);
    }
}

/// Discards every parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAnimator;

impl AnimatorSink for NullAnimator {
    fn set_float(&mut self, _name: &str, _value: Real) {}

    fn set_bool(&mut self, _name: &str, _value: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_frame(sink: &mut impl AnimatorSink) {
        sink.set_float(FORWARD_SPEED, 0.75);
        sink.set_float(LATERAL_SPEED, -0.25);
        sink.set_bool(IS_AIMING, true);
    }

    #[test]
    fn parameters_keep_latest_values() {
        let mut params = AnimatorParameters::default();
        assert_eq!(params.float(FORWARD_SPEED), None);
        push_frame(&mut params);
        params.set_float(FORWARD_SPEED, 1.0);
        assert_eq!(params.float(FORWARD_SPEED), Some(1.0));
        assert_eq!(params.float(LATERAL_SPEED), Some(-0.25));
        assert_eq!(params.bool(IS_AIMING), Some(true));
        assert_eq!(params.bool(FORWARD_SPEED), None);
    }

    #[test]
    fn null_animator_accepts_everything() {
        let mut sink = NullAnimator;
        push_frame(&mut sink);
    }
}
