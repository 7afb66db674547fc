//! Avatar tuning and scripted-input scenarios (TOML).
#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use avatar_motor::AvatarMotorConfig;
use character_collision::CollisionProfile;
use log::warn;
use player_camera::CameraRig;
use player_controller::{Action, InputEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const AVATAR_CONFIG_VERSION: u32 = 1;
const SCENARIO_VERSION: u32 = 1;
const DEFAULT_SCENARIO_TICKS: u32 = 240;
const DEFAULT_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Clone, Debug, Default)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn require_finite(&mut self, name: &str, value: f32) -> bool {
        if value.is_finite() {
            true
        } else {
            self.errors.push(format!("{} must be finite", name));
            false
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub version: u32,
    pub motor: MotorSection,
    pub capsule: CapsuleSection,
    pub camera: CameraSection,
    pub world: WorldSection,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            version: AVATAR_CONFIG_VERSION,
            motor: MotorSection::default(),
            capsule: CapsuleSection::default(),
            camera: CameraSection::default(),
            world: WorldSection::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorSection {
    pub speed: f32,
    pub rotation_smoothing: f32,
    pub pull_strength: f32,
    pub jump_height: f32,
}

impl Default for MotorSection {
    fn default() -> Self {
        let motor = AvatarMotorConfig::default();
        Self {
            speed: motor.speed,
            rotation_smoothing: motor.rotation_smoothing,
            pull_strength: motor.pull_strength,
            jump_height: motor.jump_height,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsuleSection {
    pub radius: f32,
    pub height: f32,
    pub step_offset: f32,
    pub slope_limit_deg: f32,
    pub skin_width: f32,
    pub ground_snap_distance: f32,
    pub min_move_distance: f32,
}

impl Default for CapsuleSection {
    fn default() -> Self {
        let profile = CollisionProfile::default();
        Self {
            radius: profile.radius,
            height: profile.height,
            step_offset: profile.step_offset,
            slope_limit_deg: profile.slope_limit.to_degrees(),
            skin_width: profile.skin_width,
            ground_snap_distance: profile.ground_snap_distance,
            min_move_distance: profile.min_move_distance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub distance: f32,
    pub height: f32,
    pub min_pitch_deg: f32,
    pub max_pitch_deg: f32,
    pub initial_yaw_deg: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        let rig = CameraRig::default();
        Self {
            distance: rig.distance,
            height: rig.height,
            min_pitch_deg: rig.min_pitch.to_degrees(),
            max_pitch_deg: rig.max_pitch.to_degrees(),
            initial_yaw_deg: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub gravity: [f32; 3],
    pub floor_half_extent: f32,
    pub spawn: [f32; 3],
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            floor_half_extent: 50.0,
            spawn: [0.0, 1.5, 0.0],
        }
    }
}

impl AvatarConfig {
    pub fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Reads, parses and validates; warnings are logged, errors rejected.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::parse_toml(&text)?;
        let validation = config.validate();
        for warning in &validation.warnings {
            warn!("{}: {}", path.display(), warning);
        }
        if !validation.is_ok() {
            return Err(ConfigError::Invalid(validation.errors));
        }
        Ok(config)
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();
        if self.version != AVATAR_CONFIG_VERSION {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }

        let motor = &self.motor;
        if validation.require_finite("motor.speed", motor.speed) && motor.speed < 0.0 {
            validation.errors.push("motor.speed must be >= 0".to_string());
        }
        if validation.require_finite("motor.rotation_smoothing", motor.rotation_smoothing)
            && !(0.0..=1.0).contains(&motor.rotation_smoothing)
        {
            validation
                .errors
                .push("motor.rotation_smoothing must be within [0, 1]".to_string());
        }
        if motor.rotation_smoothing == 0.0 {
            validation
                .warnings
                .push("motor.rotation_smoothing is 0; the avatar never turns".to_string());
        }
        if validation.require_finite("motor.pull_strength", motor.pull_strength)
            && motor.pull_strength < 0.0
        {
            validation
                .errors
                .push("motor.pull_strength must be >= 0".to_string());
        }
        if validation.require_finite("motor.jump_height", motor.jump_height)
            && motor.jump_height < 0.0
        {
            validation
                .errors
                .push("motor.jump_height must be >= 0".to_string());
        }

        let capsule = &self.capsule;
        for (name, value) in [
            ("capsule.radius", capsule.radius),
            ("capsule.height", capsule.height),
        ] {
            if validation.require_finite(name, value) && value <= 0.0 {
                validation.errors.push(format!("{} must be > 0", name));
            }
        }
        for (name, value) in [
            ("capsule.step_offset", capsule.step_offset),
            ("capsule.skin_width", capsule.skin_width),
            ("capsule.ground_snap_distance", capsule.ground_snap_distance),
            ("capsule.min_move_distance", capsule.min_move_distance),
        ] {
            if validation.require_finite(name, value) && value < 0.0 {
                validation.errors.push(format!("{} must be >= 0", name));
            }
        }
        if validation.require_finite("capsule.slope_limit_deg", capsule.slope_limit_deg)
            && !(0.0..=90.0).contains(&capsule.slope_limit_deg)
        {
            validation
                .errors
                .push("capsule.slope_limit_deg must be within [0, 90]".to_string());
        }
        if capsule.height < capsule.radius * 2.0 {
            validation
                .warnings
                .push("capsule.height is below 2 * radius; capsule degenerates to a sphere".to_string());
        }
        if capsule.step_offset > capsule.height {
            validation
                .warnings
                .push("capsule.step_offset exceeds capsule height".to_string());
        }

        let camera = &self.camera;
        if validation.require_finite("camera.distance", camera.distance) && camera.distance < 0.0 {
            validation
                .errors
                .push("camera.distance must be >= 0".to_string());
        }
        validation.require_finite("camera.height", camera.height);
        validation.require_finite("camera.initial_yaw_deg", camera.initial_yaw_deg);
        if validation.require_finite("camera.min_pitch_deg", camera.min_pitch_deg)
            && validation.require_finite("camera.max_pitch_deg", camera.max_pitch_deg)
            && camera.min_pitch_deg > camera.max_pitch_deg
        {
            validation
                .errors
                .push("camera.min_pitch_deg must be <= camera.max_pitch_deg".to_string());
        }

        let world = &self.world;
        if world.gravity.iter().all(|value| value.is_finite()) {
            if world.gravity[1] >= 0.0 {
                validation
                    .warnings
                    .push("world.gravity does not point down; jumps are disabled".to_string());
            }
        } else {
            validation
                .errors
                .push("world.gravity must be finite".to_string());
        }
        if validation.require_finite("world.floor_half_extent", world.floor_half_extent)
            && world.floor_half_extent <= 0.0
        {
            validation
                .errors
                .push("world.floor_half_extent must be > 0".to_string());
        }
        if !world.spawn.iter().all(|value| value.is_finite()) {
            validation.errors.push("world.spawn must be finite".to_string());
        }
        validation
    }

    pub fn motor_config(&self) -> AvatarMotorConfig {
        AvatarMotorConfig {
            speed: self.motor.speed,
            rotation_smoothing: self.motor.rotation_smoothing.clamp(0.0, 1.0),
            pull_strength: self.motor.pull_strength,
            jump_height: self.motor.jump_height,
        }
    }

    pub fn collision_profile(&self) -> CollisionProfile {
        CollisionProfile {
            radius: self.capsule.radius,
            height: self.capsule.height,
            step_offset: self.capsule.step_offset,
            slope_limit: self.capsule.slope_limit_deg.to_radians(),
            skin_width: self.capsule.skin_width,
            ground_snap_distance: self.capsule.ground_snap_distance,
            min_move_distance: self.capsule.min_move_distance,
        }
    }

    pub fn camera_rig(&self) -> CameraRig {
        CameraRig {
            distance: self.camera.distance,
            height: self.camera.height,
            min_pitch: self.camera.min_pitch_deg.to_radians(),
            max_pitch: self.camera.max_pitch_deg.to_radians(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Performed,
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub tick: u32,
    pub action: String,
    pub phase: EventPhase,
    #[serde(default)]
    pub value: Option<[f32; 2]>,
}

impl ScenarioEvent {
    pub fn action(&self) -> Option<Action> {
        Action::parse(&self.action)
    }

    pub fn input_event(&self) -> InputEvent {
        match self.phase {
            EventPhase::Performed => match self.value {
                Some(value) => InputEvent::Performed(value),
                None => InputEvent::pressed(),
            },
            EventPhase::Canceled => InputEvent::Canceled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_scenario_version")]
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_scenario_ticks")]
    pub ticks: u32,
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

fn default_scenario_version() -> u32 {
    SCENARIO_VERSION
}

fn default_scenario_ticks() -> u32 {
    DEFAULT_SCENARIO_TICKS
}

fn default_dt() -> f32 {
    DEFAULT_DT
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            version: SCENARIO_VERSION,
            name: None,
            ticks: DEFAULT_SCENARIO_TICKS,
            dt: DEFAULT_DT,
            events: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        let mut scenario: Scenario = toml::from_str(text)?;
        scenario.events.sort_by_key(|event| event.tick);
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let scenario = Self::parse_toml(&text)?;
        let validation = scenario.validate();
        for warning in &validation.warnings {
            warn!("{}: {}", path.display(), warning);
        }
        if !validation.is_ok() {
            return Err(ConfigError::Invalid(validation.errors));
        }
        Ok(scenario)
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();
        if self.version != SCENARIO_VERSION {
            validation
                .errors
                .push(format!("unsupported scenario version {}", self.version));
        }
        if validation.require_finite("dt", self.dt) && self.dt <= 0.0 {
            validation.errors.push("dt must be > 0".to_string());
        }
        if self.ticks == 0 {
            validation.warnings.push("scenario runs zero ticks".to_string());
        }
        for (index, event) in self.events.iter().enumerate() {
            if event.action().is_none() {
                validation.errors.push(format!(
                    "events[{}]: unknown action '{}'",
                    index, event.action
                ));
            }
            if let Some(value) = event.value {
                if !value.iter().all(|v| v.is_finite()) {
                    validation
                        .errors
                        .push(format!("events[{}]: value must be finite", index));
                }
            }
            if event.tick >= self.ticks {
                validation.warnings.push(format!(
                    "events[{}]: tick {} is past the end of the run",
                    index, event.tick
                ));
            }
        }
        validation
    }

    /// Events scheduled for `tick`, in file order.
    pub fn events_at(&self, tick: u32) -> impl Iterator<Item = &ScenarioEvent> {
        self.events.iter().filter(move |event| event.tick == tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AvatarConfig::parse_toml("").expect("parse");
        assert_eq!(config, AvatarConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.motor_config(), AvatarMotorConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
version = 1

[motor]
speed = 7.5
jump_height = 1.2

[capsule]
slope_limit_deg = 30.0
"#;
        let config = AvatarConfig::parse_toml(text).expect("parse");
        assert_eq!(config.motor.speed, 7.5);
        assert_eq!(config.motor.rotation_smoothing, 0.2);
        let profile = config.collision_profile();
        assert!((profile.slope_limit - 30.0_f32.to_radians()).abs() < 1.0e-6);
        assert_eq!(profile.radius, 0.5);
    }

    #[test]
    fn rotation_smoothing_out_of_range_is_rejected() {
        let config = AvatarConfig::parse_toml("[motor]\nrotation_smoothing = 1.5\n").expect("parse");
        let validation = config.validate();
        assert!(!validation.is_ok());
        assert!(validation
            .errors
            .iter()
            .any(|err| err.contains("rotation_smoothing")));
        assert_eq!(config.motor_config().rotation_smoothing, 1.0);
    }

    #[test]
    fn upward_gravity_warns() {
        let config = AvatarConfig::parse_toml("[world]\ngravity = [0.0, 1.0, 0.0]\n").expect("parse");
        let validation = config.validate();
        assert!(validation.is_ok());
        assert!(!validation.warnings.is_empty());
    }

    #[test]
    fn bad_version_and_capsule_are_errors() {
        let text = "version = 9\n[capsule]\nradius = 0.0\nskin_width = -1.0\n";
        let validation = AvatarConfig::parse_toml(text).expect("parse").validate();
        assert_eq!(validation.errors.len(), 3);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = AvatarConfig::default();
        config.motor.speed = 3.25;
        config.world.spawn = [1.0, 2.0, 3.0];
        let text = config.to_toml().expect("serialize");
        let parsed = AvatarConfig::parse_toml(&text).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = AvatarConfig::parse_toml("[motor\nspeed = ").expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn scenario_events_are_sorted_and_converted() {
        let text = r#"
ticks = 120

[[events]]
tick = 30
action = "jump"
phase = "performed"

[[events]]
tick = 0
action = "move"
phase = "performed"
value = [0.0, 1.0]

[[events]]
tick = 90
action = "move"
phase = "canceled"
"#;
        let scenario = Scenario::parse_toml(text).expect("parse");
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.events[0].tick, 0);
        let first: Vec<_> = scenario.events_at(0).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].action(), Some(Action::Move));
        assert_eq!(first[0].input_event(), InputEvent::Performed([0.0, 1.0]));
        let jump: Vec<_> = scenario.events_at(30).collect();
        assert_eq!(jump[0].input_event(), InputEvent::pressed());
        assert_eq!(scenario.events_at(90).next().map(|e| e.input_event()), Some(InputEvent::Canceled));
        assert!((scenario.dt - DEFAULT_DT).abs() < 1.0e-9);
    }

    #[test]
    fn scenario_rejects_unknown_actions() {
        let text = "ticks = 10\n[[events]]\ntick = 20\naction = \"fire\"\nphase = \"performed\"\n";
        let validation = Scenario::parse_toml(text).expect("parse").validate();
        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.warnings.len(), 1);
    }
}
