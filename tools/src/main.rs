use std::path::{Path, PathBuf};

use avatar_config::{AvatarConfig, ConfigError, Scenario};
use clap::{Parser, Subcommand};
use log::{info, warn};
use physics_rapier::PhysicsWorld;
use player_camera::PlayerCamera;
use player_controller::{NullAnimator, PlayerController, PlayerFrame};
use rapier3d::math::Vector;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_INVALID: i32 = 3;
const EXIT_IO: i32 = 4;

#[derive(Parser)]
#[command(name = "avatar-tools", version, about = "Avatar controller tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an avatar config file.
    Check {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },
    /// Print the default config as TOML.
    Defaults,
    /// Replay scripted input against a flat floor.
    Simulate(SimulateArgs),
}

#[derive(Parser)]
struct SimulateArgs {
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    scenario: Option<PathBuf>,

    /// Overrides the scenario tick count.
    #[arg(long)]
    ticks: Option<u32>,

    /// Overrides the scenario tick duration in seconds.
    #[arg(long)]
    dt: Option<f32>,

    /// Print one line per tick.
    #[arg(long)]
    trace: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Defaults => run_defaults(),
        Commands::Simulate(args) => run_simulate(args),
    };
    std::process::exit(exit_code);
}

fn run_check(path: &Path) -> i32 {
    let config = match read_config(path) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let validation = config.validate();
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }
    for error in &validation.errors {
        println!("error: {}", error);
    }
    if validation.is_ok() {
        println!("config ok: {}", path.display());
        EXIT_SUCCESS
    } else {
        EXIT_INVALID
    }
}

fn run_defaults() -> i32 {
    match AvatarConfig::default().to_toml() {
        Ok(text) => {
            print!("{}", text);
            EXIT_SUCCESS
        }
        Err(err) => {
            eprintln!("serialize failed: {}", err);
            EXIT_IO
        }
    }
}

fn run_simulate(args: SimulateArgs) -> i32 {
    let config = match &args.config {
        Some(path) => match AvatarConfig::load(path) {
            Ok(config) => config,
            Err(err) => return report_load_error(path, err),
        },
        None => AvatarConfig::default(),
    };
    let mut scenario = match &args.scenario {
        Some(path) => match Scenario::load(path) {
            Ok(scenario) => scenario,
            Err(err) => return report_load_error(path, err),
        },
        None => Scenario::default(),
    };
    if let Some(ticks) = args.ticks {
        scenario.ticks = ticks;
    }
    if let Some(dt) = args.dt {
        if !dt.is_finite() || dt <= 0.0 {
            eprintln!("--dt must be a positive number");
            return EXIT_USAGE;
        }
        scenario.dt = dt;
    }

    let [gx, gy, gz] = config.world.gravity;
    let mut world = PhysicsWorld::new(Vector::new(gx, gy, gz));
    world.insert_floor(config.world.floor_half_extent);
    world.refresh_queries();

    let mut camera = PlayerCamera::new(config.camera_rig());
    camera.set_look(config.camera.initial_yaw_deg.to_radians(), 0.0);
    let [sx, sy, sz] = config.world.spawn;
    let mut controller = PlayerController::new(
        config.motor_config(),
        config.collision_profile(),
        camera,
        Vector::new(sx, sy, sz),
        NullAnimator,
    );

    info!(
        "simulating {} ticks at dt={:.4} ({})",
        scenario.ticks,
        scenario.dt,
        scenario.name.as_deref().unwrap_or("unnamed")
    );
    let mut summary = RunSummary::default();
    for tick in 0..scenario.ticks {
        for event in scenario.events_at(tick) {
            match event.action() {
                Some(action) => controller.handle(action, event.input_event()),
                None => warn!("tick {}: skipping unknown action '{}'", tick, event.action),
            }
        }
        let frame = controller.tick(&world, scenario.dt);
        summary.record(&frame);
        if args.trace {
            print_trace(tick, &frame);
        }
    }

    let position = controller.character().position();
    println!(
        "final position: ({:.3}, {:.3}, {:.3})",
        position.x, position.y, position.z
    );
    println!("distance travelled: {:.3}", summary.distance);
    println!("max height: {:.3}", summary.max_height);
    println!("jumps: {}  landings: {}", summary.jumps, summary.landings);
    println!("grounded at end: {}", controller.character().is_grounded());
    EXIT_SUCCESS
}

fn read_config(path: &Path) -> Result<AvatarConfig, i32> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {}: {}", path.display(), err);
            return Err(EXIT_IO);
        }
    };
    AvatarConfig::parse_toml(&text).map_err(|err| report_load_error(path, err))
}

fn report_load_error(path: &Path, err: ConfigError) -> i32 {
    eprintln!("{}: {}", path.display(), err);
    match err {
        ConfigError::Invalid(_) => EXIT_INVALID,
        ConfigError::Io(_) | ConfigError::Parse(_) | ConfigError::Serialize(_) => EXIT_IO,
    }
}

fn print_trace(tick: u32, frame: &PlayerFrame) {
    println!(
        "{:>5} pos=({:>8.3},{:>8.3},{:>8.3}) vel=({:>7.3},{:>7.3},{:>7.3}) grounded={} jumped={}",
        tick,
        frame.position.x,
        frame.position.y,
        frame.position.z,
        frame.velocity.x,
        frame.velocity.y,
        frame.velocity.z,
        frame.grounded,
        frame.jumped
    );
}

#[derive(Default)]
struct RunSummary {
    distance: f32,
    max_height: f32,
    jumps: u32,
    landings: u32,
    was_grounded: Option<bool>,
}

impl RunSummary {
    fn record(&mut self, frame: &PlayerFrame) {
        self.distance += frame.position_delta.norm();
        self.max_height = self.max_height.max(frame.position.y);
        if frame.jumped {
            self.jumps += 1;
        }
        if frame.grounded && self.was_grounded == Some(false) {
            self.landings += 1;
        }
        self.was_grounded = Some(frame.grounded);
    }
}
