use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use tokio::time::{interval, Duration, MissedTickBehavior};

use arcade_dynamics::script::InputScript;
use arcade_dynamics::{PhysicsWorld, VehicleConfig};

const PLAYER: &str = "player";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Bike,
    Car,
}

#[derive(Parser, Debug)]
#[command(name = "arcade-sim", about = "Headless fixed-tick vehicle simulation, JSON lines on stdout")]
struct Cli {
    /// Built-in tuning preset
    #[arg(long, value_enum, default_value_t = Preset::Bike)]
    vehicle: Preset,

    /// JSON tuning file, overrides --vehicle
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON input script; the built-in demo runs when absent
    #[arg(long)]
    script: Option<PathBuf>,

    /// Ticks to run (defaults to the script length)
    #[arg(long)]
    ticks: Option<u64>,

    /// Fixed tick rate
    #[arg(long, default_value_t = 50.0)]
    hz: f32,

    /// Run as fast as possible instead of pacing to wall clock
    #[arg(long)]
    fast: bool,

    /// Seed for collision kicks
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let period = tick_period(cli.hz)?;

    let config = match &cli.config {
        Some(path) => VehicleConfig::from_path(path)
            .with_context(|| format!("loading vehicle config {}", path.display()))?,
        None => match cli.vehicle {
            Preset::Bike => VehicleConfig::sport_bike(),
            Preset::Car => VehicleConfig::hatchback(),
        },
    };

    let script = match &cli.script {
        Some(path) => InputScript::from_path(path)
            .with_context(|| format!("loading input script {}", path.display()))?,
        None => InputScript::demo(),
    };
    let ticks = cli.ticks.unwrap_or_else(|| script.total_ticks());

    let mut world = PhysicsWorld::with_seed(cli.seed);
    world.spawn_vehicle(PLAYER, config, [0.0, 1.5, 0.0])?;

    let dt = 1.0 / cli.hz;
    info!("running {} ticks at {} Hz", ticks, cli.hz);

    // only paced runs need a wall-clock ticker
    let mut ticker = (!cli.fast).then(|| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        ticker
    });

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for tick in 0..ticks {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        world.set_input(PLAYER, script.input_at(tick))?;
        let snapshot = world.step(dt);
        writeln!(out, "{}", snapshot.to_json_line()?)?;
    }
    out.flush()?;

    let (position, _) = world.vehicle_pose(PLAYER)?;
    info!("done after {} ticks, final position ({:.2}, {:.2}, {:.2})", world.tick, position.x, position.y, position.z);
    Ok(())
}

/// Wall-clock period of one tick. tokio's `interval` panics on a zero period.
fn tick_period(hz: f32) -> Result<Duration> {
    anyhow::ensure!(hz.is_finite() && hz > 0.0, "--hz must be positive, got {}", hz);
    let period = Duration::try_from_secs_f32(1.0 / hz).unwrap_or_default();
    anyhow::ensure!(!period.is_zero(), "--hz {} has no representable tick period", hz);
    Ok(period)
}
