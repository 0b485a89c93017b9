//! bomber-sim: headless driver that flies a scripted sortie and logs what happens.
//!
//! ```text
//! bomber-sim [--seconds N] [--config PATH] [--inline]
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use engine_core::Time;
use game::{LogSink, SimConfig, Simulation, WorkerMode};
use input::{InputState, KeyCode};

/// Target frame pacing; each tick still consumes the measured wall time.
const FRAME_BUDGET: Duration = Duration::from_millis(33);

struct Args {
    seconds: f32,
    config: PathBuf,
    inline: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        seconds: 60.0,
        config: PathBuf::from("sim.ron"),
        inline: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--seconds" => {
                let value = it.next().context("--seconds needs a value")?;
                args.seconds = value
                    .parse()
                    .with_context(|| format!("invalid --seconds value {:?}", value))?;
            }
            "--config" => {
                args.config = it.next().context("--config needs a path")?.into();
            }
            "--inline" => args.inline = true,
            other => bail!("unknown argument {:?}", other),
        }
    }
    Ok(args)
}

/// Keys for the sortie at time `t`: weave across the city, bomb every few
/// seconds, fire at defenses and drop flares on a timer. `dt` is the last
/// tick's length, so each timer fires once per period.
fn script(t: f32, dt: f32, input: &mut InputState) {
    let every = |period: f32| dt > 0.0 && (t % period) < dt;
    let hold = |input: &mut InputState, key: KeyCode, on: bool| {
        if on {
            input.press(key);
        } else {
            input.release(key);
        }
    };

    let leg = t % 40.0;
    hold(input, KeyCode::KeyA, (12.0..16.0).contains(&leg));
    hold(input, KeyCode::KeyD, (28.0..32.0).contains(&leg));
    hold(input, KeyCode::KeyS, (4.0..7.0).contains(&leg));
    hold(input, KeyCode::KeyW, (20.0..22.0).contains(&leg));

    if every(3.0) {
        input.trigger_bomb_key_press();
    }
    if every(11.0) {
        input.trigger_missile_key_press();
    }
    if every(7.0) {
        input.press(KeyCode::KeyF);
        input.release(KeyCode::KeyF);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let mut config = SimConfig::load_or_default(&args.config);
    if args.inline {
        config.workers.terrain = WorkerMode::Inline;
        config.workers.physics = WorkerMode::Inline;
    }

    log::info!("Starting bomber-sim: {:.0}s sortie", args.seconds);
    let mut sim = Simulation::new(config);
    let mut input = InputState::new();
    let mut sink = LogSink::new(0);
    let mut hud = LogSink::new(150);

    let started = Instant::now();
    let mut clock = Time::new(sim.config().timing.max_dt);
    let mut last_dt = 0.0;
    while sim.now() < args.seconds as f64 {
        let frame_start = Instant::now();
        script(sim.now() as f32, last_dt, &mut input);
        last_dt = clock.update();
        sim.tick(last_dt, &mut input, &mut sink, &mut hud);
        input.begin_frame();
        // Spend the rest of the frame waiting on the chunk worker.
        if let Some(rest) = FRAME_BUDGET.checked_sub(frame_start.elapsed()) {
            sim.terrain_mut().wait_for_worker(rest);
        }
        if let Some(rest) = FRAME_BUDGET.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
        if sim.bomber().is_down() {
            log::warn!("Sortie ended early: bomber down at t={:.1}s", sim.now());
            break;
        }
    }

    let stats = sim.stats();
    let terrain = sim.terrain();
    log::info!(
        "Sortie over after {:.1}s simulated ({:.2}s wall, physics {})",
        sim.now(),
        started.elapsed().as_secs_f32(),
        if sim.physics_threaded() { "threaded" } else { "inline" }
    );
    log::info!(
        "  chunks resident {} ({} pending), bomber at {:.0}, hull {:.0}%",
        terrain.chunk_count(),
        terrain.pending_count(),
        sim.bomber().position(),
        sim.bomber().health().percentage() * 100.0
    );
    log::info!(
        "  cruise {} / SAMs {} / bombs {} / flares {}",
        stats.cruise_launched,
        stats.sams_fired,
        stats.bombs_dropped,
        stats.flares_deployed
    );
    log::info!(
        "  destroyed {} buildings ({} targets, {} launchers)",
        stats.buildings_destroyed,
        stats.targets_destroyed,
        stats.launchers_destroyed
    );
    let (hits, misses) = sim.query_cache_stats();
    log::info!("  radius queries: {} cached, {} scanned", hits, misses);
    Ok(())
}
