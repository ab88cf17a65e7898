#![forbid(unsafe_code)]

//! Blinks a simulated LED with a periodic timer and stops it with a one-shot timer that is
//! phase-locked to the blink cycle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use timer_array::{SimTimer, Timer, TimerArrayConfig, TimerArrayControl};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "timer-array-blinky",
    about = "Toggle a simulated LED from a timer array and stop it after a fixed number of blink cycles."
)]
struct Args {
    /// Input clock of the counter peripheral
    #[arg(long, value_name = "HZ", default_value_t = 84_000_000)]
    input_hz: u32,

    /// Counter tick rate; the prescaler is input_hz / tick_hz
    #[arg(long, value_name = "HZ", default_value_t = 10_000)]
    tick_hz: u32,

    /// Counter width (16 or 32)
    #[arg(long, value_name = "BITS", default_value_t = 16)]
    counter_bits: u32,

    /// LED toggle period
    #[arg(long, value_name = "MS", default_value_t = 500)]
    toggle_ms: u64,

    /// Delay of the stop timer, counted from the first toggle
    #[arg(long, value_name = "MS", default_value_t = 5_000)]
    stop_ms: u64,

    /// Simulated run time
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    run_ms: u64,
}

#[derive(Debug, Default)]
struct Led {
    on: AtomicBool,
    toggles: AtomicU32,
}

impl Led {
    fn toggle(&self) -> bool {
        self.toggles.fetch_add(1, Ordering::Relaxed);
        !self.on.fetch_xor(true, Ordering::Relaxed)
    }

    fn off(&self) {
        self.on.store(false, Ordering::Relaxed);
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let division = args
        .input_hz
        .checked_div(args.tick_hz)
        .ok_or_else(|| anyhow!("--tick-hz must be non-zero"))?;
    let config = TimerArrayConfig::new(args.input_hz, division, args.counter_bits);

    let sim = SimTimer::new(args.counter_bits);
    let mut control =
        TimerArrayControl::<_, 4>::new(sim.clone(), config).context("configure timer array")?;

    let tick_hz = config
        .validate_division()
        .with_context(|| format!("derive a {} Hz tick", args.tick_hz))?;
    let toggle_ticks = ticks(&config, "--toggle-ms", args.toggle_ms)?;
    let stop_ticks = ticks(&config, "--stop-ms", args.stop_ms)?;
    let run_ticks = args
        .run_ms
        .checked_mul(tick_hz as u64)
        .map(|ticks| ticks / 1_000)
        .ok_or_else(|| anyhow!("--run-ms {} is too long to simulate at {tick_hz} Hz", args.run_ms))?;

    let led = Arc::new(Led::default());

    let toggle_led = led.clone();
    let toggle = control.add_timer(Timer::with_context(toggle_ticks, true, move |ctx| {
        let on = toggle_led.toggle();
        info!(at = ctx.now(), on, "led toggled");
    }))?;

    let stop_led = led.clone();
    let stop = control.add_timer(Timer::with_context(stop_ticks, false, move |ctx| {
        if let Err(err) = ctx.detach(toggle) {
            warn!(%err, "toggle timer was not running");
        }
        stop_led.off();
        info!(at = ctx.now(), "blinking stopped");
    }))?;

    control.start().context("start timer array")?;
    control.attach(toggle).context("attach toggle timer")?;
    control
        .attach_synchronized(stop, toggle)
        .context("attach stop timer")?;

    let fired = control.run_for(run_ticks);
    info!(fired, elapsed_ticks = sim.elapsed_ticks(), "simulation finished");

    println!(
        "toggles={} led={} fired={}",
        led.toggles.load(Ordering::Relaxed),
        if led.is_on() { "on" } else { "off" },
        fired
    );
    Ok(())
}

fn ticks(config: &TimerArrayConfig, flag: &str, ms: u64) -> anyhow::Result<u32> {
    config
        .ticks_from_duration(Duration::from_millis(ms))
        .ok_or_else(|| {
            anyhow!(
                "{flag} {ms} does not fit a {}-bit counter at the configured tick rate",
                config.counter_bits
            )
        })
}
