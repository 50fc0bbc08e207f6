use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::app::LOOP_PERIOD_MS;
use crate::config::model::DeviceConfig;
use crate::tick::TICKS_PERIOD;
use crate::time_provider::TimeSource;

const BENCHMARK_LENGTH: Duration = Duration::from_secs(1);
pub const LOOP_STATS_WINDOW: usize = 128;

/// Iteration timing for the cooperative main loop, kept by the running app
/// and by the cadence benchmark below.
pub struct LoopStats {
    total_iterations: u64,
    overruns: u64,
    last_iteration: Duration,
    target: Duration,
    window: VecDeque<Duration>,
    window_size: usize,
    histogram: [u64; 5],
}

impl LoopStats {
    pub fn new(window_size: usize, target: Duration) -> Self {
        Self {
            total_iterations: 0,
            overruns: 0,
            last_iteration: Duration::ZERO,
            target,
            window: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            histogram: [0; 5],
        }
    }

    pub fn record_iteration(&mut self, elapsed: Duration) {
        self.total_iterations += 1;
        self.last_iteration = elapsed;
        if elapsed > self.target {
            self.overruns += 1;
        }

        if self.window.len() == self.window_size {
            let _ = self.window.pop_front();
        }
        self.window.push_back(elapsed);
        self.update_histogram(elapsed);
    }

    pub fn last_rate_hz(&self) -> f64 {
        if self.last_iteration.is_zero() {
            return 0.0;
        }
        1.0 / self.last_iteration.as_secs_f64()
    }

    pub fn rolling_rate_hz(&self) -> f64 {
        let total_secs: f64 = self.window.iter().map(Duration::as_secs_f64).sum();
        if total_secs == 0.0 {
            return 0.0;
        }
        self.window.len() as f64 / total_secs
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn total_iterations(&self) -> u64 {
        self.total_iterations
    }

    pub fn histogram(&self) -> [u64; 5] {
        self.histogram
    }

    fn update_histogram(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1_000.0;
        let bucket = if ms <= 10.5 {
            0
        } else if ms <= 12.0 {
            1
        } else if ms <= 15.0 {
            2
        } else if ms <= 20.0 {
            3
        } else {
            4
        };
        self.histogram[bucket] += 1;
    }
}

pub fn run_diagnostics(config: &DeviceConfig, clock: &dyn TimeSource) -> Result<()> {
    let timing = &config.timing;
    println!("LiveWatch diagnostics");
    println!("Account: {}", config.account);
    println!("Status endpoint: {}", config.api.streams_url);
    println!("Poll interval: {} ms", timing.poll_interval_ms);
    if timing.break_reminders {
        println!("Break reminders: every {} ms", timing.break_delay_ms);
    } else {
        println!("Break reminders: off");
    }
    println!("Maintenance restart after: {} ms", timing.reboot_delay_ms);
    println!("Fatal restart delay: {} s", timing.fatal_restart_delay_s);
    println!("Tick period: {TICKS_PERIOD} ms");
    println!("Current tick: {}", clock.ticks());
    match clock.check_synchronized() {
        Ok(()) => println!("Clock sync: ok (epoch {})", clock.epoch_seconds()),
        Err(err) => println!("Clock sync: {} ({err})", err.display_code()),
    }

    println!("Running 1 second loop cadence benchmark...");
    let target = Duration::from_millis(LOOP_PERIOD_MS);
    let mut stats = LoopStats::new(LOOP_STATS_WINDOW, target);
    let bench_end = Instant::now() + BENCHMARK_LENGTH;
    while Instant::now() < bench_end {
        let start = Instant::now();
        let _ = clock.ticks();
        clock.sleep_ms(LOOP_PERIOD_MS);
        stats.record_iteration(start.elapsed());
    }

    println!("Benchmark summary:");
    println!("  Iterations: {}", stats.total_iterations());
    println!("  Overruns: {}", stats.overruns());
    println!("  Last rate: {:.1} Hz", stats.last_rate_hz());
    println!("  Rolling rate: {:.1} Hz", stats.rolling_rate_hz());
    println!("  Iteration histogram buckets (<=10.5, <=12, <=15, <=20, >20 ms):");
    println!("  {:?}", stats.histogram());
    Ok(())
}
