//! The device main loop.
//!
//! One owned state object drives everything from a single thread. Each
//! iteration runs in a fixed order: inputs, scheduled maintenance, status
//! poll, transition handling, live rendering. Input is only observed at the
//! top of an iteration and inside the reveal's scrambling phase.

use std::time::Duration;

use rand_pcg::Mcg128Xsl64;

use crate::breaks::indicator_strip;
use crate::config::model::DeviceConfig;
use crate::diagnostics::{LOOP_STATS_WINDOW, LoopStats};
use crate::error::DeviceError;
use crate::peripherals::{Button, ButtonAction, Peripherals, Rgb, STRIP_LEN};
use crate::reboot::{
    self, MANUAL_REBOOT_DELAY_S, RebootScheduler, Restart, SCHEDULED_REBOOT_DELAY_S,
};
use crate::reveal::{
    REVEAL_POSITIONS, REVEAL_TARGET, RevealAnimation, RevealOutcome, RevealSpec,
};
use crate::session::{LiveSessionTracker, Transition, format_live_duration};
use crate::status::scheduler::StatusScheduler;
use crate::status::{StatusClient, StatusReport};
use crate::tick::Tick;

pub const LOOP_PERIOD_MS: u64 = 10;
pub const MESSAGE_HOLD_MS: u64 = 1_000;

const PRESS_CUE: (u32, u64) = (880, 20);
const RELEASE_CUE: (u32, u64) = (120, 20);
const GOODBYE_STEP_MS: u64 = 500;
const GOODBYE_CUE_MS: u64 = 50;
const GOODBYE_FINAL_CUE: (u32, u64) = (120, 1_000);
const LOOP_STATS_LOG_EVERY: u64 = 6_000;

pub struct LiveWatchApp {
    config: DeviceConfig,
    status: Box<dyn StatusClient>,
    io: Peripherals,
    rng: Mcg128Xsl64,
    token: String,
    poll: StatusScheduler,
    session: LiveSessionTracker,
    reboot: RebootScheduler,
    wheel_offset: i32,
    wheel_step: i32,
    stats: LoopStats,
}

impl LiveWatchApp {
    pub fn new(
        config: DeviceConfig,
        status: Box<dyn StatusClient>,
        io: Peripherals,
        rng: Mcg128Xsl64,
    ) -> Self {
        let now = io.clock.ticks();
        let timing = &config.timing;
        let poll = StatusScheduler::new(now, timing.poll_interval_ms);
        let session = LiveSessionTracker::new(timing.break_delay_ms);
        let reboot = RebootScheduler::new(now, timing.reboot_delay_ms);
        Self {
            config,
            status,
            io,
            rng,
            token: String::new(),
            poll,
            session,
            reboot,
            wheel_offset: 0,
            wheel_step: 1,
            stats: LoopStats::new(LOOP_STATS_WINDOW, Duration::from_millis(LOOP_PERIOD_MS)),
        }
    }

    /// Boots and loops until something asks for a restart.
    pub fn run(&mut self) -> Restart {
        if let Err(err) = self.boot() {
            return self.fatal(err);
        }
        loop {
            let started = self.io.clock.ticks();
            if let Some(restart) = self.step() {
                return restart;
            }
            self.io.pause(LOOP_PERIOD_MS);
            self.record_iteration(started);
        }
    }

    pub fn boot(&mut self) -> Result<(), DeviceError> {
        self.io.lights.set_status(Rgb::BLUE);
        self.io.lights.fill_strip(Rgb::BLUE);
        self.io.text_padded("HELLO WORLD");

        self.io.text_padded("SET TIME");
        self.io.clock.check_synchronized()?;

        log::info!("monitoring account {}", self.config.account);
        self.io.text_padded(&self.config.account.to_uppercase());

        self.io.text_padded("TOKEN");
        self.io.lights.set_status(Rgb::CYAN);
        self.io.lights.fill_strip(Rgb::CYAN);
        self.token = self.status.fetch_token()?;
        self.io.lights.set_status(Rgb::GREEN);
        self.io.lights.fill_strip(Rgb::GREEN);
        self.io.text_padded("TOKEN OK");

        let now = self.io.clock.ticks();
        self.poll = StatusScheduler::new(now, self.config.timing.poll_interval_ms);
        log::info!("polling status every {} ms", self.poll.interval_ms());
        let reboot_at = self.reboot.schedule(now);
        log::debug!("maintenance restart scheduled at tick {reboot_at}");
        self.session.reset();
        Ok(())
    }

    /// One pass of the main loop. Returns a restart request when the
    /// device has to reset.
    pub fn step(&mut self) -> Option<Restart> {
        if let Some(restart) = self.service_inputs() {
            return Some(restart);
        }

        let now = self.io.clock.ticks();
        let idle = self.is_idle();
        if self.reboot.due(now, idle) {
            log::info!("scheduled maintenance restart");
            self.io.text_padded("REBOOT");
            self.io.lights.fill_strip(Rgb::GREEN);
            return Some(reboot::execute(
                &mut self.io,
                SCHEDULED_REBOOT_DELAY_S,
                "scheduled maintenance restart",
            ));
        }

        if self.poll.is_due(now) {
            if let Err(err) = self.poll_status(now) {
                return Some(self.fatal(err));
            }
        }

        if let Some(transition) = self.session.pending_transition() {
            match transition {
                Transition::GoLive { started_at } => self.go_live(started_at),
                Transition::GoOffline => self.go_offline(),
            }
            log::debug!("session now {:?}", self.session.state());
        }
        if self.is_idle() {
            self.io.text_padded("");
            self.io.lights.fill_strip(Rgb::BLACK);
        }

        if self.session.is_live() {
            self.render_live();
        }
        None
    }

    #[cfg(test)]
    pub fn session(&self) -> &LiveSessionTracker {
        &self.session
    }

    #[cfg(test)]
    pub fn loop_stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Iterations include the loop pause, so anything past the loop period
    /// was spent blocking in cues, pauses or the status call.
    fn record_iteration(&mut self, started: Tick) {
        let elapsed_ms = self.io.clock.ticks().diff(started).max(0);
        self.stats.record_iteration(Duration::from_millis(elapsed_ms as u64));
        if self.stats.total_iterations() % LOOP_STATS_LOG_EVERY == 0 {
            log::debug!(
                "loop: {} iterations, {} overruns, rolling {:.1} Hz, histogram {:?}",
                self.stats.total_iterations(),
                self.stats.overruns(),
                self.stats.rolling_rate_hz(),
                self.stats.histogram()
            );
        }
    }

    fn is_idle(&self) -> bool {
        !self.session.is_live() && self.session.reported_start().is_none()
    }

    fn service_inputs(&mut self) -> Option<Restart> {
        let events = self.io.input.poll();
        if events.iter().any(|event| event.action == ButtonAction::Pressed) {
            self.io.beep(PRESS_CUE.0, PRESS_CUE.1, 0.5);
        }
        if events.iter().any(|event| event.action == ButtonAction::Released) {
            self.io.beep(RELEASE_CUE.0, RELEASE_CUE.1, 0.5);
        }

        for event in events {
            if event.action != ButtonAction::LongPress {
                continue;
            }
            match event.button {
                Button::A => {
                    log::info!("start over requested");
                    self.io.text_padded("START OVER");
                    self.session.reset();
                    self.poll.force_next(self.io.clock.ticks());
                    self.io.pause(MESSAGE_HOLD_MS);
                }
                Button::B => {
                    log::info!("manual restart requested");
                    self.io.text_padded("REBOOT");
                    self.io.pause(MESSAGE_HOLD_MS);
                    return Some(reboot::execute(
                        &mut self.io,
                        MANUAL_REBOOT_DELAY_S,
                        "manual restart",
                    ));
                }
                Button::C | Button::D => {}
            }
        }
        None
    }

    fn poll_status(&mut self, now: Tick) -> Result<(), DeviceError> {
        self.poll.mark_polled(now);
        self.wheel_step = -self.wheel_step;
        self.io.lights.set_status(Rgb::MAGENTA);

        let report = self.status.query(&self.token, &self.config.account)?;
        log::debug!("status poll at tick {now}: {report:?}");
        if let StatusReport::Unparseable { raw } = &report {
            log::warn!("live report with unreadable start time '{raw}'");
            self.io.text_padded("START NOT OK");
            self.io.pause(MESSAGE_HOLD_MS);
        }
        self.session.record_poll(report.started_at());
        self.io.lights.set_status(Rgb::GREEN);
        Ok(())
    }

    fn go_live(&mut self, started_at: i64) {
        log::info!("{} has gone live (started at {started_at})", self.config.account);
        let outcome = match RevealSpec::shuffled(REVEAL_TARGET, &REVEAL_POSITIONS, &mut self.rng) {
            Ok(spec) => RevealAnimation::new(&spec, &mut self.rng).run(&mut self.io),
            Err(err) => {
                log::error!("skipping reveal: {err}");
                RevealOutcome::Completed
            }
        };
        match outcome {
            RevealOutcome::Completed => {
                let now = self.io.clock.ticks();
                self.session.complete_go_live(now);
            }
            RevealOutcome::Aborted { revealed } => {
                log::info!("reveal aborted with {revealed} positions shown");
                self.session.abandon_go_live();
            }
        }
    }

    fn go_offline(&mut self) {
        log::info!("{} has gone offline", self.config.account);
        self.session.complete_go_offline();
        self.io.text_padded("GOODBYE ...");
        for index in 0..STRIP_LEN {
            self.io.lights.set_strip_pixel(index, Rgb::BLACK);
            let hz = 300 - 10 * index as u32;
            self.io.beep(hz, GOODBYE_CUE_MS, 0.5);
            self.io.pause(GOODBYE_STEP_MS);
        }
        self.io.beep(GOODBYE_FINAL_CUE.0, GOODBYE_FINAL_CUE.1, 0.5);
    }

    fn render_live(&mut self) {
        let wall_now = self.io.clock.epoch_seconds();
        if let Some(seconds) = self.session.elapsed_seconds(wall_now) {
            self.io.text(&format_live_duration(seconds));
        }

        let now = self.io.clock.ticks();
        let reminders = self.config.timing.break_reminders;
        match self.session.breaks_mut() {
            Some(breaks) if reminders => breaks.drive(&mut self.io, now, self.wheel_offset),
            _ => {
                for (index, color) in indicator_strip(None, self.wheel_offset).iter().enumerate() {
                    self.io.lights.set_strip_pixel(index, *color);
                }
            }
        }
        self.wheel_offset = (self.wheel_offset + self.wheel_step).rem_euclid(255);
    }

    fn fatal(&mut self, err: DeviceError) -> Restart {
        log::error!("{err}");
        self.io.text_padded(err.display_code());
        self.io.lights.set_status(Rgb::RED);
        self.io.lights.fill_strip(Rgb::RED);
        self.io.pause(MESSAGE_HOLD_MS);
        reboot::execute(
            &mut self.io,
            self.config.timing.fatal_restart_delay_s,
            err.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::config::model::DEFAULT_BREAK_DELAY_MS;
    use crate::peripherals::{ButtonEvent, pad_to_display};
    use crate::reveal::LIVE_BANNER;
    use crate::testing::{
        InputScript, SIM_EPOCH_BASE, ScriptedStatus, SharedRecording, SimClock, sim_peripherals,
    };

    struct Harness {
        app: LiveWatchApp,
        clock: SimClock,
        recording: SharedRecording,
        input: InputScript,
        status: ScriptedStatus,
    }

    fn harness(tweak: impl FnOnce(&mut DeviceConfig)) -> Harness {
        let mut config = DeviceConfig::template();
        config.account = "someone".to_string();
        tweak(&mut config);
        let clock = SimClock::new();
        let (io, recording, input) = sim_peripherals(&clock);
        let status = ScriptedStatus::new();
        let app = LiveWatchApp::new(
            config,
            Box::new(status.clone()),
            io,
            Mcg128Xsl64::seed_from_u64(7),
        );
        Harness {
            app,
            clock,
            recording,
            input,
            status,
        }
    }

    fn booted(tweak: impl FnOnce(&mut DeviceConfig)) -> Harness {
        let mut h = harness(tweak);
        h.app.boot().expect("boot");
        h
    }

    fn live_report() -> StatusReport {
        StatusReport::Live {
            started_at: SIM_EPOCH_BASE - 3_600,
        }
    }

    #[test]
    fn boot_shows_account_and_fetches_one_token() {
        let h = booted(|_| {});
        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("HELLO WORLD")));
        assert!(recording.frames.contains(&pad_to_display("SOMEONE")));
        assert_eq!(recording.last_frame(), Some(pad_to_display("TOKEN OK").as_str()));
        assert_eq!(recording.status.last(), Some(&Rgb::GREEN));
        assert_eq!(h.status.token_requests.get(), 1);
        assert!(!h.app.session().is_live());
    }

    #[test]
    fn token_failure_restarts_after_countdown() {
        let mut h = harness(|config| config.timing.fatal_restart_delay_s = 2);
        *h.status.token.borrow_mut() = Err("bad credentials".to_string());

        let restart = h.app.run();
        assert!(restart.reason.contains("bad credentials"));
        assert_eq!(h.status.queries.get(), 0);
        assert_eq!(h.clock.elapsed_ms(), MESSAGE_HOLD_MS + 2_000);

        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("TOKEN ERROR")));
        assert_eq!(recording.last_frame(), Some("REBOOT 00s  "));
        assert_eq!(recording.status.last(), Some(&Rgb::RED));
    }

    #[test]
    fn status_failure_is_fatal() {
        let mut h = booted(|_| {});
        h.status.push(Err("connection reset".to_string()));

        let restart = h.app.step().expect("restart requested");
        assert!(restart.reason.contains("connection reset"));
        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("STATUS ERROR")));
        assert!(recording.frames.contains(&pad_to_display("REBOOT 10s")));
    }

    #[test]
    fn first_live_poll_runs_one_reveal_and_anchors_breaks_now() {
        let mut h = booted(|_| {});
        h.status.set_fallback(live_report());

        assert!(h.app.step().is_none());
        let anchored = h.clock.ticks_now();
        assert!(h.app.session().is_live());
        let breaks = h.app.session().breaks().expect("break schedule");
        assert_eq!(breaks.deadline().diff(anchored), i64::from(DEFAULT_BREAK_DELAY_MS));

        for _ in 0..20 {
            h.clock.advance(LOOP_PERIOD_MS);
            assert!(h.app.step().is_none());
        }
        let recording = h.recording.borrow();
        assert_eq!(recording.count_frames(LIVE_BANNER), 5);
        let elapsed = recording.last_frame().expect("elapsed text");
        assert!(elapsed.starts_with("01 0"), "unexpected elapsed text {elapsed:?}");
    }

    #[test]
    fn going_offline_plays_the_goodbye_sequence() {
        let mut h = booted(|config| config.timing.poll_interval_ms = 0);
        h.status.push(Ok(live_report()));
        assert!(h.app.step().is_none());
        assert!(h.app.session().is_live());

        h.clock.advance(LOOP_PERIOD_MS);
        assert!(h.app.step().is_none());
        assert!(!h.app.session().is_live());
        assert!(h.app.session().breaks().is_none());

        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("GOODBYE ...")));
        let tail: Vec<u32> = recording.tones.iter().rev().take(6).rev().copied().collect();
        assert_eq!(tail, vec![300, 290, 280, 270, 260, 120]);
        assert_eq!(recording.strip, [Rgb::BLACK; STRIP_LEN]);
        assert_eq!(recording.last_frame(), Some(pad_to_display("").as_str()));
    }

    #[test]
    fn zero_interval_polls_at_most_once_per_pass() {
        let mut h = booted(|config| config.timing.poll_interval_ms = 0);
        for _ in 0..5 {
            h.clock.advance(LOOP_PERIOD_MS);
            assert!(h.app.step().is_none());
        }
        assert_eq!(h.status.queries.get(), 5);

        // no time passes between these passes, so nothing is due
        assert!(h.app.step().is_none());
        assert!(h.app.step().is_none());
        assert_eq!(h.status.queries.get(), 5);
    }

    #[test]
    fn unparseable_start_time_stays_offline() {
        let mut h = booted(|_| {});
        h.status.push(Ok(StatusReport::Unparseable {
            raw: "not-a-time".to_string(),
        }));

        assert!(h.app.step().is_none());
        assert!(!h.app.session().is_live());
        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("START NOT OK")));
        assert_eq!(recording.count_frames(LIVE_BANNER), 0);
    }

    #[test]
    fn aborted_reveal_retries_on_the_next_poll() {
        let mut h = booted(|config| config.timing.poll_interval_ms = 0);
        h.status.set_fallback(live_report());
        let start = h.clock.elapsed_ms();
        h.input
            .at(start + 5_000, ButtonEvent::new(Button::B, ButtonAction::Released));

        assert!(h.app.step().is_none());
        assert!(!h.app.session().is_live());
        assert!(h.app.session().breaks().is_none());
        assert!(h.recording.borrow().frames.iter().any(|frame| frame == "ABORT"));

        h.clock.advance(LOOP_PERIOD_MS);
        assert!(h.app.step().is_none());
        assert!(h.app.session().is_live());
        assert_eq!(h.recording.borrow().count_frames(LIVE_BANNER), 5);
    }

    #[test]
    fn button_cues_play_once_per_pass() {
        let mut h = booted(|_| {});
        let now = h.clock.elapsed_ms();
        for button in [Button::A, Button::C] {
            h.input.at(now, ButtonEvent::new(button, ButtonAction::Pressed));
            h.input.at(now, ButtonEvent::new(button, ButtonAction::Released));
        }

        assert!(h.app.step().is_none());
        let tones = h.recording.borrow().tones.clone();
        assert_eq!(tones.iter().filter(|hz| **hz == 880).count(), 1);
        assert_eq!(tones.iter().filter(|hz| **hz == 120).count(), 1);
    }

    #[test]
    fn long_press_a_starts_over_without_goodbye() {
        let mut h = booted(|_| {});
        h.status.push(Ok(live_report()));
        assert!(h.app.step().is_none());
        assert!(h.app.session().is_live());
        let queries = h.status.queries.get();

        let now = h.clock.elapsed_ms();
        h.input.at(now, ButtonEvent::new(Button::A, ButtonAction::LongPress));
        assert!(h.app.step().is_none());

        assert!(!h.app.session().is_live());
        assert_eq!(h.status.queries.get(), queries + 1);
        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("START OVER")));
        assert!(!recording.frames.contains(&pad_to_display("GOODBYE ...")));
    }

    #[test]
    fn long_press_b_restarts() {
        let mut h = booted(|_| {});
        let now = h.clock.elapsed_ms();
        h.input.at(now, ButtonEvent::new(Button::B, ButtonAction::LongPress));

        let restart = h.app.step().expect("restart requested");
        assert_eq!(restart.reason, "manual restart");
        assert_eq!(h.status.queries.get(), 0);
        let recording = h.recording.borrow();
        assert!(recording.frames.contains(&pad_to_display("REBOOT")));
        assert!(recording.frames.contains(&pad_to_display("REBOOT 10s")));
    }

    #[test]
    fn run_records_loop_timing_and_blocking_cues() {
        let mut h = harness(|_| {});
        let start = h.clock.elapsed_ms();
        h.input
            .at(start + 100, ButtonEvent::new(Button::C, ButtonAction::Pressed));
        h.input
            .at(start + 300, ButtonEvent::new(Button::B, ButtonAction::LongPress));

        let restart = h.app.run();
        assert_eq!(restart.reason, "manual restart");

        let stats = h.app.loop_stats();
        assert!(stats.total_iterations() >= 25, "{} iterations", stats.total_iterations());
        // only the pass that played the press cue ran long
        assert_eq!(stats.overruns(), 1);
        assert_eq!(stats.histogram()[4], 1);
        assert_eq!(stats.histogram()[0], stats.total_iterations() - 1);
    }

    #[test]
    fn scheduled_restart_survives_a_session_longer_than_the_tick_window() {
        let mut h = booted(|config| config.timing.reboot_delay_ms = 1_000);
        h.status.set_fallback(live_report());
        assert!(h.app.step().is_none());
        assert!(h.app.session().is_live());

        // stay live for more than half a tick period in total
        for _ in 0..4 {
            h.clock.advance(100_000_000);
            assert!(h.app.step().is_none());
        }
        assert!(h.app.session().is_live());

        h.status.set_fallback(StatusReport::Offline);
        h.clock.advance(70_000);
        assert!(h.app.step().is_none());
        assert!(!h.app.session().is_live());

        h.clock.advance(LOOP_PERIOD_MS);
        let restart = h.app.step().expect("overdue restart still fires");
        assert_eq!(restart.reason, "scheduled maintenance restart");
    }

    #[test]
    fn scheduled_restart_waits_until_offline() {
        let mut h = booted(|config| config.timing.reboot_delay_ms = 1_000);
        h.status.set_fallback(live_report());
        assert!(h.app.step().is_none());
        assert!(h.app.session().is_live());

        h.clock.advance(2_000);
        assert!(h.app.step().is_none());

        h.status.set_fallback(StatusReport::Offline);
        h.clock.advance(70_000);
        assert!(h.app.step().is_none());
        assert!(!h.app.session().is_live());

        h.clock.advance(LOOP_PERIOD_MS);
        let restart = h.app.step().expect("restart once offline");
        assert_eq!(restart.reason, "scheduled maintenance restart");
        assert!(h.recording.borrow().frames.contains(&pad_to_display("REBOOT 05s")));
    }

    #[test]
    fn last_minute_notice_sounds_once() {
        let mut h = booted(|_| {});
        h.status.set_fallback(live_report());
        assert!(h.app.step().is_none());

        h.clock.advance(u64::from(DEFAULT_BREAK_DELAY_MS) - 60_000);
        assert!(h.app.step().is_none());
        h.clock.advance(LOOP_PERIOD_MS);
        assert!(h.app.step().is_none());

        let recording = h.recording.borrow();
        assert_eq!(recording.tones.iter().filter(|hz| **hz == 440).count(), 1);
        assert_eq!(recording.strip[4], crate::breaks::REACHED_COLOR);
        assert_eq!(recording.strip[0], Rgb::BLACK);
    }

    #[test]
    fn disabled_reminders_only_cycle_the_wheel() {
        let mut h = booted(|config| config.timing.break_reminders = false);
        h.status.set_fallback(live_report());
        assert!(h.app.step().is_none());

        h.clock.advance(u64::from(DEFAULT_BREAK_DELAY_MS) + 1_000);
        assert!(h.app.step().is_none());

        let recording = h.recording.borrow();
        assert!(!recording.tones.contains(&440));
        assert!(!recording.frames.contains(&"TAKE A BREAK".to_string()));
        assert_ne!(recording.strip, [Rgb::BLACK; STRIP_LEN]);
    }
}
