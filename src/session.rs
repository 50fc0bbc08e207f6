use crate::breaks::BreakSchedule;
use crate::tick::Tick;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Offline,
    Live,
}

/// A change between what the API last said and what has been shown.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Transition {
    GoLive { started_at: i64 },
    GoOffline,
}

/// Separates the latest remote report from the state already displayed.
/// The displayed state and the break schedule only change together, inside
/// the `complete_*` methods.
#[derive(Debug, Clone)]
pub struct LiveSessionTracker {
    break_delay_ms: u32,
    reported_start: Option<i64>,
    displayed_live: bool,
    breaks: Option<BreakSchedule>,
}

impl LiveSessionTracker {
    pub fn new(break_delay_ms: u32) -> Self {
        Self {
            break_delay_ms,
            reported_start: None,
            displayed_live: false,
            breaks: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.displayed_live {
            SessionState::Live
        } else {
            SessionState::Offline
        }
    }

    pub fn is_live(&self) -> bool {
        self.displayed_live
    }

    pub fn reported_start(&self) -> Option<i64> {
        self.reported_start
    }

    pub fn record_poll(&mut self, started_at: Option<i64>) {
        self.reported_start = started_at;
    }

    pub fn pending_transition(&self) -> Option<Transition> {
        match (self.reported_start, self.displayed_live) {
            (Some(started_at), false) => Some(Transition::GoLive { started_at }),
            (None, true) => Some(Transition::GoOffline),
            _ => None,
        }
    }

    /// The reveal finished: show live and anchor a new break schedule at
    /// `now`, not at the remote start time.
    pub fn complete_go_live(&mut self, now: Tick) {
        self.displayed_live = true;
        self.breaks = Some(BreakSchedule::new(now, self.break_delay_ms));
    }

    /// The reveal was aborted: forget the report so only the next poll can
    /// trigger another attempt.
    pub fn abandon_go_live(&mut self) {
        self.reported_start = None;
    }

    pub fn complete_go_offline(&mut self) {
        self.displayed_live = false;
        self.breaks = None;
    }

    /// Back to `Offline` without any cue, as if freshly booted.
    pub fn reset(&mut self) {
        self.reported_start = None;
        self.displayed_live = false;
        self.breaks = None;
    }

    #[cfg(test)]
    pub fn breaks(&self) -> Option<&BreakSchedule> {
        self.breaks.as_ref()
    }

    pub fn breaks_mut(&mut self) -> Option<&mut BreakSchedule> {
        self.breaks.as_mut()
    }

    /// Seconds live according to the remote start time and the wall clock.
    pub fn elapsed_seconds(&self, wall_now: i64) -> Option<i64> {
        if !self.displayed_live {
            return None;
        }
        self.reported_start
            .map(|started_at| wall_now.saturating_sub(started_at).max(0))
    }
}

/// `h m s` with two digit fields, prefixed by a bare day count once the
/// session passes a day.
pub fn format_live_duration(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days} {hours:02} {minutes:02} {seconds:02}")
    } else {
        format!("{hours:02} {minutes:02} {seconds:02}")
    }
}
