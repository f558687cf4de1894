//! Host-side automation timers.
//!
//! Three independent countdowns, each armed only while its precondition
//! holds and a host connection is present. Deadlines are plain actor-local
//! state: the actor re-evaluates them after every state-changing event and
//! checks them on its tick, so disabling a timer or losing the precondition
//! disarms it before any further firing. A countdown that survives to its
//! deadline is re-checked against the precondition at fire time and no-ops
//! if stale.

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::game::session::GameSession;
use crate::game::settings::GameSettings;

/// Delay between the auto-restart countdown expiring and the restart firing
pub const RESTART_GRACE: Duration = Duration::from_secs(5);

/// The three automation timer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Calls a number every interval while the game is live
    AutoCall,
    /// Restarts an ended game after the interval plus a short grace delay
    AutoRestart,
    /// Ends the game after the final number has been called
    AutoEnd,
}

/// Deadlines for the three automation timers
#[derive(Debug, Default)]
pub struct AutomationScheduler {
    auto_call_at: Option<Instant>,
    auto_restart_at: Option<Instant>,
    auto_end_at: Option<Instant>,
}

impl AutomationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate every timer against the current state
    ///
    /// Arms a timer whose precondition newly holds, leaves an already-armed
    /// deadline in place, and disarms any timer whose precondition no longer
    /// holds. Without a host connection nothing stays armed.
    pub fn rearm(
        &mut self,
        session: &GameSession,
        settings: &GameSettings,
        host_connected: bool,
        now: Instant,
    ) {
        let call_wanted = host_connected
            && settings.auto_call_enabled
            && !session.is_ended()
            && !session.is_exhausted();
        self.auto_call_at = match (call_wanted, self.auto_call_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now + Duration::from_secs(settings.auto_call_interval.into())),
            (false, _) => None,
        };

        let restart_wanted =
            host_connected && settings.auto_restart_enabled && session.is_ended();
        self.auto_restart_at = match (restart_wanted, self.auto_restart_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(
                now + Duration::from_secs(settings.auto_restart_interval.into()) + RESTART_GRACE,
            ),
            (false, _) => None,
        };

        let end_wanted = host_connected
            && settings.auto_end_enabled
            && !session.is_ended()
            && session.is_exhausted();
        self.auto_end_at = match (end_wanted, self.auto_end_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now + Duration::from_secs(settings.auto_end_interval.into())),
            (false, _) => None,
        };
    }

    /// Return the timers whose deadlines have passed, clearing them
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due = Vec::new();

        if self.auto_call_at.is_some_and(|at| at <= now) {
            self.auto_call_at = None;
            due.push(TimerKind::AutoCall);
        }
        if self.auto_end_at.is_some_and(|at| at <= now) {
            self.auto_end_at = None;
            due.push(TimerKind::AutoEnd);
        }
        if self.auto_restart_at.is_some_and(|at| at <= now) {
            self.auto_restart_at = None;
            due.push(TimerKind::AutoRestart);
        }

        due
    }

    /// Cancel every countdown
    pub fn disarm_all(&mut self) {
        self.auto_call_at = None;
        self.auto_restart_at = None;
        self.auto_end_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::balls::BALL_COUNT;

    fn live_session() -> GameSession {
        GameSession::create(1, "demo1")
    }

    fn exhausted_session() -> GameSession {
        let mut session = live_session();
        for _ in 0..BALL_COUNT {
            session.call_number().unwrap();
        }
        session
    }

    fn settings_all_enabled() -> GameSettings {
        GameSettings {
            auto_call_enabled: true,
            auto_restart_enabled: true,
            auto_end_enabled: true,
            ..GameSettings::default()
        }
    }

    #[test]
    fn test_nothing_arms_without_host() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        scheduler.rearm(&live_session(), &settings_all_enabled(), false, now);
        assert!(scheduler.take_due(now + Duration::from_secs(10_000)).is_empty());
    }

    #[test]
    fn test_auto_call_arms_while_live() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let settings = settings_all_enabled();
        scheduler.rearm(&live_session(), &settings, true, now);

        let before = now + Duration::from_secs(settings.auto_call_interval as u64 - 1);
        assert!(scheduler.take_due(before).is_empty());

        let after = now + Duration::from_secs(settings.auto_call_interval as u64);
        assert_eq!(scheduler.take_due(after), vec![TimerKind::AutoCall]);
        // Deadline is consumed until the next rearm.
        assert!(scheduler.take_due(after).is_empty());
    }

    #[test]
    fn test_auto_call_disarms_when_game_ends() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let settings = settings_all_enabled();
        let mut session = live_session();
        scheduler.rearm(&session, &settings, true, now);

        session.end();
        scheduler.rearm(&session, &settings, true, now);

        let later = now + Duration::from_secs(settings.auto_call_interval as u64 + 1);
        let due = scheduler.take_due(later);
        assert!(!due.contains(&TimerKind::AutoCall));
    }

    #[test]
    fn test_auto_restart_arms_only_when_ended() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let settings = settings_all_enabled();
        let mut session = live_session();

        scheduler.rearm(&session, &settings, true, now);
        assert!(
            scheduler
                .take_due(now + Duration::from_secs(100_000))
                .iter()
                .all(|kind| *kind != TimerKind::AutoRestart)
        );

        session.end();
        scheduler.disarm_all();
        scheduler.rearm(&session, &settings, true, now);

        let deadline = now
            + Duration::from_secs(settings.auto_restart_interval as u64)
            + RESTART_GRACE;
        assert!(scheduler.take_due(deadline - Duration::from_secs(1)).is_empty());
        assert_eq!(scheduler.take_due(deadline), vec![TimerKind::AutoRestart]);
    }

    #[test]
    fn test_auto_end_arms_on_exhaustion() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let settings = settings_all_enabled();
        let session = exhausted_session();

        scheduler.rearm(&session, &settings, true, now);

        let deadline = now + Duration::from_secs(settings.auto_end_interval as u64);
        let due = scheduler.take_due(deadline);
        assert!(due.contains(&TimerKind::AutoEnd));
        assert!(!due.contains(&TimerKind::AutoCall));
    }

    #[test]
    fn test_toggle_off_disarms() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let mut settings = settings_all_enabled();
        let session = live_session();

        scheduler.rearm(&session, &settings, true, now);
        settings.auto_call_enabled = false;
        scheduler.rearm(&session, &settings, true, now);

        let due = scheduler.take_due(now + Duration::from_secs(100_000));
        assert!(!due.contains(&TimerKind::AutoCall));
    }

    #[test]
    fn test_host_disconnect_disarms_everything() {
        let mut scheduler = AutomationScheduler::new();
        let now = Instant::now();
        let settings = settings_all_enabled();
        let session = live_session();

        scheduler.rearm(&session, &settings, true, now);
        scheduler.rearm(&session, &settings, false, now);

        assert!(scheduler.take_due(now + Duration::from_secs(100_000)).is_empty());
    }
}
