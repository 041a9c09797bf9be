//! Session-start detection and the periodic reminder sweep.

use chrono::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::host::{Session, SessionHost};
use crate::messages;
use crate::tracker::ReconciliationTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Session is not logged in.
    Unauthenticated,
    /// Account name already matches the display name.
    InSync,
    /// A new pending entry was opened.
    Opened,
    /// An entry already existed for this display name; the user was told again.
    AlreadyPending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub reminded: usize,
    pub skipped_offline: usize,
}

pub struct SessionEvents {
    tracker: Arc<ReconciliationTracker>,
    host: Arc<dyn SessionHost>,
    clock: Arc<dyn Clock>,
    gate: Arc<Mutex<()>>,
    reminder_interval: Duration,
    command_name: String,
}

impl SessionEvents {
    pub fn new(
        tracker: Arc<ReconciliationTracker>,
        host: Arc<dyn SessionHost>,
        clock: Arc<dyn Clock>,
        gate: Arc<Mutex<()>>,
        reminder_interval: Duration,
        command_name: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            host,
            clock,
            gate,
            reminder_interval,
            command_name: command_name.into(),
        }
    }

    pub fn on_session_start(&self, session: &dyn Session) -> StartOutcome {
        let _serial = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        let identity = match session.identity() {
            Some(identity) => identity,
            None => return StartOutcome::Unauthenticated,
        };

        let display_name = session.display_name();
        if identity.account_name == display_name {
            return StartOutcome::InSync;
        }

        let stale: Vec<String> = self
            .tracker
            .keys_for_account(identity.account_id)
            .into_iter()
            .filter(|key| key != display_name)
            .collect();
        if !stale.is_empty() {
            warn!(
                account_id = identity.account_id,
                display_name = %display_name,
                stale_keys = ?stale,
                "Account already has pending name changes under other display names; they will not be reminded"
            );
        }

        let opened = self
            .tracker
            .open(display_name, identity.account_id, self.clock.now());
        info!(
            account_id = identity.account_id,
            account_name = %identity.account_name,
            display_name = %display_name,
            opened,
            "Account name mismatch detected"
        );

        session.send_info(&messages::mismatch_detected(
            &identity.account_name,
            display_name,
        ));
        session.send_info(&messages::confirm_hint(&self.command_name));

        if opened {
            StartOutcome::Opened
        } else {
            StartOutcome::AlreadyPending
        }
    }

    /// Walk every pending key and remind the sessions whose timer has elapsed.
    ///
    /// Keys with no live, logged-in session are left alone; they resume once a
    /// session under that name is back.
    pub fn on_tick(&self) -> SweepReport {
        let _serial = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for key in self.tracker.keys() {
            report.checked += 1;

            let session = match self.host.find_session_by_display_name(&key) {
                Some(session) if session.identity().is_some() => session,
                _ => {
                    report.skipped_offline += 1;
                    continue;
                }
            };

            if !self.tracker.reminder_due(&key, now, self.reminder_interval) {
                continue;
            }

            session.send_info(messages::REMINDER);
            session.send_info(&messages::reminder_hint(&self.command_name));
            self.tracker.touch(&key, now);
            report.reminded += 1;
            debug!(display_name = %key, "Sent name change reminder");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, FakeSession, ManualClock};
    use crate::types::{Identity, Tone};

    struct Fixture {
        events: SessionEvents,
        tracker: Arc<ReconciliationTracker>,
        host: Arc<FakeHost>,
        clock: Arc<ManualClock>,
        gate: Arc<Mutex<()>>,
    }

    fn fixture(interval_secs: i64) -> Fixture {
        let tracker = Arc::new(ReconciliationTracker::new());
        let host = Arc::new(FakeHost::new());
        let clock = Arc::new(ManualClock::default());
        let gate = Arc::new(Mutex::new(()));
        let events = SessionEvents::new(
            tracker.clone(),
            host.clone(),
            clock.clone(),
            gate.clone(),
            Duration::seconds(interval_secs),
            "confirmname",
        );
        Fixture {
            events,
            tracker,
            host,
            clock,
            gate,
        }
    }

    fn alice(display_name: &str) -> Arc<FakeSession> {
        FakeSession::logged_in(display_name, Identity::new(1, "Alice", "hash"))
    }

    #[test]
    fn mismatch_opens_entry_and_sends_two_infos() {
        let f = fixture(600);
        let session = alice("Alice99");

        assert_eq!(f.events.on_session_start(session.as_ref()), StartOutcome::Opened);
        assert!(f.tracker.is_pending("Alice99"));

        let notices = session.notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.tone == Tone::Info));
        assert_eq!(
            notices[0].text,
            "Server detected that your account name (Alice) differs from your player name (Alice99)."
        );
        assert_eq!(
            notices[1].text,
            "To update your account name, use: /confirmname <password>"
        );
    }

    #[test]
    fn matching_names_are_ignored() {
        let f = fixture(600);
        let session = alice("Alice");
        assert_eq!(f.events.on_session_start(session.as_ref()), StartOutcome::InSync);
        assert!(f.tracker.is_empty());
        assert!(session.notices().is_empty());
    }

    #[test]
    fn unauthenticated_session_is_ignored() {
        let f = fixture(600);
        let session = FakeSession::anonymous("Guest");
        assert_eq!(
            f.events.on_session_start(session.as_ref()),
            StartOutcome::Unauthenticated
        );
        assert!(f.tracker.is_empty());
    }

    #[test]
    fn repeated_start_keeps_single_entry() {
        let f = fixture(600);
        let session = alice("Alice99");
        f.events.on_session_start(session.as_ref());
        assert_eq!(
            f.events.on_session_start(session.as_ref()),
            StartOutcome::AlreadyPending
        );
        assert_eq!(f.tracker.len(), 1);
        assert_eq!(session.notices().len(), 4);
    }

    #[test]
    fn tick_arms_then_reminds_after_interval() {
        let f = fixture(600);
        let session = alice("Alice99");
        f.host.connect(session.clone());
        f.events.on_session_start(session.as_ref());
        session.take_notices();

        let report = f.events.on_tick();
        assert_eq!(report.reminded, 0);
        assert!(session.notices().is_empty());

        f.clock.advance(Duration::seconds(599));
        assert_eq!(f.events.on_tick().reminded, 0);

        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.events.on_tick().reminded, 1);
        let notices = session.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(
            notices[0].text,
            "Reminder: Your account name differs from your player name."
        );
        assert_eq!(
            notices[1].text,
            "Use: /confirmname <password> to update your account name."
        );

        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.events.on_tick().reminded, 0);
    }

    #[test]
    fn offline_keys_are_skipped_and_kept() {
        let f = fixture(1);
        let session = alice("Alice99");
        f.events.on_session_start(session.as_ref());

        f.clock.advance(Duration::seconds(10));
        let report = f.events.on_tick();
        assert_eq!(report.skipped_offline, 1);
        assert!(f.tracker.is_pending("Alice99"));
    }

    #[test]
    fn reconnect_under_same_name_resumes_reminders() {
        let f = fixture(5);
        let first = alice("Alice99");
        f.events.on_session_start(first.as_ref());

        let second = alice("Alice99");
        f.host.connect(second.clone());
        f.events.on_tick();
        f.clock.advance(Duration::seconds(5));
        assert_eq!(f.events.on_tick().reminded, 1);
        assert_eq!(second.notices().len(), 2);
    }

    #[test]
    fn unauthenticated_session_under_pending_name_is_skipped() {
        let f = fixture(1);
        f.events.on_session_start(alice("Alice99").as_ref());
        let impostor = FakeSession::anonymous("Alice99");
        f.host.connect(impostor.clone());

        f.events.on_tick();
        f.clock.advance(Duration::seconds(5));
        let report = f.events.on_tick();
        assert_eq!(report.reminded, 0);
        assert!(impostor.notices().is_empty());
    }

    #[test]
    fn new_display_name_creates_second_entry() {
        let f = fixture(600);
        f.events.on_session_start(alice("Alice99").as_ref());
        f.events.on_session_start(alice("Alice100").as_ref());

        assert_eq!(
            f.tracker.keys(),
            vec!["Alice100".to_string(), "Alice99".to_string()]
        );
    }

    #[test]
    fn identity_is_read_after_waiting_for_the_gate() {
        let f = Arc::new(fixture(600));
        let session = alice("Alice99");

        let held = f.gate.lock().expect("gate");
        let start = {
            let f = f.clone();
            let session = session.clone();
            std::thread::spawn(move || f.events.on_session_start(session.as_ref()))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        // A confirm holding the gate renames the account to the display name.
        session.set_identity(Identity::new(1, "Alice99", "hash"));
        drop(held);

        assert_eq!(start.join().expect("session start"), StartOutcome::InSync);
        assert!(f.tracker.is_empty());
        assert!(session.notices().is_empty());
    }

    #[test]
    fn clock_moving_backwards_never_reminds() {
        let f = fixture(60);
        let session = alice("Alice99");
        f.host.connect(session.clone());
        f.events.on_session_start(session.as_ref());
        session.take_notices();

        let armed_at = f.clock.now();
        f.events.on_tick();
        f.clock.set(armed_at - Duration::hours(2));
        assert_eq!(f.events.on_tick().reminded, 0);

        f.clock.set(armed_at + Duration::seconds(60));
        assert_eq!(f.events.on_tick().reminded, 1);
        assert_eq!(session.notices().len(), 2);
    }
}
