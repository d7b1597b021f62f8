//! Status transition classification and self-healing timers.
//!
//! Only transitions drive side effects:
//!
//! - STREAMING → anything else: schedule a recovery check (`recovery_delay`)
//!   so the session-end hook has time to clean up first.
//! - OFFLINE → ONLINE / STREAMING: cancel both timers and resync.
//! - ONLINE → OFFLINE: consume the user-stop flag if present; otherwise
//!   schedule a watchdog restart (`watchdog_delay`).
//! - anything → STREAMING: cancel the recovery timer.
//!
//! Each scheduled timer owns a [`CancellationToken`] and a generation id.
//! A fired timer is only acted on if [`Watchdog::claim`] confirms it is
//! still the live schedule of its kind, so a timer racing its own
//! cancellation can never trigger a stale corrective action.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lumen_core::types::ProcessStatus;
use lumen_core::Timings;

use crate::flags::UserStopFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A streaming session ended (cleanly or not).
    StreamEnded,
    /// The daemon came back from OFFLINE.
    CameOnline,
    /// ONLINE → OFFLINE.
    WentOffline,
    EnteredStreaming,
}

/// Classify a status change. Identical statuses yield nothing.
pub fn classify(prev: ProcessStatus, cur: ProcessStatus) -> Vec<Transition> {
    use ProcessStatus::*;

    let mut out = Vec::new();
    if prev == cur {
        return out;
    }
    if prev == Offline && matches!(cur, Online | Streaming) {
        out.push(Transition::CameOnline);
    }
    if prev == Streaming {
        out.push(Transition::StreamEnded);
    }
    if prev == Online && cur == Offline {
        out.push(Transition::WentOffline);
    }
    if cur == Streaming {
        out.push(Transition::EnteredStreaming);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Recovery,
    Restart,
}

/// Sent on the timer channel when a scheduled delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub id: u64,
}

/// Work the caller must do in response to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    Resync,
}

struct Scheduled {
    id: u64,
    token: CancellationToken,
}

pub struct Watchdog {
    last: Option<ProcessStatus>,
    recovery: Option<Scheduled>,
    restart: Option<Scheduled>,
    next_id: u64,
    recovery_delay: Duration,
    restart_delay: Duration,
    user_stop: UserStopFlag,
    fired_tx: mpsc::Sender<TimerFired>,
}

impl Watchdog {
    pub fn new(timings: &Timings, user_stop: UserStopFlag, fired_tx: mpsc::Sender<TimerFired>) -> Self {
        Self {
            last: None,
            recovery: None,
            restart: None,
            next_id: 0,
            recovery_delay: timings.recovery_delay(),
            restart_delay: timings.watchdog_delay(),
            user_stop,
            fired_tx,
        }
    }

    pub fn last_status(&self) -> Option<ProcessStatus> {
        self.last
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Feed one status sample. Must be called from within a tokio runtime.
    pub fn observe(&mut self, status: ProcessStatus) -> Vec<WatchdogAction> {
        let Some(prev) = self.last.replace(status) else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        for transition in classify(prev, status) {
            tracing::debug!(from = %prev, to = %status, ?transition, "status transition");
            match transition {
                Transition::StreamEnded => self.schedule(TimerKind::Recovery, self.recovery_delay),
                Transition::EnteredStreaming => self.cancel(TimerKind::Recovery),
                Transition::CameOnline => {
                    self.cancel(TimerKind::Recovery);
                    self.cancel(TimerKind::Restart);
                    actions.push(WatchdogAction::Resync);
                }
                Transition::WentOffline => {
                    if self.user_stop.take() {
                        tracing::info!("daemon stopped by user; watchdog restart suppressed");
                    } else {
                        tracing::warn!(delay = ?self.restart_delay, "daemon went offline unexpectedly; restart scheduled");
                        self.schedule(TimerKind::Restart, self.restart_delay);
                    }
                }
            }
        }
        actions
    }

    /// Accept a fired timer if it is still the live schedule of its kind.
    ///
    /// Clears the slot on success, so each schedule is claimed at most once.
    pub fn claim(&mut self, fired: TimerFired) -> bool {
        let slot = self.slot_mut(fired.kind);
        let live = matches!(&*slot, Some(s) if s.id == fired.id && !s.token.is_cancelled());
        if live {
            *slot = None;
        }
        live
    }

    /// Cancel every pending timer.
    pub fn shutdown(&mut self) {
        self.cancel(TimerKind::Recovery);
        self.cancel(TimerKind::Restart);
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        self.next_id += 1;
        let id = self.next_id;
        let token = CancellationToken::new();

        let child = token.clone();
        let tx = self.fired_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(TimerFired { kind, id }).await;
                }
            }
        });

        *self.slot_mut(kind) = Some(Scheduled { id, token });
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(scheduled) = self.slot_mut(kind).take() {
            tracing::debug!(?kind, id = scheduled.id, "timer cancelled");
            scheduled.token.cancel();
        }
    }

    fn slot(&self, kind: TimerKind) -> Option<&Scheduled> {
        match kind {
            TimerKind::Recovery => self.recovery.as_ref(),
            TimerKind::Restart => self.restart.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<Scheduled> {
        match kind {
            TimerKind::Recovery => &mut self.recovery,
            TimerKind::Restart => &mut self.restart,
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessStatus::*;

    #[test]
    fn classify_table() {
        assert_eq!(classify(Online, Online), vec![]);
        assert_eq!(classify(Streaming, Online), vec![Transition::StreamEnded]);
        assert_eq!(
            classify(Offline, Streaming),
            vec![Transition::CameOnline, Transition::EnteredStreaming]
        );
        assert_eq!(classify(Online, Offline), vec![Transition::WentOffline]);
        assert_eq!(classify(Streaming, Offline), vec![Transition::StreamEnded]);
        assert_eq!(classify(Unknown, Offline), vec![]);
        assert_eq!(classify(AuthRequired, Streaming), vec![Transition::EnteredStreaming]);
    }
}
