//! Timer behaviour of the status watchdog under paused tokio time.

use std::time::Duration;

use lumen_core::types::ProcessStatus::{self, *};
use lumen_core::Timings;
use lumen_supervisor::{TimerFired, TimerKind, UserStopFlag, Watchdog, WatchdogAction};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

struct Harness {
    _dir: TempDir,
    flag: UserStopFlag,
    watchdog: Watchdog,
    fired: mpsc::Receiver<TimerFired>,
}

fn harness() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let flag = UserStopFlag::new(dir.path().join("user-stop"));
    let (tx, fired) = mpsc::channel(8);
    let watchdog = Watchdog::new(&Timings::default(), flag.clone(), tx);
    Harness {
        _dir: dir,
        flag,
        watchdog,
        fired,
    }
}

fn feed(h: &mut Harness, statuses: &[ProcessStatus]) -> Vec<WatchdogAction> {
    statuses
        .iter()
        .flat_map(|s| h.watchdog.observe(*s))
        .collect()
}

async fn nothing_fires_within(h: &mut Harness, window: Duration) -> bool {
    timeout(window, h.fired.recv()).await.is_err()
}

#[tokio::test(start_paused = true)]
async fn user_stop_suppresses_the_watchdog_restart() {
    let mut h = harness();
    h.flag.set().expect("set flag");

    feed(&mut h, &[Online, Offline]);

    assert!(!h.watchdog.is_pending(TimerKind::Restart));
    assert!(!h.flag.is_set(), "flag is consumed by the transition");
    assert!(nothing_fires_within(&mut h, Duration::from_secs(30)).await);
}

#[tokio::test(start_paused = true)]
async fn unexpected_exit_restarts_exactly_once_after_the_delay() {
    let mut h = harness();
    let started = Instant::now();

    feed(&mut h, &[Online, Offline, Offline, Offline]);

    let fired = h.fired.recv().await.expect("restart timer");
    assert_eq!(fired.kind, TimerKind::Restart);
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(h.watchdog.claim(fired));
    assert!(!h.watchdog.claim(fired), "a schedule is claimed once");
    assert!(nothing_fires_within(&mut h, Duration::from_secs(30)).await);
}

#[tokio::test(start_paused = true)]
async fn coming_back_online_cancels_the_restart_and_resyncs() {
    let mut h = harness();

    feed(&mut h, &[Online, Offline]);
    assert!(h.watchdog.is_pending(TimerKind::Restart));

    tokio::time::advance(Duration::from_secs(2)).await;
    let actions = feed(&mut h, &[Online]);

    assert_eq!(actions, vec![WatchdogAction::Resync]);
    assert!(!h.watchdog.is_pending(TimerKind::Restart));
    assert!(nothing_fires_within(&mut h, Duration::from_secs(30)).await);
}

#[tokio::test(start_paused = true)]
async fn stream_end_schedules_recovery_after_seven_seconds() {
    let mut h = harness();
    let started = Instant::now();

    feed(&mut h, &[Streaming, Online]);

    let fired = h.fired.recv().await.expect("recovery timer");
    assert_eq!(fired.kind, TimerKind::Recovery);
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert!(h.watchdog.claim(fired));
}

#[tokio::test(start_paused = true)]
async fn new_session_cancels_pending_recovery() {
    let mut h = harness();

    feed(&mut h, &[Streaming, Online]);
    tokio::time::advance(Duration::from_secs(3)).await;
    feed(&mut h, &[Streaming]);

    assert!(!h.watchdog.is_pending(TimerKind::Recovery));
    assert!(nothing_fires_within(&mut h, Duration::from_secs(30)).await);
}

#[tokio::test(start_paused = true)]
async fn rescheduling_invalidates_the_earlier_timer() {
    let mut h = harness();

    feed(&mut h, &[Online, Offline]);
    let stale = TimerFired {
        kind: TimerKind::Restart,
        id: 1,
    };
    feed(&mut h, &[Online, Offline]);

    assert!(!h.watchdog.claim(stale));
    let fired = h.fired.recv().await.expect("second restart timer");
    assert_ne!(fired.id, stale.id);
    assert!(h.watchdog.claim(fired));
}

#[tokio::test(start_paused = true)]
async fn first_sample_only_sets_the_baseline() {
    let mut h = harness();

    assert!(feed(&mut h, &[Offline]).is_empty());
    assert_eq!(h.watchdog.last_status(), Some(Offline));
    assert!(!h.watchdog.is_pending(TimerKind::Restart));
}
