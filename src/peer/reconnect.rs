//! Bounded reconnection controller
//!
//! Stateful retry loop: bounded attempts, fixed delay, optional forced
//! identity renewal. The controller never touches the endpoint itself; when
//! a timer fires it emits a [`ReconnectDirective`] on its channel and the
//! lifecycle manager performs the actual resume or renewal. That keeps all
//! endpoint mutation on the manager's single event-driver task.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::ReconnectOptions;
use crate::log::{EventLog, Severity};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// No reconnect pending
    Idle,
    /// A reconnect has been requested; the timer may be pending
    Scheduled,
    /// The attempt bound was hit; terminal until the next identity-open
    Exhausted,
}

/// Instruction emitted when a reconnect timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectDirective {
    /// Tear down the identity and re-initialize instead of resuming
    pub force_new_identity: bool,

    /// Identity epoch captured when the reconnect was requested; the
    /// manager drops directives whose epoch has moved on
    pub epoch: u64,
}

/// Bounded-retry reconnection controller
pub struct ReconnectController {
    options: ReconnectOptions,
    attempts: AtomicU32,
    phase: Mutex<ReconnectPhase>,
    /// Single-pending-timer invariant: at most one sleep task at a time.
    timer_pending: Arc<AtomicBool>,
    /// Renewal requests OR into this while a timer is pending, so the
    /// fired directive carries the strongest recovery requested.
    pending_force: Arc<AtomicBool>,
    log: Arc<EventLog>,
    directives: mpsc::UnboundedSender<ReconnectDirective>,
}

impl ReconnectController {
    /// Create a controller emitting directives on the given channel
    pub fn new(
        options: ReconnectOptions,
        log: Arc<EventLog>,
        directives: mpsc::UnboundedSender<ReconnectDirective>,
    ) -> Self {
        Self {
            options,
            attempts: AtomicU32::new(0),
            phase: Mutex::new(ReconnectPhase::Idle),
            timer_pending: Arc::new(AtomicBool::new(false)),
            pending_force: Arc::new(AtomicBool::new(false)),
            log,
            directives,
        }
    }

    /// Request a reconnect
    ///
    /// Over the bound: transitions to `Exhausted`, logs the max-attempts
    /// entry (once per call, every call), arms nothing, returns false.
    /// Otherwise: increments the counter, logs the attempt, transitions to
    /// `Scheduled` and, unless a timer is already pending, arms a
    /// single-shot timer that emits a directive after the configured delay.
    /// Requests coalesced into a pending timer still contribute their
    /// renewal flag: the directive fires forced if any covered request
    /// asked for renewal.
    /// Must be called from within a tokio runtime.
    pub fn request(&self, force_new_identity: bool, epoch: u64) -> bool {
        if self.attempts.load(Ordering::SeqCst) >= self.options.max_attempts {
            self.set_phase(ReconnectPhase::Exhausted);
            self.log.append(
                "Max reconnection attempts reached. Restart the client.",
                Severity::Error,
            );
            return false;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.info(format!(
            "Reconnection attempt {}/{}",
            attempt, self.options.max_attempts
        ));
        self.set_phase(ReconnectPhase::Scheduled);
        self.pending_force.fetch_or(force_new_identity, Ordering::SeqCst);

        if self.timer_pending.swap(true, Ordering::SeqCst) {
            // Counter, log and force flag already advanced; the pending
            // timer covers this request too.
            debug!("reconnect timer already pending");
            return true;
        }

        let delay = Duration::from_millis(self.options.delay_ms);
        let pending = Arc::clone(&self.timer_pending);
        let force = Arc::clone(&self.pending_force);
        let directives = self.directives.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.store(false, Ordering::SeqCst);
            let _ = directives.send(ReconnectDirective {
                force_new_identity: force.swap(false, Ordering::SeqCst),
                epoch,
            });
        });

        true
    }

    /// Reset to `Idle` with zero attempts; called on identity-open
    pub fn mark_connected(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        self.pending_force.store(false, Ordering::SeqCst);
        self.set_phase(ReconnectPhase::Idle);
    }

    /// Current phase
    pub fn phase(&self) -> ReconnectPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts made since the last identity-open
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn set_phase(&self, phase: ReconnectPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn controller(
        max_attempts: u32,
        delay_ms: u64,
    ) -> (
        ReconnectController,
        mpsc::UnboundedReceiver<ReconnectDirective>,
        Arc<EventLog>,
    ) {
        let log = Arc::new(EventLog::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let ctrl = ReconnectController::new(
            ReconnectOptions {
                max_attempts,
                delay_ms,
            },
            log.clone(),
            tx,
        );
        (ctrl, rx, log)
    }

    #[tokio::test]
    async fn test_request_schedules_and_fires() {
        let (ctrl, mut rx, log) = controller(5, 10);

        assert!(ctrl.request(false, 7));
        assert_eq!(ctrl.phase(), ReconnectPhase::Scheduled);
        assert_eq!(ctrl.attempts(), 1);
        assert_eq!(log.count_matching("Reconnection attempt 1/5"), 1);

        let directive = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!directive.force_new_identity);
        assert_eq!(directive.epoch, 7);
    }

    #[tokio::test]
    async fn test_force_flag_carries_through() {
        let (ctrl, mut rx, _log) = controller(5, 10);
        ctrl.request(true, 1);
        let directive = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(directive.force_new_identity);
    }

    #[tokio::test]
    async fn test_coalesced_renewal_keeps_force_flag() {
        let (ctrl, mut rx, _log) = controller(5, 30);

        // A plain reconnect arms the timer; a renewal request lands while
        // it is still pending. The fired directive must carry the renewal.
        ctrl.request(false, 1);
        ctrl.request(true, 1);

        let directive = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(directive.force_new_identity);

        // The flag is consumed; the next cycle starts plain again.
        let _ = timeout(Duration::from_millis(60), rx.recv()).await;
        ctrl.request(false, 2);
        let directive = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!directive.force_new_identity);
    }

    #[tokio::test]
    async fn test_mark_connected_discards_stale_force_flag() {
        let (ctrl, mut rx, _log) = controller(5, 40);

        ctrl.request(true, 1);
        ctrl.mark_connected();

        // A plain request after recovery coalesces into the still-pending
        // timer but must not inherit the old renewal flag.
        ctrl.request(false, 2);
        let directive = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!directive.force_new_identity);
    }

    #[tokio::test]
    async fn test_single_pending_timer() {
        let (ctrl, mut rx, log) = controller(5, 30);

        ctrl.request(false, 1);
        ctrl.request(false, 1);
        ctrl.request(false, 1);
        assert_eq!(ctrl.attempts(), 3);
        assert_eq!(log.count_matching("Reconnection attempt"), 3);

        // Exactly one directive despite three requests.
        let first = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.epoch, 1);
        assert!(
            timeout(Duration::from_millis(120), rx.recv()).await.is_err(),
            "no second timer may fire"
        );
    }

    #[tokio::test]
    async fn test_exhaustion_after_bound() {
        let (ctrl, mut rx, log) = controller(5, 5_000);

        for _ in 0..5 {
            assert!(ctrl.request(false, 1));
        }
        assert_eq!(ctrl.attempts(), 5);
        assert_eq!(ctrl.phase(), ReconnectPhase::Scheduled);

        // Sixth and seventh requests: no timer, one max-attempts entry each.
        assert!(!ctrl.request(false, 1));
        assert_eq!(ctrl.phase(), ReconnectPhase::Exhausted);
        assert_eq!(log.count_matching("Max reconnection attempts"), 1);
        assert!(!ctrl.request(false, 1));
        assert_eq!(log.count_matching("Max reconnection attempts"), 2);

        // The one pending timer (from the first request) is all that fires.
        let _ = timeout(Duration::from_millis(50), rx.recv()).await;
    }

    #[tokio::test]
    async fn test_counter_monotonic_until_reset() {
        let (ctrl, _rx, _log) = controller(5, 5_000);

        let mut last = 0;
        for _ in 0..4 {
            ctrl.request(false, 1);
            let now = ctrl.attempts();
            assert!(now >= last);
            last = now;
        }

        ctrl.mark_connected();
        assert_eq!(ctrl.attempts(), 0);
        assert_eq!(ctrl.phase(), ReconnectPhase::Idle);
    }

    #[tokio::test]
    async fn test_reset_reopens_budget() {
        let (ctrl, _rx, log) = controller(2, 5_000);

        ctrl.request(false, 1);
        ctrl.request(false, 1);
        assert!(!ctrl.request(false, 1));
        assert_eq!(ctrl.phase(), ReconnectPhase::Exhausted);

        ctrl.mark_connected();
        assert!(ctrl.request(false, 2));
        assert_eq!(ctrl.phase(), ReconnectPhase::Scheduled);
        assert_eq!(log.count_matching("Reconnection attempt 1/2"), 2);
    }
}
