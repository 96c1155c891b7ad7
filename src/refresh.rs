//! Debounce state machine deciding when a viewport has settled enough to
//! fetch station data for it.
//!
//! ```text
//! Idle --change--> PendingDebounce --change--> PendingDebounce (timer reset)
//! PendingDebounce --deadline--> Fetching --complete--> Idle
//! Fetching --change--> Fetching (queued) --complete--> PendingDebounce
//! ```
//!
//! The controller never sleeps. The owner feeds it events and the current
//! time, asks for the next deadline, and calls [`ViewportRefreshController::poll`]
//! once that deadline has passed. At most one fetch is outstanding at a time;
//! a viewport change arriving mid-fetch is queued and debounced again when
//! the fetch completes, so the final viewport is never lost.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bounds::BoundingBox;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

// ---

/// Identifies one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FetchTicket(pub u64);

/// A fetch the owner must run, then report with
/// [`ViewportRefreshController::fetch_completed`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub viewport: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
enum RefreshState {
    Idle,
    PendingDebounce {
        deadline: Instant,
        viewport: BoundingBox,
    },
    Fetching {
        ticket: FetchTicket,
        queued: Option<BoundingBox>,
    },
}

/// Coarse phase name, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    PendingDebounce,
    Fetching,
}

#[derive(Debug, Clone)]
pub struct ViewportRefreshController {
    debounce: Duration,
    state: RefreshState,
    next_ticket: u64,
    latest_viewport: Option<BoundingBox>,
}

impl Default for ViewportRefreshController {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ViewportRefreshController {
    // ---
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: RefreshState::Idle,
            next_ticket: 0,
            latest_viewport: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn phase(&self) -> RefreshPhase {
        match self.state {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::PendingDebounce { .. } => RefreshPhase::PendingDebounce,
            RefreshState::Fetching { .. } => RefreshPhase::Fetching,
        }
    }

    /// Most recent viewport reported by the map widget.
    pub fn latest_viewport(&self) -> Option<&BoundingBox> {
        self.latest_viewport.as_ref()
    }

    /// Record a viewport change observed at `now`.
    pub fn viewport_changed(&mut self, viewport: BoundingBox, now: Instant) {
        // ---
        self.latest_viewport = Some(viewport);

        if let RefreshState::Fetching { ticket, queued, .. } = &mut self.state {
            debug!("viewport changed during fetch {:?}, queued", ticket);
            *queued = Some(viewport);
            return;
        }

        debug!("viewport changed, fetch armed in {:?}", self.debounce);
        self.state = RefreshState::PendingDebounce {
            deadline: now + self.debounce,
            viewport,
        };
    }

    /// When the armed timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            RefreshState::PendingDebounce { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Issue the fetch once the debounce deadline has passed.
    ///
    /// Returns `None` while idle, fetching, or still inside the window.
    pub fn poll(&mut self, now: Instant) -> Option<FetchRequest> {
        // ---
        let viewport = match self.state {
            RefreshState::PendingDebounce { deadline, viewport } if now >= deadline => viewport,
            _ => return None,
        };

        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.state = RefreshState::Fetching {
            ticket,
            queued: None,
        };
        Some(FetchRequest { ticket, viewport })
    }

    /// Report that a fetch finished, successfully or not.
    ///
    /// Returns `false` when the ticket is not the outstanding fetch; the
    /// report is then ignored.
    pub fn fetch_completed(&mut self, ticket: FetchTicket, now: Instant) -> bool {
        // ---
        let queued = match &self.state {
            RefreshState::Fetching {
                ticket: current,
                queued,
                ..
            } if *current == ticket => *queued,
            _ => {
                warn!("ignoring completion for unknown fetch {:?}", ticket);
                return false;
            }
        };

        self.state = match queued {
            Some(viewport) => RefreshState::PendingDebounce {
                deadline: now + self.debounce,
                viewport,
            },
            None => RefreshState::Idle,
        };
        true
    }

    /// Number of fetches issued so far.
    pub fn fetches_issued(&self) -> u64 {
        self.next_ticket
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    fn bbox(n: f64) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, n, n).unwrap()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_idle() {
        // ---
        let mut ctl = ViewportRefreshController::new(WINDOW);
        assert_eq!(ctl.phase(), RefreshPhase::Idle);
        assert!(ctl.deadline().is_none());
        assert!(ctl.poll(Instant::now()).is_none());
    }

    #[test]
    fn test_burst_yields_one_fetch_for_last_viewport() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);

        for i in 0..10u64 {
            let now = t0 + ms(i * 100);
            ctl.viewport_changed(bbox(1.0 + i as f64), now);
            assert!(ctl.poll(now).is_none());
        }

        // Last event at 900ms; nothing fires before 1200ms
        assert!(ctl.poll(t0 + ms(1199)).is_none());
        let req = ctl.poll(t0 + ms(1200)).unwrap();
        assert_eq!(req.viewport, bbox(10.0));
        assert_eq!(ctl.phase(), RefreshPhase::Fetching);
        assert!(ctl.poll(t0 + ms(5000)).is_none());
        assert_eq!(ctl.fetches_issued(), 1);
    }

    #[test]
    fn test_separated_events_yield_two_fetches() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);

        ctl.viewport_changed(bbox(1.0), t0);
        let first = ctl.poll(t0 + ms(300)).unwrap();
        assert!(ctl.fetch_completed(first.ticket, t0 + ms(350)));
        assert_eq!(ctl.phase(), RefreshPhase::Idle);

        ctl.viewport_changed(bbox(2.0), t0 + ms(700));
        let second = ctl.poll(t0 + ms(1000)).unwrap();
        assert_eq!(second.viewport, bbox(2.0));
        assert_ne!(first.ticket, second.ticket);
        assert_eq!(ctl.fetches_issued(), 2);
    }

    #[test]
    fn test_change_during_fetch_is_queued_not_dropped() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);

        ctl.viewport_changed(bbox(1.0), t0);
        let req = ctl.poll(t0 + ms(300)).unwrap();

        ctl.viewport_changed(bbox(2.0), t0 + ms(400));
        ctl.viewport_changed(bbox(3.0), t0 + ms(450));
        // No second fetch while the first is in flight
        assert!(ctl.poll(t0 + ms(2000)).is_none());

        assert!(ctl.fetch_completed(req.ticket, t0 + ms(2000)));
        assert_eq!(ctl.phase(), RefreshPhase::PendingDebounce);
        assert_eq!(ctl.deadline(), Some(t0 + ms(2300)));

        let follow_up = ctl.poll(t0 + ms(2300)).unwrap();
        assert_eq!(follow_up.viewport, bbox(3.0));
    }

    #[test]
    fn test_failed_fetch_returns_to_idle() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);

        ctl.viewport_changed(bbox(1.0), t0);
        let req = ctl.poll(t0 + WINDOW).unwrap();
        // Completion is outcome-agnostic; no retry gets scheduled
        assert!(ctl.fetch_completed(req.ticket, t0 + ms(500)));
        assert_eq!(ctl.phase(), RefreshPhase::Idle);
        assert!(ctl.poll(t0 + ms(10_000)).is_none());
    }

    #[test]
    fn test_unknown_ticket_ignored() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);

        assert!(!ctl.fetch_completed(FetchTicket(42), t0));

        ctl.viewport_changed(bbox(1.0), t0);
        let req = ctl.poll(t0 + WINDOW).unwrap();
        assert!(!ctl.fetch_completed(FetchTicket(req.ticket.0 + 1), t0 + ms(400)));
        assert_eq!(ctl.phase(), RefreshPhase::Fetching);
    }

    #[test]
    fn test_latest_viewport_tracks_every_change() {
        // ---
        let t0 = Instant::now();
        let mut ctl = ViewportRefreshController::new(WINDOW);
        assert!(ctl.latest_viewport().is_none());

        ctl.viewport_changed(bbox(1.0), t0);
        ctl.viewport_changed(bbox(4.0), t0 + ms(10));
        assert_eq!(ctl.latest_viewport(), Some(&bbox(4.0)));
    }
}
