//! Reference-counted interest in one shared fetch
//!
//! Callers that supply a cancellation token are counted while they wait.
//! A caller without a token pins the fetch: from then on it can no longer
//! be aborted. When the last counted caller leaves before the fetch has
//! settled, and the fetch was never pinned, the fetch's own token is
//! cancelled.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct State {
    waiting: usize,
    pinned: bool,
    settled: bool,
    aborted: bool,
}

#[derive(Debug)]
pub(crate) struct Interest {
    state: Mutex<State>,
    fetch_token: CancellationToken,
}

impl Interest {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fetch_token: CancellationToken::new(),
        }
    }

    /// Interest in a value that is already available
    pub(crate) fn settled() -> Self {
        let interest = Self::new();
        interest.state.lock().settled = true;
        interest
    }

    /// Token the underlying fetch observes
    pub(crate) fn fetch_token(&self) -> CancellationToken {
        self.fetch_token.clone()
    }

    /// Register a caller; `cancellable` callers must later call [`Self::release`]
    pub(crate) fn attach(&self, cancellable: bool) {
        let mut state = self.state.lock();
        if cancellable {
            state.waiting += 1;
        } else {
            state.pinned = true;
        }
    }

    /// A cancellable caller stopped waiting; returns true if this aborted the fetch
    pub(crate) fn release(&self) -> bool {
        let mut state = self.state.lock();
        state.waiting = state.waiting.saturating_sub(1);
        if state.waiting == 0 && !state.pinned && !state.settled && !state.aborted {
            state.aborted = true;
            drop(state);
            self.fetch_token.cancel();
            return true;
        }
        false
    }

    /// The fetch produced its outcome; later releases never abort it
    pub(crate) fn settle(&self) {
        self.state.lock().settled = true;
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        self.state.lock().waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_release_aborts() {
        let interest = Interest::new();
        interest.attach(true);
        interest.attach(true);
        interest.attach(true);

        assert!(!interest.release());
        assert!(!interest.release());
        assert!(!interest.fetch_token().is_cancelled());
        assert!(interest.release());
        assert!(interest.fetch_token().is_cancelled());
        assert!(interest.is_aborted());
        assert_eq!(interest.waiting(), 0);
    }

    #[test]
    fn test_pin_is_sticky() {
        let interest = Interest::new();
        interest.attach(true);
        interest.attach(false);
        assert!(!interest.release());
        assert!(!interest.fetch_token().is_cancelled());
    }

    #[test]
    fn test_pin_before_cancellable_callers() {
        let interest = Interest::new();
        interest.attach(false);
        for _ in 0..4 {
            interest.attach(true);
        }
        for _ in 0..4 {
            assert!(!interest.release());
        }
        assert!(!interest.fetch_token().is_cancelled());
        assert!(!interest.is_aborted());
    }

    #[test]
    fn test_settled_never_aborts() {
        let interest = Interest::new();
        interest.attach(true);
        interest.settle();
        assert!(!interest.release());
        assert!(!interest.is_aborted());

        let ready = Interest::settled();
        ready.attach(true);
        assert!(!ready.release());
    }

    #[test]
    fn test_abort_happens_once() {
        let interest = Interest::new();
        interest.attach(true);
        assert!(interest.release());
        interest.attach(true);
        assert!(!interest.release());
    }
}
