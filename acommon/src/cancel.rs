//! One-way cancellation signal shared between a "stop" action and in-flight work.
//!
//! ```rust
//! use acommon::CancellationController;
//!
//! let controller = CancellationController::new();
//! let token = controller.token();
//! assert!(!token.is_aborted());
//!
//! controller.cancel_with_reason("user pressed stop");
//! controller.cancel();
//! assert!(token.is_aborted());
//! assert_eq!(token.reason(), Some("user pressed stop"));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
struct CancelState {
    aborted: AtomicBool,
    claimed: AtomicBool,
    reason: OnceLock<String>,
}

/// Observer side of a cancellation signal.
///
/// Holders poll [`CancellationToken::is_aborted`] at their own suspension points. Once the
/// flag is set it never reverts. A token drives at most one generation run; see
/// [`CancellationToken::try_claim`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<&str> {
        self.state.reason.get().map(String::as_str)
    }

    /// Binds the token to a run. Returns `false` when a run already claimed it.
    pub fn try_claim(&self) -> bool {
        !self.state.claimed.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.state.claimed.load(Ordering::Acquire)
    }

    fn abort(&self, reason: Option<String>) {
        if self.state.aborted.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(reason) = reason {
            let _ = self.state.reason.set(reason);
        }
    }
}

/// Signal side of a cancellation pair.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.abort(None);
    }

    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        self.token.abort(Some(reason.into()));
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationController;

    #[test]
    fn cancel_is_monotonic_and_idempotent() {
        let controller = CancellationController::new();
        let token = controller.token();

        controller.cancel();
        controller.cancel();
        controller.cancel_with_reason("late reason");

        assert!(token.is_aborted());
        assert!(controller.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn first_reason_wins() {
        let controller = CancellationController::new();
        controller.cancel_with_reason("stop button");
        controller.cancel_with_reason("second click");

        assert_eq!(controller.token().reason(), Some("stop button"));
    }

    #[test]
    fn token_can_only_be_claimed_once() {
        let controller = CancellationController::new();
        let token = controller.token();
        let clone = token.clone();

        assert!(!token.is_claimed());
        assert!(token.try_claim());
        assert!(!clone.try_claim());
        assert!(clone.is_claimed());
    }

    #[test]
    fn fresh_controllers_do_not_share_state() {
        let first = CancellationController::new();
        let second = CancellationController::new();

        first.cancel();
        assert!(!second.token().is_aborted());
    }
}
