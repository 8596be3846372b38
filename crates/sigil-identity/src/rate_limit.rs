//! Per-identity rate limiting
//!
//! Fixed-window accounting: each identity gets `max` admissions per window.
//! When the window has elapsed the counter restarts; at the cap the request
//! is refused without touching any other state. Storage is bounded by the
//! set of recently active identities.

use sigil_core::{AuthorityError, AuthorityResult, IdentityId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_start_ns: u64,
}

/// Sliding-window request limiter keyed by identity
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: HashMap<IdentityId, Window>,
    max: u32,
    window_ns: u64,
}

impl RateLimiter {
    /// Create a limiter admitting `max` requests per `window_ns`
    pub fn new(max: u32, window_ns: u64) -> Self {
        Self {
            windows: HashMap::new(),
            max,
            window_ns,
        }
    }

    /// Admit or refuse one request for `identity` at `now`
    pub fn admit(&mut self, identity: &IdentityId, now_ns: u64) -> AuthorityResult<()> {
        match self.windows.get_mut(identity) {
            Some(window) if now_ns.saturating_sub(window.window_start_ns) <= self.window_ns => {
                if window.count >= self.max {
                    return Err(AuthorityError::rate_limited(format!(
                        "{} requests within the window",
                        window.count
                    )));
                }
                window.count += 1;
                Ok(())
            }
            _ => {
                self.windows.insert(
                    identity.clone(),
                    Window {
                        count: 1,
                        window_start_ns: now_ns,
                    },
                );
                Ok(())
            }
        }
    }

    /// Forget an identity's window, e.g. when the identity is disabled
    pub fn remove(&mut self, identity: &IdentityId) {
        self.windows.remove(identity);
    }

    /// Drop windows that have fully elapsed
    pub fn sweep(&mut self, now_ns: u64) {
        let window_ns = self.window_ns;
        self.windows
            .retain(|_, w| now_ns.saturating_sub(w.window_start_ns) <= window_ns);
    }

    /// Number of identities currently tracked
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no identity is currently tracked
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> IdentityId {
        IdentityId::from_text(text)
    }

    #[test]
    fn admits_up_to_the_cap() {
        let mut limiter = RateLimiter::new(30, 30_000_000_000);
        let alice = id("alice");
        for _ in 0..30 {
            limiter.admit(&alice, 0).unwrap();
        }
        let err = limiter.admit(&alice, 1).unwrap_err();
        assert_eq!(err.code(), "rate_limited");
    }

    #[test]
    fn window_elapse_resets_the_counter() {
        let mut limiter = RateLimiter::new(2, 1_000);
        let alice = id("alice");
        limiter.admit(&alice, 0).unwrap();
        limiter.admit(&alice, 10).unwrap();
        assert!(limiter.admit(&alice, 20).is_err());
        limiter.admit(&alice, 1_001).unwrap();
    }

    #[test]
    fn identities_are_independent() {
        let mut limiter = RateLimiter::new(1, 1_000);
        limiter.admit(&id("alice"), 0).unwrap();
        limiter.admit(&id("bob"), 0).unwrap();
        assert!(limiter.admit(&id("alice"), 1).is_err());
    }

    #[test]
    fn sweep_drops_elapsed_windows() {
        let mut limiter = RateLimiter::new(1, 1_000);
        limiter.admit(&id("alice"), 0).unwrap();
        limiter.sweep(2_000);
        assert!(limiter.is_empty());
    }
}
