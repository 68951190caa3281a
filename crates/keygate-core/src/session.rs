//! Access session state machine.
//!
//! Holds the currently unlocked token and its expiry. Expiry is lazy: the
//! session only notices it has run out when someone asks, so there is no
//! timer task racing the event path.
//!
//! # State Machine
//!
//! ```text
//!            unlock                       renew (extends expiry)
//! ┌────────┐ ─────────────> ┌──────────┐ ─────┐
//! │ Locked │                │ Unlocked │ <────┘
//! └────────┘ <───────────── └──────────┘
//!   │    ▲    lock, or now >= expiry   │
//!   └────┘                             │ unlock (fresh token)
//!   renew (no-op)                      └──────> Unlocked
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use keygate_crypto::{MasterKey, Token};

use crate::{
    Environment, Operation, SessionInstant, TokenRequest, TokenValidator,
    protocol::DEFAULT_WINDOW_GRANULARITY,
};

/// Default session validity (10 minutes)
pub const DEFAULT_SESSION_VALIDITY: Duration = Duration::from_secs(600);

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a session stays unlocked after `unlock` or `renew`
    pub validity: Duration,
    /// Token time-window size
    pub window_granularity: Duration,
    /// Path bound into session tokens
    pub scope: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validity: DEFAULT_SESSION_VALIDITY,
            window_granularity: DEFAULT_WINDOW_GRANULARITY,
            scope: "/".to_string(),
        }
    }
}

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No valid session
    Locked,
    /// Session open
    Unlocked {
        /// Time until expiry
        remaining: Duration,
    },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("LOCKED"),
            Self::Unlocked { remaining } => {
                write!(f, "UNLOCKED ({}s remaining)", remaining.as_secs())
            },
        }
    }
}

#[derive(Debug, Clone)]
enum SessionState<I> {
    Locked,
    Unlocked { token: Token, request: TokenRequest, expiry: I },
}

/// Access session for one protected scope.
///
/// Pure state machine: time comes in as a parameter (or through the
/// environment on `unlock`).
#[derive(Debug, Clone)]
pub struct AccessSession<I: SessionInstant> {
    config: SessionConfig,
    state: SessionState<I>,
}

impl<I: SessionInstant> AccessSession<I> {
    /// Create a session in the Locked state.
    pub fn new(config: SessionConfig) -> Self {
        Self { config, state: SessionState::Locked }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open (or reopen) the session with a fresh token bound to `scope`.
    ///
    /// Draws new nonces, quantizes the current time, and sets
    /// `expiry = now + validity`. Valid from either state.
    pub fn unlock<E>(&mut self, env: &E, master: &MasterKey, scope: &str) -> Token
    where
        E: Environment<Instant = I>,
    {
        let validator = TokenValidator::new(env.clone(), self.config.window_granularity);
        let (request, token) = validator.issue(master, scope, Operation::Write);
        let expiry = env.now() + self.config.validity;

        tracing::debug!(token = %token.log_prefix(), scope, "session unlocked");
        self.state = SessionState::Unlocked { token, request, expiry };
        token
    }

    /// Extend expiry from `now` without minting a new token.
    ///
    /// Returns `false` and stays Locked if the session is not valid at `now`.
    pub fn renew(&mut self, now: I) -> bool {
        if !self.is_valid(now) {
            tracing::debug!("renew ignored: session locked");
            return false;
        }

        let validity = self.config.validity;
        if let SessionState::Unlocked { expiry, .. } = &mut self.state {
            *expiry = now + validity;
        }
        tracing::debug!("session renewed");
        true
    }

    /// Return to Locked immediately, discarding the token.
    pub fn lock(&mut self) {
        if matches!(self.state, SessionState::Unlocked { .. }) {
            tracing::debug!("session locked");
        }
        self.state = SessionState::Locked;
    }

    /// True iff Unlocked and `now < expiry`.
    ///
    /// Observing `now >= expiry` moves the session to Locked.
    pub fn is_valid(&mut self, now: I) -> bool {
        match self.state {
            SessionState::Unlocked { expiry, .. } if now < expiry => true,
            SessionState::Unlocked { .. } => {
                tracing::debug!("session expired");
                self.state = SessionState::Locked;
                false
            },
            SessionState::Locked => false,
        }
    }

    /// Current status at `now`, applying lazy expiry first.
    pub fn status(&mut self, now: I) -> SessionStatus {
        if !self.is_valid(now) {
            return SessionStatus::Locked;
        }
        match self.state {
            SessionState::Unlocked { expiry, .. } => SessionStatus::Unlocked { remaining: expiry - now },
            SessionState::Locked => SessionStatus::Locked,
        }
    }

    /// Token held by the session, if unlocked. Does not apply expiry.
    pub fn current_token(&self) -> Option<Token> {
        match &self.state {
            SessionState::Unlocked { token, .. } => Some(*token),
            SessionState::Locked => None,
        }
    }

    /// Request the current token was derived from, if unlocked.
    pub fn current_request(&self) -> Option<&TokenRequest> {
        match &self.state {
            SessionState::Unlocked { request, .. } => Some(request),
            SessionState::Locked => None,
        }
    }
}

/// Shared session for the event path and the control path.
///
/// The mutex is held only for the state check or update itself, never across
/// I/O.
pub struct SessionHandle<E: Environment> {
    env: E,
    session: Arc<Mutex<AccessSession<E::Instant>>>,
}

impl<E: Environment> Clone for SessionHandle<E> {
    fn clone(&self) -> Self {
        Self { env: self.env.clone(), session: Arc::clone(&self.session) }
    }
}

impl<E: Environment> SessionHandle<E> {
    /// Create a locked session.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self { env, session: Arc::new(Mutex::new(AccessSession::new(config))) }
    }

    /// Environment the session reads its clock from.
    pub fn env(&self) -> &E {
        &self.env
    }

    #[allow(clippy::expect_used)]
    fn with<R>(&self, f: impl FnOnce(&mut AccessSession<E::Instant>) -> R) -> R {
        let mut session = self.session.lock().expect("invariant: session mutex poisoned");
        f(&mut session)
    }

    /// Unlock for the configured scope.
    pub fn unlock(&self, master: &MasterKey) -> Token {
        self.with(|s| {
            let scope = s.config().scope.clone();
            s.unlock(&self.env, master, &scope)
        })
    }

    /// Unlock bound to an explicit scope path.
    pub fn unlock_scope(&self, master: &MasterKey, scope: &str) -> Token {
        self.with(|s| s.unlock(&self.env, master, scope))
    }

    /// Extend expiry. `false` if the session is locked.
    pub fn renew(&self) -> bool {
        let now = self.env.now();
        self.with(|s| s.renew(now))
    }

    /// Lock immediately.
    pub fn lock(&self) {
        self.with(AccessSession::lock);
    }

    /// Whether the session is valid right now.
    pub fn is_valid(&self) -> bool {
        let now = self.env.now();
        self.with(|s| s.is_valid(now))
    }

    /// Status right now.
    pub fn status(&self) -> SessionStatus {
        let now = self.env.now();
        self.with(|s| s.status(now))
    }

    /// Token held by the session, if still valid.
    pub fn current_token(&self) -> Option<Token> {
        let now = self.env.now();
        self.with(|s| if s.is_valid(now) { s.current_token() } else { None })
    }
}
