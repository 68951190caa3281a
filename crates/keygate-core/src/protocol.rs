//! Token protocol.
//!
//! A requester and a verifier that share a master key derive the same token
//! for the same [`TokenRequest`] without ever exchanging the key. The token
//! is bound to both nonces, the quantized time window, the path and the
//! operation.
//!
//! # Validation
//!
//! ```text
//! token ──┐
//!         ├─ recompute at *current* window ── differs ── used? ─ yes ─> AlreadyUsed
//! request ┘                                     │                └ no ──> Mismatch
//!                                               └ equal ── check_and_insert
//!                                                            ├ inserted ─> Granted
//!                                                            └ present ──> AlreadyUsed
//! ```
//!
//! Windows never straddle: a token minted in window N is refused in N-1 and
//! N+1, even one second past the boundary.

use std::{fmt, str::FromStr, time::Duration};

use keygate_crypto::{MasterKey, Nonce, Token, derive_token};
use serde::{Deserialize, Serialize};

use crate::{DenyReason, Environment, ParseError, UsedTokenSet};

/// Default window granularity (5 minutes)
pub const DEFAULT_WINDOW_GRANULARITY: Duration = Duration::from_secs(300);

/// Kind of access a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Read access
    Read,
    /// Write access
    Write,
}

impl Operation {
    /// Lowercase name, as bound into the token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Start of a time window, in seconds since the Unix epoch.
///
/// Always a multiple of the granularity it was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow(u64);

impl TimeWindow {
    /// Window containing `epoch_secs`.
    ///
    /// A zero granularity is treated as one second.
    pub fn containing(epoch_secs: u64, granularity: Duration) -> Self {
        let step = granularity.as_secs().max(1);
        Self(epoch_secs / step * step)
    }

    /// Wrap an already-quantized window start.
    pub fn from_start(start_secs: u64) -> Self {
        Self(start_secs)
    }

    /// Window start in epoch seconds.
    pub fn start_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a token is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Requester's nonce
    pub client_nonce: Nonce,
    /// Verifier's nonce
    pub server_nonce: Nonce,
    /// Quantized time window
    pub window: TimeWindow,
    /// Target path
    pub path: String,
    /// Requested operation
    pub operation: Operation,
}

impl TokenRequest {
    /// HKDF salt: the window start as ASCII decimal.
    pub fn salt(&self) -> String {
        self.window.to_string()
    }

    /// HKDF info: `clientNonce:serverNonce:window:path:operation`.
    pub fn info(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.client_nonce, self.server_nonce, self.window, self.path, self.operation
        )
    }

    /// Same request, re-bound to another window.
    pub fn at_window(&self, window: TimeWindow) -> Self {
        Self { window, ..self.clone() }
    }
}

/// Successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Granted {
    /// Token that was consumed
    pub token: Token,
    /// Window it was valid in
    pub window: TimeWindow,
}

/// Derive the token for `request`.
pub fn generate_token(master: &MasterKey, request: &TokenRequest) -> Token {
    derive_token(master, request.salt().as_bytes(), request.info().as_bytes())
}

/// Validate `token` for `request` against the current window.
///
/// On success the token is consumed: it is inserted into `used` in the same
/// critical section that checked it was absent. A ledger failure denies with
/// [`DenyReason::StoreUnavailable`].
pub fn validate_token<U>(
    token: &Token,
    request: &TokenRequest,
    master: &MasterKey,
    current_window: TimeWindow,
    used: &U,
) -> Result<Granted, DenyReason>
where
    U: UsedTokenSet + ?Sized,
{
    let expected = generate_token(master, &request.at_window(current_window));

    if !expected.ct_eq(token) {
        let reason = match used.contains(token) {
            Ok(true) => DenyReason::AlreadyUsed,
            Ok(false) => DenyReason::Mismatch,
            Err(e) => {
                tracing::error!(error = %e, "used-token set unavailable");
                DenyReason::StoreUnavailable
            },
        };
        tracing::debug!(token = %token.log_prefix(), reason = reason.as_str(), "token denied");
        return Err(reason);
    }

    match used.check_and_insert(token) {
        Ok(true) => {
            tracing::debug!(token = %token.log_prefix(), window = %current_window, "token granted");
            Ok(Granted { token: *token, window: current_window })
        },
        Ok(false) => {
            tracing::debug!(token = %token.log_prefix(), reason = "ALREADY_USED", "token denied");
            Err(DenyReason::AlreadyUsed)
        },
        Err(e) => {
            tracing::error!(error = %e, "used-token set unavailable");
            Err(DenyReason::StoreUnavailable)
        },
    }
}

/// Issues and validates tokens against an environment's clock.
#[derive(Debug, Clone)]
pub struct TokenValidator<E: Environment> {
    env: E,
    granularity: Duration,
}

impl<E: Environment> TokenValidator<E> {
    /// Create a validator quantizing time to `granularity`.
    pub fn new(env: E, granularity: Duration) -> Self {
        Self { env, granularity }
    }

    /// Window containing the environment's current wall-clock time.
    pub fn current_window(&self) -> TimeWindow {
        TimeWindow::containing(self.env.wall_clock_secs(), self.granularity)
    }

    /// Build a fresh request for `path`/`operation` with random nonces in the
    /// current window.
    pub fn new_request(&self, path: &str, operation: Operation) -> TokenRequest {
        TokenRequest {
            client_nonce: Nonce::from_bytes(self.env.random_16()),
            server_nonce: Nonce::from_bytes(self.env.random_16()),
            window: self.current_window(),
            path: path.to_string(),
            operation,
        }
    }

    /// Build a fresh request and derive its token.
    pub fn issue(
        &self,
        master: &MasterKey,
        path: &str,
        operation: Operation,
    ) -> (TokenRequest, Token) {
        let request = self.new_request(path, operation);
        let token = generate_token(master, &request);
        tracing::debug!(token = %token.log_prefix(), path, %operation, "token issued");
        (request, token)
    }

    /// Validate against the current window. See [`validate_token`].
    pub fn validate<U>(
        &self,
        token: &Token,
        request: &TokenRequest,
        master: &MasterKey,
        used: &U,
    ) -> Result<Granted, DenyReason>
    where
        U: UsedTokenSet + ?Sized,
    {
        validate_token(token, request, master, self.current_window(), used)
    }
}
