//! Telegram API boundary: shared types, errors, and the [`TelegramApi`] trait.
//!
//! The protocol itself (MTProto handshake, TL serialization, key negotiation)
//! lives in a gateway sidecar. This crate only issues the five method calls it
//! needs and carries the opaque session blob back and forth.
//!
//! One implementation ships with the crate:
//! - [`gateway::GatewayClient`] — JSON method calls over HTTP to the gateway

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod gateway;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Opaque authorization blob produced by the protocol client.
///
/// The structure belongs to the gateway; this crate never looks inside it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(pub serde_json::Value);

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Session").field(&"[REDACTED]").finish()
    }
}

/// A resolved channel: numeric identifier plus the access hash required
/// alongside it in every peer reference.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    /// Channel identifier.
    pub id: i64,
    /// Per-channel access hash, kept as the opaque string the gateway returns.
    pub access_hash: String,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("access_hash", &"[REDACTED]")
            .finish()
    }
}

/// A single channel message as returned by the history call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message identifier, unique within the channel.
    pub id: i64,
    /// Unix timestamp (seconds) the message was sent.
    pub timestamp: i64,
    /// Message text; `None` for service messages and media without caption.
    pub text: Option<String>,
    /// Sending user, absent for posts made in the channel's own name.
    pub sender_id: Option<i64>,
}

impl Message {
    /// Whether the message carries non-empty text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Result of requesting a one-time login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    /// Hash that must accompany the code in the sign-in call.
    pub phone_code_hash: String,
}

/// The account behind the current session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionUser {
    /// User identifier.
    pub id: i64,
    /// First name, if the profile has one.
    pub first_name: Option<String>,
    /// Public username, if set.
    pub username: Option<String>,
}

impl std::fmt::Display for SessionUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.username, &self.first_name) {
            (Some(username), _) => write!(f, "@{username} ({})", self.id),
            (None, Some(name)) => write!(f, "{name} ({})", self.id),
            (None, None) => write!(f, "user {}", self.id),
        }
    }
}

/// Outcome of exchanging a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The account exists and the session is now authorized.
    Authorized(SessionUser),
    /// The phone number has no account; registration is not attempted.
    SignUpRequired,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// RPC error messages that mean the session is missing or no longer valid.
const CREDENTIAL_ERRORS: &[&str] = &[
    "AUTH_KEY_UNREGISTERED",
    "AUTH_KEY_INVALID",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
];

/// Errors returned by the Telegram API boundary.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The platform rejected the call.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Numeric error code (401 for authorization errors).
        code: i32,
        /// Upper-case error message, e.g. `AUTH_KEY_UNREGISTERED`.
        message: String,
    },
    /// The gateway answered with a non-success status and no RPC error body.
    #[error("gateway returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Response did not match the expected shape.
    #[error("gateway response parse error: {0}")]
    Parse(String),
    /// The lookup succeeded but returned nothing usable.
    #[error("not found: {0}")]
    NotFound(String),
}

impl TelegramError {
    /// Whether this error means the stored session is missing or invalid
    /// and a fresh login is required.
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                *code == 401 || CREDENTIAL_ERRORS.contains(&message.as_str())
            }
            Self::HttpStatus { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// Collapse whitespace, mask key material, and truncate an error body so it
/// is safe to log.
pub(crate) fn sanitize_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [r"[A-Fa-f0-9]{32,}", r"[A-Za-z0-9+/=_\-]{64,}"] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The remote operations this crate consumes.
///
/// Implementations hold the credential slot: the session injected with
/// [`TelegramApi::set_session`] is attached to every call, and a session
/// returned by the remote side replaces it.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Replace the session in the credential slot.
    async fn set_session(&self, session: Option<Session>);

    /// Current contents of the credential slot.
    async fn session(&self) -> Option<Session>;

    /// Ask the platform to deliver a one-time code to `phone`.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError`] on transport, RPC, or parse failure.
    async fn send_code(&self, phone: &str) -> Result<SentCode, TelegramError>;

    /// Exchange the one-time code for an authorized session.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError`] on transport, RPC, or parse failure.
    async fn sign_in(
        &self,
        phone: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<SignInOutcome, TelegramError>;

    /// Fetch the account behind the current session.
    ///
    /// # Errors
    ///
    /// Returns a credential-class [`TelegramError`] when the session is not
    /// authorized.
    async fn get_self(&self) -> Result<SessionUser, TelegramError>;

    /// Resolve a public channel alias.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::NotFound`] when the alias names no channel.
    async fn resolve_username(&self, alias: &str) -> Result<ChannelHandle, TelegramError>;

    /// Fetch up to `limit` most recent messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError`] on transport, RPC, or parse failure.
    async fn get_history(
        &self,
        channel: &ChannelHandle,
        limit: u32,
    ) -> Result<Vec<Message>, TelegramError>;
}
