//! Startup authentication: reuse a stored session or log in with a one-time
//! code.
//!
//! The flow has exactly one human suspension point, the code prompt, and it
//! is only reachable from [`Authenticator::authorize`], which runs once
//! before polling starts.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::session::{SessionError, SessionStore};
use crate::telegram::{SessionUser, SignInOutcome, TelegramApi, TelegramError};

/// Prompt text shown when asking for the login code.
pub const CODE_PROMPT: &str = "Enter the code sent to your phone: ";

/// Errors that abort authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A remote call failed for a reason other than a missing session.
    #[error("authorization failed: {0}")]
    Api(#[from] TelegramError),
    /// The phone number has no account. Registration is never automated.
    #[error("registration required: {phone} has no account")]
    RegistrationRequired {
        /// Phone number that was rejected.
        phone: String,
    },
    /// The prompt returned an empty code.
    #[error("no login code entered")]
    EmptyCode,
    /// Reading the code from the user failed.
    #[error("failed to read login code: {0}")]
    Prompt(#[source] std::io::Error),
    /// The session file could not be read or written.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How the session became authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    /// The stored session was still valid.
    StoredSession,
    /// A fresh login with a one-time code was completed.
    FreshLogin,
}

/// Result of a successful [`Authenticator::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    /// Account behind the session.
    pub user: SessionUser,
    /// Which branch produced the session.
    pub path: AuthPath,
}

/// Source of the one-time login code.
#[async_trait]
pub trait CodePrompt: Send + Sync {
    /// Show `message` and return the line the user entered.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if input cannot be read.
    async fn read_code(&self, message: &str) -> std::io::Result<String>;
}

/// Reads the code from stdin, writing the prompt to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl CodePrompt for StdinPrompt {
    async fn read_code(&self, message: &str) -> std::io::Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(message.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed before a code was entered",
            ));
        }
        Ok(line)
    }
}

/// Orchestrates session reuse and the login sub-flow.
pub struct Authenticator<'a> {
    api: &'a dyn TelegramApi,
    store: &'a SessionStore,
    phone: &'a str,
}

impl<'a> Authenticator<'a> {
    /// Create an authenticator for the account at `phone`.
    pub fn new(api: &'a dyn TelegramApi, store: &'a SessionStore, phone: &'a str) -> Self {
        Self { api, store, phone }
    }

    /// Bring the API client into the authenticated state.
    ///
    /// Loads the stored session into the client's credential slot and probes
    /// it with a self-identity call. A credential-class failure starts the
    /// login sub-flow; any other failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RegistrationRequired`] when the phone has no
    /// account, and [`AuthError::Api`] for non-credential remote failures.
    pub async fn authorize(&self, prompt: &dyn CodePrompt) -> Result<Authorized, AuthError> {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e @ SessionError::Corrupt { .. }) => {
                warn!(error = %e, "ignoring corrupt session file, a fresh login is required");
                None
            }
            Err(e) => return Err(e.into()),
        };
        self.api.set_session(stored).await;

        match self.api.get_self().await {
            Ok(user) => {
                info!(%user, "session loaded");
                Ok(Authorized {
                    user,
                    path: AuthPath::StoredSession,
                })
            }
            Err(e) if e.is_credential_error() => {
                info!(reason = %e, "session not authorized, starting login");
                let user = self.login(prompt).await?;
                Ok(Authorized {
                    user,
                    path: AuthPath::FreshLogin,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Request a code, prompt for it, exchange it, and persist the session.
    async fn login(&self, prompt: &dyn CodePrompt) -> Result<SessionUser, AuthError> {
        let sent = self.api.send_code(self.phone).await?;
        info!("login code requested");

        let code = prompt.read_code(CODE_PROMPT).await.map_err(AuthError::Prompt)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }

        let user = match self
            .api
            .sign_in(self.phone, &sent.phone_code_hash, code)
            .await?
        {
            SignInOutcome::Authorized(user) => user,
            SignInOutcome::SignUpRequired => {
                return Err(AuthError::RegistrationRequired {
                    phone: self.phone.to_owned(),
                });
            }
        };
        info!(%user, "logged in");

        match self.api.session().await {
            Some(session) => {
                self.store.save(&session)?;
                info!(path = %self.store.path().display(), "session persisted");
            }
            None => warn!("gateway returned no session after sign-in, nothing persisted"),
        }

        Ok(user)
    }
}
