//! Session manager: the single owner of the persisted token set.
//!
//! All work happens on one tokio task fed by a command queue. UI calls and
//! refresh timers both become messages on that queue, so a sign-in, a
//! refresh and a logout can never interleave. The public `SessionManager`
//! is a cheap, cloneable handle to that task.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiError, IdentityProvider};
use crate::models::{AccountGrant, User};
use crate::storage::KeyValueStore;

use super::error::{AuthError, GOOGLE_NOT_IMPLEMENTED};
use super::scheduler::{Clock, RefreshDue, Scheduler, SystemClock, Timer, TokioScheduler};
use super::session::{refresh_delay, SessionTokenSet, REFRESH_TOKEN_KEY};

pub(crate) enum Command {
    SignIn {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<SessionTokenSet, AuthError>>,
    },
    SignUp {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<SessionTokenSet, AuthError>>,
    },
    StoredSession {
        reply: oneshot::Sender<Option<SessionTokenSet>>,
    },
    Refresh {
        reply: oneshot::Sender<Option<String>>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    RefreshDue {
        generation: u64,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SignIn { email, .. } => f.debug_struct("SignIn").field("email", email).finish_non_exhaustive(),
            Command::SignUp { email, .. } => f.debug_struct("SignUp").field("email", email).finish_non_exhaustive(),
            Command::StoredSession { .. } => f.write_str("StoredSession"),
            Command::Refresh { .. } => f.write_str("Refresh"),
            Command::Logout { .. } => f.write_str("Logout"),
            Command::RefreshDue { generation } => f
                .debug_struct("RefreshDue")
                .field("generation", generation)
                .finish(),
        }
    }
}

/// Handle to the session manager task.
///
/// Construct one at the composition root and pass clones to whatever needs
/// authentication. The task stops once every handle is dropped.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    user: watch::Receiver<Option<User>>,
}

impl SessionManager {
    /// Start a session manager on the current tokio runtime using the system
    /// clock and tokio timers.
    pub fn spawn(provider: Arc<dyn IdentityProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::spawn_with(provider, store, Arc::new(SystemClock), Arc::new(TokioScheduler))
    }

    /// Start a session manager with an explicit clock and scheduler.
    pub fn spawn_with(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (user_tx, user_rx) = watch::channel(None);

        let actor = SessionActor {
            provider,
            store,
            clock,
            scheduler,
            queue: tx.downgrade(),
            timer: None,
            generation: 0,
            user: user_tx,
        };
        tokio::spawn(actor.run(rx));

        Self {
            commands: tx,
            user: user_rx,
        }
    }

    /// Sign in with email and password. Provider errors carry the provider's
    /// message unchanged.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokenSet, AuthError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SignIn {
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| AuthError::Closed)?
    }

    /// Create an account. Same contract as `sign_in`.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionTokenSet, AuthError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SignUp {
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| AuthError::Closed)?
    }

    /// Google sign-in is not available; this always fails.
    pub async fn sign_in_with_google(&self) -> Result<SessionTokenSet, AuthError> {
        Err(AuthError::NotImplemented(GOOGLE_NOT_IMPLEMENTED))
    }

    /// The persisted session, refreshed first if it is within 5 minutes of
    /// expiry. `None` means signed out.
    pub async fn stored_session(&self) -> Option<SessionTokenSet> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::StoredSession { reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// An id token that is safe to use right now, if signed in.
    pub async fn valid_id_token(&self) -> Option<String> {
        self.stored_session().await.map(|session| session.id_token)
    }

    /// Exchange the stored refresh token for a new id token.
    ///
    /// Never fails loudly: without a refresh token this returns `None`, and a
    /// provider failure signs the user out before returning `None`.
    pub async fn refresh(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refresh { reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// Cancel the refresh timer and drop the stored session. Local only.
    pub async fn logout(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Logout { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// The signed-in user as last observed by the manager
    pub fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    /// Watch sign-in state, including sign-outs forced by a failed
    /// background refresh.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.clone()
    }

    fn send(&self, command: Command) -> Result<(), AuthError> {
        self.commands.send(command).map_err(|_| AuthError::Closed)
    }
}

struct ArmedTimer {
    generation: u64,
    timer: Box<dyn Timer>,
}

struct SessionActor {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    queue: mpsc::WeakUnboundedSender<Command>,
    timer: Option<ArmedTimer>,
    generation: u64,
    user: watch::Sender<Option<User>>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("Session manager started");
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        self.cancel_timer();
        debug!("Session manager stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::SignIn {
                email,
                password,
                reply,
            } => {
                let provider = Arc::clone(&self.provider);
                let result = provider.sign_in(&email, &password).await;
                let _ = reply.send(self.establish(result, "sign-in"));
            }
            Command::SignUp {
                email,
                password,
                reply,
            } => {
                let provider = Arc::clone(&self.provider);
                let result = provider.sign_up(&email, &password).await;
                let _ = reply.send(self.establish(result, "sign-up"));
            }
            Command::StoredSession { reply } => {
                let session = self.stored_session().await;
                let _ = reply.send(session);
            }
            Command::Refresh { reply } => {
                let token = self.refresh().await;
                let _ = reply.send(token);
            }
            Command::Logout { reply } => {
                self.purge();
                info!("Signed out");
                let _ = reply.send(());
            }
            Command::RefreshDue { generation } => self.on_refresh_due(generation).await,
        }
    }

    /// Persist a fresh grant and arm the refresh timer.
    fn establish(
        &mut self,
        result: Result<AccountGrant, ApiError>,
        operation: &'static str,
    ) -> Result<SessionTokenSet, AuthError> {
        let grant = result.map_err(|e| {
            warn!(operation, error = %e, "Identity provider request failed");
            AuthError::from(e)
        })?;

        let expires_in_secs = grant.tokens.expires_in_secs;
        let session = SessionTokenSet::issue(grant, self.clock.now_ms());
        if let Err(e) = session.save(self.store.as_ref()) {
            // The caller still gets a working token; the next read reports
            // signed out.
            warn!(operation, error = %e, "Failed to persist session");
        }

        self.schedule_refresh(expires_in_secs);
        self.publish(Some(session.user.clone()));
        info!(operation, user = %session.user.local_id, expires_in_secs, "Signed in");
        Ok(session)
    }

    async fn stored_session(&mut self) -> Option<SessionTokenSet> {
        let session = match SessionTokenSet::load(self.store.as_ref()) {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No stored session");
                self.publish(None);
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session, treating as signed out");
                self.publish(None);
                return None;
            }
        };

        let now = self.clock.now_ms();
        if session.needs_refresh(now) {
            debug!(
                expiry = session.expiry_timestamp,
                now, "Stored token inside refresh window, refreshing"
            );
            if self.refresh().await.is_none() {
                self.purge();
                return None;
            }
            return match SessionTokenSet::load(self.store.as_ref()) {
                Ok(Some(session)) => {
                    self.publish(Some(session.user.clone()));
                    Some(session)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "Failed to re-read refreshed session");
                    None
                }
            };
        }

        self.schedule_refresh(session.seconds_until_expiry(now));
        self.publish(Some(session.user.clone()));
        Some(session)
    }

    async fn refresh(&mut self) -> Option<String> {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored, skipping refresh");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read refresh token");
                return None;
            }
        };

        let provider = Arc::clone(&self.provider);
        let grant = match provider.refresh(&refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing out");
                self.purge();
                return None;
            }
        };

        match SessionTokenSet::save_refreshed(&grant, self.clock.now_ms(), self.store.as_ref()) {
            Ok(expiry) => debug!(expiry, "Stored refreshed tokens"),
            Err(e) => {
                warn!(error = %e, "Failed to store refreshed tokens, signing out");
                self.purge();
                return None;
            }
        }

        self.schedule_refresh(grant.expires_in_secs);
        info!(expires_in_secs = grant.expires_in_secs, "Session refreshed");
        Some(grant.id_token)
    }

    async fn on_refresh_due(&mut self, generation: u64) {
        let armed = self.timer.as_ref().map(|t| t.generation);
        if armed != Some(generation) {
            debug!(generation, ?armed, "Ignoring superseded refresh timer");
            return;
        }
        // The timer has fired; there is nothing left to cancel.
        self.timer = None;
        debug!(generation, "Refresh timer fired");
        self.refresh().await;
    }

    fn schedule_refresh(&mut self, expires_in_secs: i64) {
        self.cancel_timer();

        self.generation += 1;
        let delay = refresh_delay(expires_in_secs);
        let due = RefreshDue::new(self.generation, self.queue.clone());
        let timer = self.scheduler.schedule(delay, due);
        self.timer = Some(ArmedTimer {
            generation: self.generation,
            timer,
        });
        debug!(
            generation = self.generation,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Armed refresh timer"
        );
    }

    fn cancel_timer(&mut self) {
        if let Some(armed) = self.timer.take() {
            debug!(generation = armed.generation, "Cancelled refresh timer");
            armed.timer.cancel();
        }
    }

    /// Forget the session entirely: timer, stored keys and published user.
    fn purge(&mut self) {
        self.cancel_timer();
        if let Err(e) = SessionTokenSet::clear(self.store.as_ref()) {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.publish(None);
    }

    fn publish(&self, user: Option<User>) {
        self.user.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });
    }
}
