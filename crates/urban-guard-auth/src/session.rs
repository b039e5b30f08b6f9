//! Session store: identity + credential ownership and publication.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};
use urban_guard_core::{Credential, CredentialSource, Identity, Session};

use crate::storage::{StorageError, TokenStorage};

/// Fence for one explicit sign-in or sign-up.
///
/// Valid while no newer explicit action started and no sign-out happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AuthTicket {
    seq: u64,
    sign_outs: u64,
}

/// Fence for one identity check (startup bootstrap or refresh).
///
/// Valid while no newer check started, no explicit action installed a
/// session, and no sign-out happened. Failed explicit actions leave it
/// valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CheckTicket {
    seq: u64,
    sign_outs: u64,
}

/// Why a completion could not be installed.
#[derive(Debug)]
pub(crate) enum InstallError {
    Superseded,
    Storage(StorageError),
}

#[derive(Debug)]
struct SessionState {
    credential: Option<Credential>,
    identity: Option<Identity>,
    auth_seq: u64,
    auth_pending: bool,
    check_seq: u64,
    bootstrap_pending: bool,
    bootstrapped: bool,
    sign_outs: u64,
}

impl SessionState {
    fn snapshot(&self) -> Session {
        Session {
            identity: self.identity.clone(),
            loading: self.auth_pending || self.bootstrap_pending,
        }
    }

    fn auth_current(&self, ticket: AuthTicket) -> bool {
        self.auth_seq == ticket.seq && self.sign_outs == ticket.sign_outs
    }

    fn check_current(&self, ticket: CheckTicket) -> bool {
        self.check_seq == ticket.seq && self.sign_outs == ticket.sign_outs
    }
}

struct Shared {
    state: Mutex<SessionState>,
    storage: Arc<dyn TokenStorage>,
    publisher: watch::Sender<Session>,
}

/// Owner of the current identity and bearer credential.
///
/// Credential and identity are always replaced in one critical section, so
/// they are present or absent together after every transition. Cloning
/// yields another handle to the same session.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<Shared>,
}

impl SessionStore {
    /// Creates a store in the initial bootstrapping state.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let (publisher, _) = watch::channel(Session::bootstrapping());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    credential: None,
                    identity: None,
                    auth_seq: 0,
                    auth_pending: false,
                    check_seq: 0,
                    bootstrap_pending: true,
                    bootstrapped: false,
                    sign_outs: 0,
                }),
                storage,
                publisher,
            }),
        }
    }

    /// Returns the current session snapshot.
    pub fn snapshot(&self) -> Session {
        self.lock().snapshot()
    }

    /// Subscribes to session snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.publisher.subscribe()
    }

    /// Returns the signed-in identity.
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Returns `true` when an identity is installed.
    pub fn is_authenticated(&self) -> bool {
        self.lock().identity.is_some()
    }

    /// Clears the persisted token and the installed session.
    ///
    /// Supersedes any in-flight sign-in, sign-up, or identity check. Calling
    /// it without an active session only settles `loading`.
    pub fn sign_out(&self) {
        let mut state = self.lock();
        state.sign_outs += 1;
        if let Err(error) = self.shared.storage.remove() {
            warn!(stage = "auth", action = "sign_out", %error, "stored token could not be removed");
        }
        let had_session = state.identity.is_some();
        state.credential = None;
        state.identity = None;
        state.auth_pending = false;
        state.bootstrap_pending = false;
        self.publish(&state);
        debug!(stage = "auth", action = "sign_out", had_session, "session cleared");
    }

    pub(crate) fn load_stored(&self) -> Result<Option<Credential>, StorageError> {
        self.shared.storage.load()
    }

    /// Starts an explicit sign-in/sign-up call.
    pub(crate) fn begin_auth(&self) -> AuthTicket {
        let mut state = self.lock();
        state.auth_seq += 1;
        state.auth_pending = true;
        self.publish(&state);
        AuthTicket {
            seq: state.auth_seq,
            sign_outs: state.sign_outs,
        }
    }

    /// Persists and installs the result of an explicit action.
    ///
    /// A storage failure keeps whatever session was installed before.
    /// Success supersedes any in-flight identity check.
    pub(crate) fn install_auth(
        &self,
        ticket: AuthTicket,
        credential: Credential,
        identity: Identity,
    ) -> Result<(), InstallError> {
        let mut state = self.lock();
        if !state.auth_current(ticket) {
            return Err(InstallError::Superseded);
        }

        state.auth_pending = false;
        if let Err(error) = self.shared.storage.store(&credential) {
            self.publish(&state);
            return Err(InstallError::Storage(error));
        }

        state.credential = Some(credential);
        state.identity = Some(identity);
        state.check_seq += 1;
        state.bootstrap_pending = false;
        self.publish(&state);
        Ok(())
    }

    /// Settles `loading` after a failed explicit action, leaving the session
    /// and any in-flight identity check as they were. Returns `false` when
    /// the ticket was superseded.
    pub(crate) fn settle_auth(&self, ticket: AuthTicket) -> bool {
        let mut state = self.lock();
        if !state.auth_current(ticket) {
            return false;
        }

        state.auth_pending = false;
        self.publish(&state);
        true
    }

    /// Starts the one-shot startup check.
    ///
    /// Returns `None` when bootstrap already ran or a session is already
    /// installed.
    pub(crate) fn begin_bootstrap(&self) -> Option<CheckTicket> {
        let mut state = self.lock();
        if state.bootstrapped || state.credential.is_some() {
            state.bootstrapped = true;
            if state.bootstrap_pending {
                state.bootstrap_pending = false;
                self.publish(&state);
            }
            return None;
        }

        state.bootstrapped = true;
        state.check_seq += 1;
        state.bootstrap_pending = true;
        self.publish(&state);
        Some(CheckTicket {
            seq: state.check_seq,
            sign_outs: state.sign_outs,
        })
    }

    /// Starts an identity refresh without raising `loading`.
    pub(crate) fn begin_refresh(&self) -> (CheckTicket, Option<Credential>) {
        let mut state = self.lock();
        state.check_seq += 1;
        let ticket = CheckTicket {
            seq: state.check_seq,
            sign_outs: state.sign_outs,
        };
        (ticket, state.credential.clone())
    }

    /// Installs a credential whose identity was just verified.
    ///
    /// The token is already in storage, so nothing is written.
    pub(crate) fn install_checked(
        &self,
        ticket: CheckTicket,
        credential: Credential,
        identity: Identity,
    ) -> Result<(), InstallError> {
        let mut state = self.lock();
        if !state.check_current(ticket) {
            return Err(InstallError::Superseded);
        }

        state.credential = Some(credential);
        state.identity = Some(identity);
        state.bootstrap_pending = false;
        self.publish(&state);
        Ok(())
    }

    /// Drops every trace of `checked` after a failed identity check.
    ///
    /// With a current ticket the installed session and the stored token are
    /// cleared. With a superseded ticket the session is left alone and the
    /// stored token is removed only if it still equals `checked`. Returns
    /// `false` when the ticket was superseded.
    pub(crate) fn reset_after_failed_check(
        &self,
        ticket: CheckTicket,
        checked: Option<&Credential>,
    ) -> bool {
        let mut state = self.lock();
        if !state.check_current(ticket) {
            if let Some(checked) = checked {
                self.remove_stored_if(checked);
            }
            return false;
        }

        if let Err(error) = self.shared.storage.remove() {
            warn!(stage = "bootstrap", action = "clear_token", %error, "stored token could not be removed");
        }
        state.credential = None;
        state.identity = None;
        state.bootstrap_pending = false;
        self.publish(&state);
        true
    }

    /// Caller holds the state lock, so no install can interleave.
    fn remove_stored_if(&self, checked: &Credential) {
        match self.shared.storage.load() {
            Ok(Some(stored)) if &stored == checked => {
                if let Err(error) = self.shared.storage.remove() {
                    warn!(stage = "bootstrap", action = "clear_token", %error, "stored token could not be removed");
                }
            }
            Ok(_) => {}
            Err(error) => {
                warn!(stage = "bootstrap", action = "clear_token", %error, "stored token unreadable");
            }
        }
    }

    fn publish(&self, state: &SessionState) {
        self.shared.publisher.send_replace(state.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialSource for SessionStore {
    fn current_credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionStore")
            .field("authenticated", &state.identity.is_some())
            .field("loading", &state.snapshot().loading)
            .field("sign_outs", &state.sign_outs)
            .finish()
    }
}
