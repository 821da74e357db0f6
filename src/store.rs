use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::codegen;
use crate::relay::{self, RelaySettings};
use crate::session::Session;

/// Token -> session map shared by the gateway and every relay task.
///
/// The map has its own locking; it is never held while a session's guard is
/// taken, so unrelated sessions never serialize on each other's buffers.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Arc<Session>>>,
    settings: Arc<RelaySettings>,
}

impl SessionStore {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Returns the session for `token`, or mints a new one and starts its
    /// relay task when the token is absent or unknown.
    pub fn resolve(&self, token: Option<&str>) -> Arc<Session> {
        if let Some(session) = token.and_then(|t| self.get(t)) {
            return session;
        }

        let session = loop {
            let token = codegen::make_token(codegen::TOKEN_LEN);

            if let Entry::Vacant(slot) = self.sessions.entry(token.clone()) {
                let session = Arc::new(Session::new(token));
                slot.insert(session.clone());
                break session;
            }
        };

        tracing::info!(
            session = %session.short_token(),
            sessions = self.len(),
            "session created"
        );

        relay::spawn(self.clone(), session.clone());

        session
    }

    pub fn get(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.get(token).map(|guard| guard.clone())
    }

    pub fn remove(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    /// Removes `session` only if its token still maps to that same record.
    pub fn remove_exact(&self, session: &Arc<Session>) -> bool {
        self.sessions
            .remove_if(session.token(), |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
