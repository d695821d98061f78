/// Observable sign-in state
///
/// The user and the session are only ever held together; every change goes
/// through [`AuthState::apply`].
use garden_auth::wire::{AuthenticatedUser, SessionGrant};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// A wallet login is in flight; `previous` is the session held before it
    Authenticating {
        previous: Option<(AuthenticatedUser, SessionGrant)>,
    },
    Authenticated {
        user: AuthenticatedUser,
        session: SessionGrant,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoginStarted,
    LoginSucceeded {
        user: AuthenticatedUser,
        session: SessionGrant,
    },
    LoginFailed,
    /// The login future was dropped before finishing
    LoginAborted,
    Restored {
        user: AuthenticatedUser,
        session: SessionGrant,
    },
    LoggedOut,
}

impl AuthState {
    pub fn apply(&self, event: AuthEvent) -> AuthState {
        match (self, event) {
            (_, AuthEvent::LoginSucceeded { user, session })
            | (_, AuthEvent::Restored { user, session }) => AuthState::Authenticated { user, session },
            (_, AuthEvent::LoggedOut) => AuthState::Unauthenticated,
            (AuthState::Unauthenticated, AuthEvent::LoginStarted) => {
                AuthState::Authenticating { previous: None }
            }
            (AuthState::Authenticated { user, session }, AuthEvent::LoginStarted) => {
                AuthState::Authenticating {
                    previous: Some((user.clone(), session.clone())),
                }
            }
            (AuthState::Authenticating { previous }, AuthEvent::LoginFailed)
            | (AuthState::Authenticating { previous }, AuthEvent::LoginAborted) => {
                match previous.clone() {
                    Some((user, session)) => AuthState::Authenticated { user, session },
                    None => AuthState::Unauthenticated,
                }
            }
            (state, AuthEvent::LoginStarted)
            | (state, AuthEvent::LoginFailed)
            | (state, AuthEvent::LoginAborted) => state.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn is_authenticating(&self) -> bool {
        matches!(self, AuthState::Authenticating { .. })
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            AuthState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&SessionGrant> {
        match self {
            AuthState::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Session the client is responsible for, including one parked by an
    /// in-flight login
    pub(crate) fn held_session(&self) -> Option<&SessionGrant> {
        match self {
            AuthState::Authenticated { session, .. } => Some(session),
            AuthState::Authenticating {
                previous: Some((_, session)),
            } => Some(session),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn signed_in(token: &str) -> (AuthenticatedUser, SessionGrant) {
        (
            AuthenticatedUser {
                id: Uuid::new_v4(),
                wallet_address: "0xabc".to_string(),
                public_key: "0x01".to_string(),
                display_name: "User 0xabc".to_string(),
                avatar_url: None,
            },
            SessionGrant {
                access_token: token.to_string(),
                expires_at: Utc::now(),
            },
        )
    }

    #[test]
    fn test_login_lifecycle() {
        let (user, session) = signed_in("t1");
        let state = AuthState::default().apply(AuthEvent::LoginStarted);
        assert!(state.is_authenticating());
        assert!(!state.is_authenticated());

        let state = state.apply(AuthEvent::LoginSucceeded {
            user: user.clone(),
            session: session.clone(),
        });
        assert!(state.is_authenticated());
        assert_eq!(state.user(), Some(&user));
        assert_eq!(state.session(), Some(&session));

        assert_eq!(state.apply(AuthEvent::LoggedOut), AuthState::Unauthenticated);
    }

    #[test]
    fn test_failed_login_without_prior_session() {
        let state = AuthState::Unauthenticated
            .apply(AuthEvent::LoginStarted)
            .apply(AuthEvent::LoginFailed);
        assert_eq!(state, AuthState::Unauthenticated);
    }

    #[test]
    fn test_failed_relogin_keeps_prior_session() {
        let (user, session) = signed_in("t1");
        let prior = AuthState::Authenticated { user, session };

        let during = prior.apply(AuthEvent::LoginStarted);
        assert!(during.user().is_none());
        assert_eq!(during.held_session().map(|s| s.access_token.as_str()), Some("t1"));
        assert_eq!(during.apply(AuthEvent::LoginAborted), prior);
    }

    #[test]
    fn test_stray_failure_is_ignored() {
        let (user, session) = signed_in("t1");
        let state = AuthState::Authenticated { user, session };
        assert_eq!(state.apply(AuthEvent::LoginFailed), state);
        assert_eq!(AuthState::Unauthenticated.apply(AuthEvent::LoginAborted), AuthState::Unauthenticated);
    }

    #[test]
    fn test_user_present_iff_session_present() {
        let (user, session) = signed_in("t1");
        let events = [
            AuthEvent::LoginStarted,
            AuthEvent::LoginFailed,
            AuthEvent::Restored {
                user: user.clone(),
                session: session.clone(),
            },
            AuthEvent::LoginStarted,
            AuthEvent::LoginAborted,
            AuthEvent::LoggedOut,
        ];

        let mut state = AuthState::Unauthenticated;
        for event in events {
            state = state.apply(event);
            assert_eq!(state.user().is_some(), state.session().is_some());
            assert_eq!(state.is_authenticated(), state.user().is_some());
        }
    }
}
