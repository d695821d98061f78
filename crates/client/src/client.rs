use garden_auth::wire::{AuthenticatedUser, SessionResponse, VerifyRequest, VerifyResponse};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::backend::AuthBackend;
use crate::error::{ClientError, SignerError};
use crate::signer::WalletSignature;
use crate::state::{AuthEvent, AuthState};

/// Session-aware client for the wallet sign-in flow.
///
/// State is published on a watch channel; at most one wallet login runs at
/// a time. A logout issued while a login is in flight wins: the login's
/// session is discarded and revoked.
pub struct AuthClient {
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<AuthState>,
    login_in_flight: AtomicBool,
    /// Bumped by every logout
    epoch: AtomicU64,
    approval_timeout: Option<Duration>,
}

impl AuthClient {
    pub fn new(backend: impl AuthBackend + 'static) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            backend: Arc::new(backend),
            state,
            login_in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            approval_timeout: None,
        }
    }

    /// Give up on the wallet if it has not signed within `timeout`
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = Some(timeout);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.access_token.clone())
    }

    fn dispatch(&self, event: AuthEvent) {
        self.state.send_modify(|state| *state = state.apply(event));
    }

    /// Fetch a challenge, have the wallet sign it and exchange the signature
    /// for a session.
    ///
    /// `sign` receives the exact challenge message. Dropping the returned
    /// future cancels the login and puts back the state held before it.
    pub async fn login_with_wallet<F, Fut>(&self, sign: F) -> Result<AuthenticatedUser, ClientError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<WalletSignature, SignerError>>,
    {
        if self.login_in_flight.swap(true, Ordering::AcqRel) {
            return Err(ClientError::LoginInProgress);
        }
        let mut guard = LoginGuard {
            client: self,
            settled: false,
        };
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.dispatch(AuthEvent::LoginStarted);

        let outcome = self.exchange(sign).await;
        guard.settled = true;

        let VerifyResponse { user, session, .. } = match outcome {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Wallet login failed");
                self.dispatch(AuthEvent::LoginFailed);
                return Err(err);
            }
        };

        let token = session.access_token.clone();
        let event = AuthEvent::LoginSucceeded {
            user: user.clone(),
            session,
        };
        match self.install(epoch, event, &token) {
            Ok(displaced) => {
                if let Some(old) = displaced {
                    self.revoke_quietly(&old).await;
                }
            }
            Err(err) => {
                tracing::info!("Login completed after logout, revoking its session");
                self.revoke_quietly(&token).await;
                return Err(err);
            }
        }

        tracing::info!(user_id = %user.id, "Signed in");
        Ok(user)
    }

    /// Publish a new session unless a logout happened since `epoch`.
    ///
    /// Returns the token of the session it replaced, if that was a different one.
    fn install(&self, epoch: u64, event: AuthEvent, token: &str) -> Result<Option<String>, ClientError> {
        let mut displaced = None;
        let applied = self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            displaced = state
                .held_session()
                .map(|s| s.access_token.clone())
                .filter(|held| held != token);
            *state = state.apply(event);
            true
        });
        if !applied {
            return Err(ClientError::Superseded);
        }
        Ok(displaced)
    }

    async fn revoke_quietly(&self, token: &str) {
        if let Err(e) = self.backend.logout(token).await {
            tracing::warn!(error = %e, "Failed to revoke replaced session");
        }
    }

    async fn exchange<F, Fut>(&self, sign: F) -> Result<VerifyResponse, ClientError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<WalletSignature, SignerError>>,
    {
        let challenge = self.backend.challenge().await?;
        let approval = sign(challenge.message.clone());
        let signed = match self.approval_timeout {
            Some(limit) => tokio::time::timeout(limit, approval)
                .await
                .map_err(|_| ClientError::ApprovalTimedOut)??,
            None => approval.await?,
        };

        let request = VerifyRequest::new(
            signed.public_key,
            signed.signature,
            challenge.message,
            signed.wallet_address,
        );
        self.backend.verify(&request).await
    }

    /// Resume a session from a stored access token
    pub async fn restore(&self, token: &str) -> Result<AuthenticatedUser, ClientError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let SessionResponse { user, session } = self.backend.session(token).await?;

        let event = AuthEvent::Restored {
            user: user.clone(),
            session,
        };
        if let Some(old) = self.install(epoch, event, token)? {
            self.revoke_quietly(&old).await;
        }
        Ok(user)
    }

    /// Clear the local session, then revoke it on the service.
    ///
    /// Local state is cleared first; a failed revocation is only logged.
    pub async fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut held = None;
        self.state.send_modify(|state| {
            held = state.held_session().map(|s| s.access_token.clone());
            *state = state.apply(AuthEvent::LoggedOut);
        });

        if let Some(token) = held {
            if let Err(e) = self.backend.logout(&token).await {
                tracing::warn!(error = %e, "Remote logout failed, local session cleared");
            }
        }
    }
}

struct LoginGuard<'a> {
    client: &'a AuthClient,
    settled: bool,
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.client.state.send_if_modified(|state| {
                if !state.is_authenticating() {
                    return false;
                }
                *state = state.apply(AuthEvent::LoginAborted);
                true
            });
        }
        self.client.login_in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::LocalWallet;
    use async_trait::async_trait;
    use chrono::Utc;
    use garden_auth::wire::SessionGrant;
    use garden_auth::{Challenge, KeyEncoding};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeBackend {
        issued: AtomicU64,
        revoked: Arc<Mutex<Vec<String>>>,
    }

    impl FakeBackend {
        fn grant(&self, wallet_address: &str, public_key: &str, n: u64) -> (AuthenticatedUser, SessionGrant) {
            (
                AuthenticatedUser {
                    id: Uuid::nil(),
                    wallet_address: wallet_address.to_string(),
                    public_key: public_key.to_string(),
                    display_name: "User".to_string(),
                    avatar_url: None,
                },
                SessionGrant {
                    access_token: format!("token-{n}"),
                    expires_at: Utc::now(),
                },
            )
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn challenge(&self) -> Result<Challenge, ClientError> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            Ok(Challenge::new(format!("nonce-{n}"), 1_700_000_000_000))
        }

        async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ClientError> {
            let public_key = request.public_key.clone().unwrap_or_default();
            let valid = garden_auth::is_valid(
                &public_key,
                request.message.as_deref().unwrap_or_default(),
                request.signature.as_deref().unwrap_or_default(),
                KeyEncoding::Hex,
            );
            if !valid {
                return Err(ClientError::Rejected {
                    status: 401,
                    error: "Unauthorized".to_string(),
                    details: Some("signature_mismatch".to_string()),
                });
            }
            let wallet = request.wallet_address.clone().unwrap_or_default();
            let (user, session) = self.grant(&wallet, &public_key, self.issued.load(Ordering::SeqCst));
            Ok(VerifyResponse {
                success: true,
                user,
                session,
            })
        }

        async fn session(&self, token: &str) -> Result<SessionResponse, ClientError> {
            if token != "stored" {
                return Err(ClientError::Rejected {
                    status: 401,
                    error: "Unauthorized".to_string(),
                    details: Some("session_invalid".to_string()),
                });
            }
            let (user, mut session) = self.grant("0xrestored", "0x01", 0);
            session.access_token = token.to_string();
            Ok(SessionResponse { user, session })
        }

        async fn logout(&self, token: &str) -> Result<(), ClientError> {
            self.revoked.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    fn client() -> (AuthClient, Arc<Mutex<Vec<String>>>) {
        let backend = FakeBackend::default();
        let revoked = backend.revoked.clone();
        (AuthClient::new(backend), revoked)
    }

    fn wallet() -> LocalWallet {
        LocalWallet::from_bytes(&[9u8; 32], KeyEncoding::Hex)
    }

    #[tokio::test]
    async fn test_login_publishes_authenticated_state() {
        let (client, _) = client();
        let wallet = wallet();
        let expected_address = wallet.address();
        let mut updates = client.subscribe();

        let user = client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();

        assert_eq!(user.wallet_address, expected_address);
        assert!(client.is_authenticated());
        assert_eq!(client.access_token().as_deref(), Some("token-1"));
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_signer_receives_exact_challenge() {
        let (client, _) = client();
        let wallet = wallet();
        let seen = Mutex::new(None);

        client
            .login_with_wallet(|message| {
                *seen.lock().unwrap() = Some(message.clone());
                async move { Ok(wallet.sign(&message)) }
            })
            .await
            .unwrap();

        let expected = Challenge::new("nonce-0", 1_700_000_000_000).message;
        assert_eq!(seen.into_inner().unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_declined_signature_leaves_unauthenticated() {
        let (client, _) = client();

        let err = client
            .login_with_wallet(|_| async { Err(SignerError::Declined("user closed the prompt".to_string())) })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Signer(SignerError::Declined(_))));
        assert_eq!(client.state(), AuthState::Unauthenticated);

        let wallet = wallet();
        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejection() {
        let (client, _) = client();
        let wallet = wallet();
        let other = LocalWallet::from_bytes(&[1u8; 32], KeyEncoding::Hex);

        let err = client
            .login_with_wallet(|message| async move {
                let mut signed = wallet.sign(&message);
                signed.public_key = other.public_key();
                Ok(signed)
            })
            .await
            .unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(err.rejection_kind(), Some("signature_mismatch"));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_login_fails_fast() {
        let (client, _) = client();
        let wallet = wallet();
        let wallet = &wallet;
        let (approve, approved) = oneshot::channel::<()>();

        let first = client.login_with_wallet(|message| async move {
            approved
                .await
                .map_err(|_| SignerError::Unavailable("approval channel closed".to_string()))?;
            Ok::<_, SignerError>(wallet.sign(&message))
        });
        let second = async {
            tokio::task::yield_now().await;
            let result = client
                .login_with_wallet(|_| async { Err::<WalletSignature, _>(SignerError::Declined("unused".to_string())) })
                .await;
            approve.send(()).unwrap();
            result
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ClientError::LoginInProgress);
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_approval_timeout() {
        let (client, _) = client();
        let client = client.with_approval_timeout(Duration::from_millis(20));

        let err = client
            .login_with_wallet(|_| std::future::pending::<Result<WalletSignature, SignerError>>())
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::ApprovalTimedOut);
        assert!(err.is_retryable());
        assert_eq!(client.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_dropped_login_restores_state() {
        let (client, _) = client();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            client.login_with_wallet(|_| std::future::pending::<Result<WalletSignature, SignerError>>()),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(client.state(), AuthState::Unauthenticated);

        let wallet = wallet();
        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_during_login_wins() {
        let (client, revoked) = client();
        let wallet = wallet();
        let client_ref = &client;

        let err = client
            .login_with_wallet(|message| async move {
                client_ref.logout().await;
                Ok(wallet.sign(&message))
            })
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::Superseded);
        assert_eq!(client.state(), AuthState::Unauthenticated);
        assert_eq!(*revoked.lock().unwrap(), vec!["token-1".to_string()]);
    }

    #[tokio::test]
    async fn test_logout_revokes_remote_session() {
        let (client, revoked) = client();
        let wallet = wallet();
        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();

        client.logout().await;

        assert_eq!(client.state(), AuthState::Unauthenticated);
        assert_eq!(*revoked.lock().unwrap(), vec!["token-1".to_string()]);

        client.logout().await;
        assert_eq!(revoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_relogin_keeps_session() {
        let (client, _) = client();
        let wallet = wallet();
        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();

        client
            .login_with_wallet(|_| async { Err(SignerError::Declined("no".to_string())) })
            .await
            .unwrap_err();

        assert!(client.is_authenticated());
        assert_eq!(client.access_token().as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn test_relogin_revokes_replaced_session() {
        let (client, revoked) = client();
        let wallet = wallet();
        let wallet = &wallet;

        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();
        assert_eq!(client.access_token().as_deref(), Some("token-1"));

        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();

        assert_eq!(client.access_token().as_deref(), Some("token-2"));
        assert_eq!(*revoked.lock().unwrap(), vec!["token-1".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_revokes_replaced_session() {
        let (client, revoked) = client();
        let wallet = wallet();
        client
            .login_with_wallet(|message| async move { Ok(wallet.sign(&message)) })
            .await
            .unwrap();

        client.restore("stored").await.unwrap();
        assert_eq!(client.access_token().as_deref(), Some("stored"));
        assert_eq!(*revoked.lock().unwrap(), vec!["token-1".to_string()]);

        client.restore("stored").await.unwrap();
        assert_eq!(revoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore() {
        let (client, _) = client();

        let user = client.restore("stored").await.unwrap();
        assert_eq!(user.wallet_address, "0xrestored");
        assert_eq!(client.access_token().as_deref(), Some("stored"));

        client.logout().await;
        let err = client.restore("expired").await.unwrap_err();
        assert_eq!(err.rejection_kind(), Some("session_invalid"));
        assert!(!client.is_authenticated());
    }
}
