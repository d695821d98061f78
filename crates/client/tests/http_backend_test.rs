use garden_auth::wire::VerifyRequest;
use garden_auth::{Challenge, KeyEncoding};
use garden_auth_client::{AuthBackend, AuthClient, ClientError, HttpAuthBackend, LocalWallet};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_json(wallet: &str) -> serde_json::Value {
    json!({
        "id": "6f1c1a52-4c1e-4a55-9a4b-4b8d3e1f2a10",
        "wallet_address": wallet,
        "public_key": wallet,
        "display_name": "User 0x5f1c...9e2a"
    })
}

fn session_json(token: &str) -> serde_json::Value {
    json!({ "access_token": token, "expires_at": "2030-01-01T00:00:00Z" })
}

#[tokio::test]
async fn test_challenge_is_parsed() {
    let server = MockServer::start().await;
    let challenge = Challenge::new("2b9f5c1e-0d2f-4a8e-9c3b-7f4e1a6d8b20", 1_700_000_000_000);
    Mock::given(method("GET"))
        .and(path("/api/auth/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&challenge))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpAuthBackend::new(server.uri()).unwrap();
    assert_eq!(backend.challenge().await.unwrap(), challenge);
}

#[tokio::test]
async fn test_verify_posts_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .and(body_json(json!({
            "publicKey": "0x01",
            "signature": "0x02",
            "message": "m",
            "walletAddress": "0xabc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": user_json("0xabc"),
            "session": session_json("tok")
        })))
        .mount(&server)
        .await;

    let backend = HttpAuthBackend::new(server.uri()).unwrap();
    let response = backend
        .verify(&VerifyRequest::new("0x01", "0x02", "m", "0xabc"))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.user.wallet_address, "0xabc");
    assert_eq!(response.session.access_token, "tok");
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Unauthorized",
            "details": "challenge_expired"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/challenge"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "Internal server error" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/session"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let backend = HttpAuthBackend::new(server.uri()).unwrap();

    let err = backend
        .verify(&VerifyRequest::new("0x01", "0x02", "m", "0xabc"))
        .await
        .unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(err.rejection_kind(), Some("challenge_expired"));

    let err = backend.challenge().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ClientError::Server { status: 500, .. }));

    let err = backend.session("tok").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ClientError::Rejected { status: 429, .. }));
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let backend = HttpAuthBackend::new(server.uri()).unwrap();
    assert!(matches!(
        backend.challenge().await.unwrap_err(),
        ClientError::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_retryable() {
    let backend = HttpAuthBackend::new("http://127.0.0.1:9").unwrap();
    let err = backend.challenge().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_wallet_login_against_http_service() {
    let server = MockServer::start().await;
    let wallet = LocalWallet::from_bytes(&[4u8; 32], KeyEncoding::Hex);
    let challenge = Challenge::new("0c7d3a8e-55a1-4f0b-b7d2-1e9c6a4f3b58", 1_700_000_000_000);
    let signed = wallet.sign(&challenge.message);

    Mock::given(method("GET"))
        .and(path("/api/auth/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&challenge))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .and(body_json(json!({
            "publicKey": signed.public_key,
            "signature": signed.signature,
            "message": challenge.message,
            "walletAddress": signed.wallet_address
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": user_json(&wallet.address()),
            "session": session_json("live-token")
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::new(HttpAuthBackend::new(server.uri()).unwrap());
    let wallet_ref = &wallet;
    let user = client
        .login_with_wallet(|message| async move { Ok(wallet_ref.sign(&message)) })
        .await
        .unwrap();

    assert_eq!(user.wallet_address, wallet.address());
    assert_eq!(client.access_token().as_deref(), Some("live-token"));

    client.logout().await;
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_restore_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/session"))
        .and(header("authorization", "Bearer saved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json("0xabc"),
            "session": session_json("saved")
        })))
        .mount(&server)
        .await;

    let client = AuthClient::new(HttpAuthBackend::new(server.uri()).unwrap());
    let user = client.restore("saved").await.unwrap();

    assert_eq!(user.wallet_address, "0xabc");
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_state_when_revocation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": user_json("0xabc"),
            "session": session_json("saved")
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthClient::new(HttpAuthBackend::new(server.uri()).unwrap());
    client.restore("saved").await.unwrap();
    client.logout().await;

    assert!(!client.is_authenticated());
    assert!(client.access_token().is_none());
}
