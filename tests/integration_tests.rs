use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use rental_hub::config::{AppConfig, GoogleOAuthConfig};
use rental_hub::db;
use rental_hub::handlers;
use rental_hub::models::IdentityAssertion;
use rental_hub::services::oauth::IdentityProvider;
use rental_hub::services::session::JwtService;
use rental_hub::state::AppState;

// ── Mock Provider ──

struct MockIdentity;

#[async_trait]
impl IdentityProvider for MockIdentity {
    fn authorize_url(&self) -> anyhow::Result<String> {
        Ok("https://accounts.example.test/consent?client_id=test".to_string())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<IdentityAssertion> {
        match code {
            "good-code" => Ok(IdentityAssertion::new(
                "g-oauth",
                "oauth@x.com",
                Some("OAuth User".to_string()),
                Some("http://pic/oauth".to_string()),
            )),
            _ => anyhow::bail!("invalid grant"),
        }
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_ttl_secs: 3600,
        client_url: "http://client.test".to_string(),
        google: GoogleOAuthConfig {
            client_id: "test".to_string(),
            client_secret: "test".to_string(),
            callback_url: "http://localhost:3000/auth/google/callback".to_string(),
        },
        payment_processing_delay_ms: 0,
    }
}

fn test_state() -> Arc<AppState> {
    test_state_with(test_config())
}

fn test_state_with(config: AppConfig) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        jwt: JwtService::new(&config.jwt_secret, config.jwt_ttl_secs),
        identity: Box::new(MockIdentity),
        config,
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn redirect_token(res: &axum::response::Response) -> String {
    assert!(res.status().is_redirection());
    let location = reqwest::Url::parse(res.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    assert_eq!(location.host_str(), Some("client.test"));
    location
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .expect("redirect should carry a token")
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn sign_in_user(state: &Arc<AppState>, google_id: &str, email: &str, name: &str) -> Value {
    let (status, json) = send(
        state,
        json_request(
            "POST",
            "/auth/signin-google",
            None,
            json!({ "googleId": google_id, "email": email, "name": name }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["user"].clone()
}

async fn session_token(state: &Arc<AppState>, kind: &str, account: &Value) -> String {
    let (status, json) = send(
        state,
        json_request(
            "POST",
            "/auth/create-session",
            None,
            json!({
                "accountId": account["accountId"],
                "email": account["email"],
                "accountKind": kind,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

async fn registered_partner(state: &Arc<AppState>, email: &str, username: &str) -> (Value, String) {
    let (status, json) = send(
        state,
        json_request(
            "POST",
            "/auth/register-partner",
            None,
            json!({ "email": email, "username": username, "businessName": "Kos Sejahtera" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let partner = json["partner"].clone();
    let token = session_token(state, "partner", &partner).await;
    (partner, token)
}

async fn created_rental(state: &Arc<AppState>, token: &str) -> Value {
    let (status, json) = send(
        state,
        json_request(
            "POST",
            "/rentals/create",
            Some(token),
            json!({
                "name": "Kos Melati",
                "address": "Jl. Melati 1",
                "lat": -6.2,
                "lng": 106.8,
                "price": 200.0,
                "roomCount": 3,
                "facilities": ["wifi"],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["rental"].clone()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Account Resolution ──

#[tokio::test]
async fn test_signin_creates_then_returns_same_account() {
    let state = test_state();
    let body = json!({
        "googleId": "g-1",
        "email": "a@x.com",
        "name": "Jane Doe!!",
        "image": "http://pic",
    });

    let (status, first) = send(&state, json_request("POST", "/auth/signin-google", None, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["user"]["username"], "JaneDoe");
    assert_eq!(first["user"]["email"], "a@x.com");
    assert_eq!(first["user"]["avatarUrl"], "http://pic");
    assert_eq!(first["user"]["bookings"], json!([]));
    assert_eq!(first["user"]["reviews"], json!([]));

    let (_, second) = send(&state, json_request("POST", "/auth/signin-google", None, body)).await;
    assert_eq!(second["user"]["accountId"], first["user"]["accountId"]);
    assert_eq!(second["user"], first["user"]);
}

#[tokio::test]
async fn test_signin_missing_field() {
    let state = test_state();
    let (status, json) = send(
        &state,
        json_request("POST", "/auth/signin-google", None, json!({ "email": "a@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "missing_required_field");
}

#[tokio::test]
async fn test_store_failure_is_opaque() {
    let state = test_state();
    state
        .db
        .lock()
        .unwrap()
        .execute_batch("DROP TABLE accounts;")
        .unwrap();

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/auth/signin-google",
            None,
            json!({ "googleId": "g-1", "email": "a@x.com", "name": "Jane" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "store_unavailable");
    let message = json["error"].as_str().unwrap();
    assert!(!message.contains("accounts"));
    assert!(!message.contains("no such table"));
}

#[tokio::test]
async fn test_partner_signin_links_registered_email() {
    let state = test_state();
    let (partner, _) = registered_partner(&state, "biz@x.com", "kosbiz").await;
    assert!(partner["externalId"].is_null());

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/auth/signin-google-partner",
            None,
            json!({ "googleId": "g-2", "email": "biz@x.com", "image": "http://logo" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["partner"]["accountId"], partner["accountId"]);
    assert_eq!(json["partner"]["externalId"], "g-2");
    assert_eq!(json["partner"]["avatarUrl"], "http://logo");
    assert_eq!(json["partner"]["businessName"], "Kos Sejahtera");
    assert_eq!(json["partner"]["subscriptionStatus"], "active");
}

#[tokio::test]
async fn test_register_partner_conflict() {
    let state = test_state();
    registered_partner(&state, "biz@x.com", "kosbiz").await;

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/auth/register-partner",
            None,
            json!({ "email": "biz@x.com", "username": "fresh", "businessName": "Other" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "email_conflict");
}

// ── Sessions & Profile ──

#[tokio::test]
async fn test_session_and_profile() {
    let state = test_state();
    let user = sign_in_user(&state, "g-1", "a@x.com", "Jane").await;
    let token = session_token(&state, "end_user", &user).await;

    let (status, json) = send(&state, get_request("/auth/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["accountId"], user["accountId"]);

    let (status, json) = send(
        &state,
        json_request("POST", "/auth/verify-token", None, json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], true);
    assert_eq!(json["user"]["username"], "Jane");
}

#[tokio::test]
async fn test_create_session_wrong_email() {
    let state = test_state();
    let user = sign_in_user(&state, "g-1", "a@x.com", "Jane").await;

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/auth/create-session",
            None,
            json!({ "userId": user["accountId"], "email": "someone@x.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "account_not_found");
}

#[tokio::test]
async fn test_profile_requires_auth() {
    let state = test_state();
    let (status, _) = send(&state, get_request("/auth/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, get_request("/auth/profile", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &state,
        json_request("POST", "/auth/verify-token", None, json!({ "token": "garbage" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_update_profile_username_conflict() {
    let state = test_state();
    sign_in_user(&state, "g-1", "a@x.com", "Taken").await;
    let me = sign_in_user(&state, "g-2", "b@x.com", "Me").await;
    let token = session_token(&state, "end_user", &me).await;

    let (status, json) = send(
        &state,
        json_request(
            "PUT",
            "/auth/profile",
            Some(&token),
            json!({ "username": "Taken", "phone": "+62811" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "username_conflict");

    let (_, json) = send(&state, get_request("/auth/profile", Some(&token))).await;
    assert_eq!(json["user"]["username"], "Me");
    assert!(json["user"]["phone"].is_null());

    let (status, json) = send(
        &state,
        json_request("PUT", "/auth/profile", Some(&token), json!({ "phone": "+62811" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["phone"], "+62811");
    assert_eq!(json["user"]["username"], "Me");
}

#[tokio::test]
async fn test_public_profile_hides_contact_details() {
    let state = test_state();
    let user = sign_in_user(&state, "g-1", "a@x.com", "Jane").await;
    let uri = format!("/auth/profile/{}", user["accountId"].as_str().unwrap());

    let (status, json) = send(&state, get_request(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "Jane");
    assert!(json["user"].get("email").is_none());
    assert!(json["user"].get("externalId").is_none());

    let (status, _) = send(&state, get_request("/auth/profile/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── OAuth Redirect Flow ──

#[tokio::test]
async fn test_google_login_redirects_to_consent() {
    let state = test_state();
    let res = test_app(state)
        .oneshot(get_request("/auth/google", None))
        .await
        .unwrap();
    assert!(res.status().is_redirection());
    let location = res.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.example.test/consent"));
}

#[tokio::test]
async fn test_google_callback_issues_token() {
    let state = test_state();
    let res = test_app(state.clone())
        .oneshot(get_request("/auth/google/callback?code=good-code", None))
        .await
        .unwrap();
    assert!(res.status().is_redirection());
    let token = redirect_token(&res);
    let claims = state.jwt.verify(&token).unwrap();
    assert_eq!(claims.email, "oauth@x.com");
    assert_eq!(claims.username, "OAuthUser");
}

#[tokio::test]
async fn test_google_callback_keeps_client_query_string() {
    let mut config = test_config();
    config.client_url = "http://client.test/app?lang=id".to_string();
    let state = test_state_with(config);

    let res = test_app(state.clone())
        .oneshot(get_request("/auth/google/callback?code=good-code", None))
        .await
        .unwrap();
    let location = reqwest::Url::parse(res.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    assert_eq!(location.path(), "/app");
    let lang = location.query_pairs().find(|(k, _)| k == "lang").map(|(_, v)| v.into_owned());
    assert_eq!(lang.as_deref(), Some("id"));

    let token = redirect_token(&res);
    assert!(state.jwt.verify(&token).is_ok());
}

#[tokio::test]
async fn test_google_callback_failure_redirects_to_login() {
    let state = test_state();
    for uri in [
        "/auth/google/callback?code=bad-code",
        "/auth/google/callback?error=access_denied",
    ] {
        let res = test_app(state.clone())
            .oneshot(get_request(uri, None))
            .await
            .unwrap();
        assert!(res.status().is_redirection());
        assert_eq!(
            res.headers()[header::LOCATION],
            "http://client.test/login?error=auth_failed"
        );
    }
}

// ── Rentals ──

#[tokio::test]
async fn test_partner_rental_lifecycle() {
    let state = test_state();
    let (partner, token) = registered_partner(&state, "biz@x.com", "kosbiz").await;
    let rental = created_rental(&state, &token).await;
    assert_eq!(rental["partnerId"], partner["accountId"]);
    assert_eq!(rental["facilities"], json!(["wifi"]));

    let partner_id = partner["accountId"].as_str().unwrap();
    let (status, json) = send(
        &state,
        get_request(&format!("/rentals/partner/{partner_id}"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rentals"].as_array().unwrap().len(), 1);

    let (_, json) = send(&state, get_request("/rentals", None)).await;
    assert_eq!(json["rentals"].as_array().unwrap().len(), 1);

    let rental_id = rental["rentalId"].as_str().unwrap();
    let (status, _) = send(
        &state,
        json_request(
            "DELETE",
            &format!("/rentals/{rental_id}/partner/{partner_id}"),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&state, get_request(&format!("/rentals/{rental_id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_other_partners_rental_is_not_found() {
    let state = test_state();
    let (_, owner_token) = registered_partner(&state, "owner@x.com", "owner").await;
    let (intruder, intruder_token) = registered_partner(&state, "intruder@x.com", "intruder").await;
    let rental = created_rental(&state, &owner_token).await;

    let uri = format!(
        "/rentals/{}/partner/{}",
        rental["rentalId"].as_str().unwrap(),
        intruder["accountId"].as_str().unwrap()
    );
    let (status, _) = send(&state, json_request("DELETE", &uri, Some(&intruder_token), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &state,
        get_request(&format!("/rentals/{}", rental["rentalId"].as_str().unwrap()), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_end_user_cannot_create_rental() {
    let state = test_state();
    let user = sign_in_user(&state, "g-1", "a@x.com", "Jane").await;
    let token = session_token(&state, "end_user", &user).await;

    let (status, json) = send(
        &state,
        json_request("POST", "/rentals/create", Some(&token), json!({ "name": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "forbidden");
}

// ── Bookings & Reviews ──

#[tokio::test]
async fn test_booking_and_review_show_on_profile() {
    let state = test_state();
    let (_, partner_token) = registered_partner(&state, "biz@x.com", "kosbiz").await;
    let rental = created_rental(&state, &partner_token).await;
    let user = sign_in_user(&state, "g-1", "a@x.com", "Jane").await;
    let token = session_token(&state, "end_user", &user).await;

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/bookings",
            Some(&token),
            json!({
                "rentalId": rental["rentalId"],
                "checkIn": "2025-08-01",
                "checkOut": "2025-08-03",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["totalAmount"], 400.0);
    assert_eq!(json["booking"]["status"], "pending");

    let (status, _) = send(
        &state,
        json_request(
            "POST",
            "/reviews",
            Some(&token),
            json!({ "rentalId": rental["rentalId"], "rating": 5, "comment": "Nyaman" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&state, get_request("/auth/profile", Some(&token))).await;
    assert_eq!(json["user"]["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(json["user"]["reviews"][0]["comment"], "Nyaman");

    let reviews_uri = format!("/rentals/{}/reviews", rental["rentalId"].as_str().unwrap());
    let (_, json) = send(&state, get_request(&reviews_uri, None)).await;
    assert_eq!(json["reviews"][0]["rating"], 5);
}

// ── Payments ──

#[tokio::test]
async fn test_payment_processing_credits_partner_once() {
    let state = test_state();
    let (partner, token) = registered_partner(&state, "biz@x.com", "kosbiz").await;

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/payments/create",
            Some(&token),
            json!({ "amount": 300000, "roomsAllowed": 3, "method": "bank_transfer" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment"]["status"], "pending");
    let payment_id = json["payment"]["paymentId"].as_str().unwrap().to_string();

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/payments/process",
            Some(&token),
            json!({ "paymentId": payment_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment"]["status"], "success");
    assert_eq!(json["partner"]["paidAmount"], 300000);
    assert_eq!(json["partner"]["maxRooms"], 3);

    let (status, json) = send(
        &state,
        json_request(
            "POST",
            "/payments/process",
            Some(&token),
            json!({ "paymentId": payment_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "payment already processed");

    let history_uri = format!("/payments/history/{}", partner["accountId"].as_str().unwrap());
    let (status, json) = send(&state, get_request(&history_uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payments"].as_array().unwrap().len(), 1);

    let (status, json) = send(
        &state,
        get_request(&format!("/payments/{payment_id}"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment"]["status"], "success");
}

#[tokio::test]
async fn test_payment_history_of_another_partner_is_forbidden() {
    let state = test_state();
    let (owner, _) = registered_partner(&state, "owner@x.com", "owner").await;
    let (_, other_token) = registered_partner(&state, "other@x.com", "other").await;

    let uri = format!("/payments/history/{}", owner["accountId"].as_str().unwrap());
    let (status, _) = send(&state, get_request(&uri, Some(&other_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
