use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::authenticate;
use crate::errors::AppError;
use crate::models::{AccountKind, IdentityAssertion, Profile, ProfileUpdate, PublicProfile};
use crate::services::{accounts, session};
use crate::state::AppState;

fn profile_body(profile: Profile) -> Json<Value> {
    match profile.account.kind {
        AccountKind::EndUser => Json(json!({ "success": true, "user": profile })),
        AccountKind::Partner => Json(json!({ "success": true, "partner": profile })),
    }
}

// POST /auth/signin-google, /auth/signin-google-partner
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInRequest {
    pub google_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

fn sign_in(
    state: &AppState,
    kind: AccountKind,
    body: GoogleSignInRequest,
) -> Result<Json<Value>, AppError> {
    let assertion = IdentityAssertion::new(
        body.google_id.unwrap_or_default(),
        body.email.unwrap_or_default(),
        body.name,
        body.image,
    );

    let profile = {
        let db = state.db()?;
        accounts::resolve(&db, kind, &assertion)?
    };
    Ok(profile_body(profile))
}

pub async fn signin_google(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Json<Value>, AppError> {
    sign_in(&state, AccountKind::EndUser, body)
}

pub async fn signin_google_partner(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Json<Value>, AppError> {
    sign_in(&state, AccountKind::Partner, body)
}

// POST /auth/register-partner
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPartnerRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub business_name: Option<String>,
    pub phone: Option<String>,
}

pub async fn register_partner(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterPartnerRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = {
        let db = state.db()?;
        accounts::register_partner(
            &db,
            body.email.as_deref().unwrap_or_default(),
            body.username.as_deref().unwrap_or_default(),
            body.business_name.as_deref().unwrap_or_default(),
            body.phone.as_deref(),
        )?
    };
    Ok(profile_body(profile))
}

// POST /auth/create-session
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(alias = "userId", alias = "partnerId")]
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub account_kind: Option<AccountKind>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let kind = body.account_kind.unwrap_or(AccountKind::EndUser);
    let session = {
        let db = state.db()?;
        session::create_session(
            &db,
            &state.jwt,
            kind,
            body.account_id.as_deref().unwrap_or_default(),
            body.email.as_deref().unwrap_or_default(),
        )?
    };

    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "user": session.user,
    })))
}

// POST /auth/verify-token
#[derive(Deserialize)]
pub struct VerifyTokenRequest {
    pub token: Option<String>,
}

pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = {
        let db = state.db()?;
        session::verify_token(&db, &state.jwt, body.token.as_deref().unwrap_or_default())?
    };

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "valid": true,
    })))
}

// GET /auth/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    let profile = {
        let db = state.db()?;
        accounts::profile(&db, claims.kind, &claims.sub)?
    };
    Ok(profile_body(profile))
}

// PUT /auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate(&headers, &state)?;
    let profile = {
        let db = state.db()?;
        accounts::update_profile(&db, claims.kind, &claims.sub, &body)?
    };
    Ok(profile_body(profile))
}

// GET /auth/profile/:account_id
pub async fn get_profile_by_id(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let profile: PublicProfile = {
        let db = state.db()?;
        accounts::profile(&db, AccountKind::EndUser, &account_id)?.into()
    };
    Ok(Json(json!({ "success": true, "user": profile })))
}

// GET /auth/google
pub async fn google_login(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
    let url = state.identity.authorize_url()?;
    Ok(Redirect::to(&url))
}

// GET /auth/google/callback
#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    let client_url = state.config.client_url.trim_end_matches('/');
    let failure = format!("{client_url}/login?error=auth_failed");

    let code = match (query.code, query.error) {
        (Some(code), None) if !code.is_empty() => code,
        (_, error) => {
            tracing::warn!(error = ?error, "OAuth callback without code");
            return Redirect::to(&failure);
        }
    };

    let assertion = match state.identity.exchange_code(&code).await {
        Ok(assertion) => assertion,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth code exchange failed");
            return Redirect::to(&failure);
        }
    };

    let issued = state.db().and_then(|db| {
        let profile = accounts::resolve(&db, AccountKind::EndUser, &assertion)?;
        state.jwt.issue(&profile.account)
    });

    let target = issued.and_then(|token| {
        reqwest::Url::parse_with_params(&state.config.client_url, &[("token", token.as_str())])
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid CLIENT_URL: {e}")))
    });

    match target {
        Ok(url) => Redirect::to(url.as_str()),
        Err(e) => {
            tracing::error!(error = %e, "OAuth sign-in failed");
            Redirect::to(&failure)
        }
    }
}
