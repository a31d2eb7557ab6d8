pub mod auth;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod rentals;

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use axum::routing::{delete, get, post};
use axum::Router;

use crate::errors::AppError;
use crate::models::AccountKind;
use crate::services::session::Claims;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/signin-google", post(auth::signin_google))
        .route(
            "/auth/signin-google-partner",
            post(auth::signin_google_partner),
        )
        .route("/auth/register-partner", post(auth::register_partner))
        .route("/auth/create-session", post(auth::create_session))
        .route("/auth/verify-token", post(auth::verify_token))
        .route("/auth/google", get(auth::google_login))
        .route("/auth/google/callback", get(auth::google_callback))
        .route(
            "/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/auth/profile/:account_id", get(auth::get_profile_by_id))
        .route("/rentals", get(rentals::list_rentals))
        .route("/rentals/create", post(rentals::create_rental))
        .route("/rentals/:rental_id", get(rentals::get_rental))
        .route(
            "/rentals/:rental_id/reviews",
            get(rentals::rental_reviews),
        )
        .route(
            "/rentals/partner/:partner_id",
            get(rentals::rentals_by_partner),
        )
        .route(
            "/rentals/:rental_id/partner/:partner_id",
            delete(rentals::delete_rental),
        )
        .route("/bookings", post(bookings::create_booking))
        .route(
            "/bookings/:booking_id/cancel",
            post(bookings::cancel_booking),
        )
        .route("/reviews", post(bookings::create_review))
        .route("/payments/create", post(payments::create_payment))
        .route("/payments/process", post(payments::process_payment))
        .route(
            "/payments/history/:partner_id",
            get(payments::payment_history),
        )
        .route("/payments/:payment_id", get(payments::get_payment))
        .with_state(state)
}

/// Verifies the `Authorization: Bearer <jwt>` header.
pub(crate) fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Claims, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    state.jwt.verify(token)
}

/// Like [`authenticate`], but only accepts sessions of `kind`.
pub(crate) fn authenticate_as(
    headers: &HeaderMap,
    state: &AppState,
    kind: AccountKind,
) -> Result<Claims, AppError> {
    let claims = authenticate(headers, state)?;
    if claims.kind != kind {
        return Err(AppError::Forbidden(format!("{kind} session required")));
    }
    Ok(claims)
}

/// Partners may only act on their own resources.
pub(crate) fn ensure_same_partner(claims: &Claims, partner_id: &str) -> Result<(), AppError> {
    if claims.sub != partner_id {
        return Err(AppError::Forbidden(
            "cannot act on another partner's resources".to_string(),
        ));
    }
    Ok(())
}
