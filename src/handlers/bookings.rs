use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::authenticate_as;
use crate::errors::AppError;
use crate::models::AccountKind;
use crate::services::bookings::{self, NewBooking, NewReview};
use crate::state::AppState;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::EndUser)?;
    let booking = {
        let db = state.db()?;
        bookings::create_booking(&db, &claims.sub, &body)?
    };
    Ok(Json(json!({ "success": true, "booking": booking })))
}

// POST /bookings/:booking_id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::EndUser)?;
    let booking = {
        let db = state.db()?;
        bookings::cancel_booking(&db, &claims.sub, &booking_id)?
    };
    Ok(Json(json!({ "success": true, "booking": booking })))
}

// POST /reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewReview>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::EndUser)?;
    let review = {
        let db = state.db()?;
        bookings::create_review(&db, &claims.sub, &body)?
    };
    Ok(Json(json!({ "success": true, "review": review })))
}
