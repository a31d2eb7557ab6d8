use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::{authenticate, authenticate_as, ensure_same_partner};
use crate::errors::AppError;
use crate::models::AccountKind;
use crate::services::rentals::{self, NewRental};
use crate::services::bookings;
use crate::state::AppState;

// GET /rentals
pub async fn list_rentals(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let rentals = {
        let db = state.db()?;
        rentals::list_rentals(&db)?
    };
    Ok(Json(json!({ "success": true, "rentals": rentals })))
}

// GET /rentals/:rental_id
pub async fn get_rental(
    State(state): State<Arc<AppState>>,
    Path(rental_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let rental = {
        let db = state.db()?;
        rentals::get_rental(&db, &rental_id)?
    };
    Ok(Json(json!({ "success": true, "rental": rental })))
}

// GET /rentals/:rental_id/reviews
pub async fn rental_reviews(
    State(state): State<Arc<AppState>>,
    Path(rental_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let reviews = {
        let db = state.db()?;
        bookings::reviews_for_rental(&db, &rental_id)?
    };
    Ok(Json(json!({ "success": true, "reviews": reviews })))
}

// POST /rentals/create
pub async fn create_rental(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut body): Json<NewRental>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    let partner_id = body.partner_id.get_or_insert_with(|| claims.sub.clone());
    ensure_same_partner(&claims, partner_id)?;

    let rental = {
        let db = state.db()?;
        rentals::create_rental(&db, body)?
    };
    Ok(Json(json!({ "success": true, "rental": rental })))
}

// GET /rentals/partner/:partner_id
pub async fn rentals_by_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(partner_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    authenticate(&headers, &state)?;
    let rentals = {
        let db = state.db()?;
        rentals::rentals_by_partner(&db, &partner_id)?
    };
    Ok(Json(json!({ "success": true, "rentals": rentals })))
}

// DELETE /rentals/:rental_id/partner/:partner_id
pub async fn delete_rental(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((rental_id, partner_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let claims = authenticate_as(&headers, &state, AccountKind::Partner)?;
    ensure_same_partner(&claims, &partner_id)?;

    {
        let db = state.db()?;
        rentals::delete_rental(&db, &rental_id, &partner_id)?;
    }
    Ok(Json(json!({ "success": true, "message": "Rental deleted" })))
}
