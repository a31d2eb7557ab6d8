use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AccountKind, Rental};

/// Upper bound on the public browse listing.
pub const BROWSE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRental {
    pub partner_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub room_count: Option<i64>,
    pub facilities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub main_image: Option<String>,
}

fn required_text(value: &Option<String>, field: &'static str) -> Result<String, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingField(field))
}

pub fn create_rental(conn: &Connection, new: NewRental) -> Result<Rental, AppError> {
    let partner_id = required_text(&new.partner_id, "partnerId")?;
    let name = required_text(&new.name, "name")?;
    let address = required_text(&new.address, "address")?;
    let lat = new.lat.ok_or(AppError::MissingField("lat"))?;
    let lng = new.lng.ok_or(AppError::MissingField("lng"))?;
    let price = new.price.ok_or(AppError::MissingField("price"))?;
    let room_count = new.room_count.ok_or(AppError::MissingField("roomCount"))?;

    if price <= 0.0 {
        return Err(AppError::Validation("price must be positive".to_string()));
    }
    if room_count <= 0 {
        return Err(AppError::Validation("roomCount must be positive".to_string()));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::Validation("coordinates out of range".to_string()));
    }

    if queries::find_account_by_id(conn, AccountKind::Partner, &partner_id)?.is_none() {
        return Err(AppError::AccountNotFound);
    }

    let now = Utc::now().naive_utc();
    let rental = Rental {
        rental_id: uuid::Uuid::new_v4().to_string(),
        partner_id,
        name,
        description: new.description.filter(|d| !d.trim().is_empty()),
        address,
        lat,
        lng,
        price,
        original_price: new.original_price,
        room_count,
        facilities: new.facilities.unwrap_or_default(),
        images: new.images.unwrap_or_default(),
        main_image: new.main_image.filter(|m| !m.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    queries::insert_rental(conn, &rental)?;
    tracing::info!(rental_id = %rental.rental_id, partner_id = %rental.partner_id, "rental created");

    queries::get_rental(conn, &rental.rental_id)?
        .ok_or_else(|| AppError::NotFound("rental".to_string()))
}

pub fn get_rental(conn: &Connection, rental_id: &str) -> Result<Rental, AppError> {
    queries::get_rental(conn, rental_id)?.ok_or_else(|| AppError::NotFound("rental".to_string()))
}

pub fn list_rentals(conn: &Connection) -> Result<Vec<Rental>, AppError> {
    Ok(queries::list_rentals(conn, BROWSE_LIMIT)?)
}

pub fn rentals_by_partner(conn: &Connection, partner_id: &str) -> Result<Vec<Rental>, AppError> {
    if partner_id.trim().is_empty() {
        return Err(AppError::MissingField("partnerId"));
    }
    Ok(queries::rentals_by_partner(conn, partner_id)?)
}

/// Deletes a rental only when `partner_id` owns it.
pub fn delete_rental(conn: &Connection, rental_id: &str, partner_id: &str) -> Result<(), AppError> {
    let owned = queries::get_rental(conn, rental_id)?
        .filter(|rental| rental.partner_id == partner_id)
        .is_some();
    if !owned {
        return Err(AppError::NotFound(
            "rental not found or not owned by this partner".to_string(),
        ));
    }

    queries::delete_rental(conn, rental_id)?;
    tracing::info!(%rental_id, %partner_id, "rental deleted");
    Ok(())
}
