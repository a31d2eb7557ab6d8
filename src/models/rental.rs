use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub rental_id: String,
    pub partner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub price: f64,
    pub original_price: Option<f64>,
    pub room_count: i64,
    pub facilities: Vec<String>,
    pub images: Vec<String>,
    pub main_image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
