//! REST API helpers for rooms and bookings.
//!
//! Thin wrappers: build a `PendingRequest`, run it through the interceptor
//! pipeline, decode the body. Errors pass through unchanged; presenting them
//! is the caller's job.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::interceptor::ApiClient;
use crate::transport::PendingRequest;

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub room_number: String,
    pub room_type: String,
    /// Decimal price as the backend formats it, e.g. `"120.00"`.
    pub price_per_night: String,
    pub max_occupancy: u32,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub photo: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    /// Owning user id.
    pub guest: i64,
    /// Booked room id.
    pub room: i64,
    pub check_in: String,
    pub check_out: String,
    pub status: BookingStatus,
    pub guests_count: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Booking creation payload. Dates are ISO `YYYY-MM-DD`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub room: i64,
    pub check_in: String,
    pub check_out: String,
    pub guests_count: u32,
}

impl NewBooking {
    /// Reject payloads the backend would refuse anyway.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for malformed dates, a stay that does
    /// not end after it starts, or zero guests.
    pub fn validate(&self) -> Result<(), ApiError> {
        for (field, value) in [("check_in", &self.check_in), ("check_out", &self.check_out)] {
            if !is_iso_date(value) {
                return Err(ApiError::Validation(format!("{field} must be YYYY-MM-DD, got {value:?}")));
            }
        }
        // Fixed-width ISO dates order lexicographically.
        if self.check_out <= self.check_in {
            return Err(ApiError::Validation("check_out must be after check_in".to_owned()));
        }
        if self.guests_count == 0 {
            return Err(ApiError::Validation("guests_count must be at least 1".to_owned()));
        }
        Ok(())
    }
}

fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return false;
    }
    let month: u32 = value[5..7].parse().unwrap_or(0);
    let day: u32 = value[8..10].parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Room listing filters. Unset fields are omitted from the query string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub room_type: Option<String>,
    pub min_occupancy: Option<u32>,
    pub amenities: Option<String>,
    pub is_available: Option<bool>,
}

impl RoomFilter {
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                query.push((key.to_owned(), value));
            }
        };
        push("min_price", self.min_price.map(|v| v.to_string()));
        push("max_price", self.max_price.map(|v| v.to_string()));
        push("room_type", self.room_type.clone());
        push("min_occupancy", self.min_occupancy.map(|v| v.to_string()));
        push("amenities", self.amenities.clone());
        push("is_available", self.is_available.map(|v| v.to_string()));
        query
    }
}

// =============================================================================
// CALLS
// =============================================================================

/// `GET /api/rooms/` with optional filters.
///
/// # Errors
///
/// Returns the pipeline failure or `Decode` for an unexpected body.
pub async fn list_rooms(client: &ApiClient, filter: &RoomFilter) -> Result<Vec<Room>, ApiError> {
    let path = client.session().endpoints().rooms.clone();
    let request = PendingRequest::get(path).with_query(filter.to_query());
    let rooms: Vec<Room> = client.execute(request).await?.json()?;
    tracing::debug!(count = rooms.len(), "rooms listed");
    Ok(rooms)
}

/// `GET /api/rooms/{id}/`.
///
/// # Errors
///
/// Returns `NotFound` for an unknown room.
pub async fn get_room(client: &ApiClient, room_id: i64) -> Result<Room, ApiError> {
    let path = client.session().endpoints().room(room_id);
    client.execute(PendingRequest::get(path)).await?.json()
}

/// `POST /api/bookings/`. The payload is validated locally first; an invalid
/// payload never reaches the network.
///
/// # Errors
///
/// Returns `Validation` (local or server side), `Conflict` for an already
/// booked room, `Encode` if the payload cannot be serialized, or the
/// pipeline failure.
pub async fn create_booking(client: &ApiClient, booking: &NewBooking) -> Result<Booking, ApiError> {
    booking.validate()?;
    let body = serde_json::to_value(booking).map_err(|e| ApiError::Encode(e.to_string()))?;
    let path = client.session().endpoints().bookings.clone();
    let created: Booking = client.execute(PendingRequest::post(path).with_json(body)).await?.json()?;
    tracing::info!(booking_id = created.id, room = created.room, "booking created");
    Ok(created)
}

/// `GET /api/bookings/` for the current user.
///
/// # Errors
///
/// Returns the pipeline failure or `Decode` for an unexpected body.
pub async fn list_bookings(client: &ApiClient) -> Result<Vec<Booking>, ApiError> {
    let path = client.session().endpoints().bookings.clone();
    client.execute(PendingRequest::get(path)).await?.json()
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
