//! Booking endpoints.
//!
//! Handlers only translate HTTP to engine calls; every rule lives in
//! `rental-engine`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use rental_core::{ActorRole, Booking, BookingStatus, PriceBreakdown};
use rental_engine::{BookingPatch, BookingView, CreateBookingRequest, QuoteRequest};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

/// Header carrying the client's creation key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Response of `POST /bookings`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBooking {
    pub booking_id: String,
    pub status: BookingStatus,
}

/// Query of `GET /bookings`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Side of the bookings to list; renter when absent.
    pub role: Option<ActorRole>,
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

/// Response of `GET /bookings`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
}

/// `POST /bookings`
///
/// An `Idempotency-Key` header takes precedence over a key in the body.
pub async fn create_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreatedBooking>)> {
    let Json(mut request) = payload?;

    if let Some(key) = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        request.idempotency_key = Some(key.to_string());
    }

    let booking = state.engine.create_booking(&caller.uid, request).await?;
    info!(id = %booking.id, renter = %caller.uid, "POST /bookings");

    Ok((
        StatusCode::CREATED,
        Json(CreatedBooking {
            booking_id: booking.id,
            status: booking.status,
        }),
    ))
}

/// `GET /bookings?role=&status=&limit=`
pub async fn list_bookings(
    State(state): State<AppState>,
    caller: AuthUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<BookingList>> {
    let Query(params) = params?;
    let bookings = state
        .engine
        .list_bookings(
            &caller.uid,
            params.role.unwrap_or(ActorRole::Renter),
            params.status,
            params.limit,
        )
        .await?;

    Ok(Json(BookingList { bookings }))
}

/// `GET /bookings/{id}`
pub async fn get_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<BookingView>> {
    Ok(Json(state.engine.get_booking(&id, &caller.uid).await?))
}

/// `PATCH /bookings/{id}`
pub async fn update_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<BookingPatch>, JsonRejection>,
) -> ApiResult<Json<Booking>> {
    let Json(patch) = payload?;
    let booking = state.engine.update_details(&id, &caller.uid, patch).await?;
    Ok(Json(booking))
}

/// `POST /bookings/quote`
pub async fn quote(
    State(state): State<AppState>,
    _caller: AuthUser,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> ApiResult<Json<PriceBreakdown>> {
    let Json(request) = payload?;
    Ok(Json(state.engine.quote(&request).await?))
}
