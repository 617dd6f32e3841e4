use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, TimeWindow};
use crate::services::reservation::{self, BookingPage, CreateBooking, UpdateBooking};
use crate::state::AppState;

use super::identity_from_headers;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    user_id: String,
    vendor_id: String,
    resource_id: String,
    booking_date: String,
    start_time: String,
    end_time: String,
    status: BookingStatus,
    payment_status: PaymentStatus,
    price_at_booking: f64,
    currency: String,
    refund_percentage: Option<u8>,
    notes: Option<String>,
    cancel_reason: Option<String>,
    cancelled_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            user_id: b.user_id,
            vendor_id: b.vendor_id,
            resource_id: b.resource_id,
            booking_date: b.booking_date.format(DATE_FMT).to_string(),
            start_time: b.window.start().format(DATETIME_FMT).to_string(),
            end_time: b.window.end().format(DATETIME_FMT).to_string(),
            status: b.status,
            payment_status: b.payment_status,
            price_at_booking: b.price_at_booking,
            currency: b.currency,
            refund_percentage: b.refund_percentage,
            notes: b.notes,
            cancel_reason: b.cancel_reason,
            cancelled_at: b.cancelled_at.map(|t| t.format(DATETIME_FMT).to_string()),
            created_at: b.created_at.format(DATETIME_FMT).to_string(),
            updated_at: b.updated_at.format(DATETIME_FMT).to_string(),
        }
    }
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub vendor_id: String,
    pub resource_id: String,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let identity = identity_from_headers(&headers)?;

    let window = TimeWindow::new(
        parse_datetime(&req.start_time)?,
        parse_datetime(&req.end_time)?,
    )?;

    let booking = reservation::create_booking(
        &state,
        &identity,
        CreateBooking {
            vendor_id: req.vendor_id,
            resource_id: req.resource_id,
            booking_date: parse_date(&req.booking_date)?,
            window,
            notes: req.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    identity_from_headers(&headers)?;
    let booking = reservation::get_booking(&state, &id)?;
    Ok(Json(booking.into()))
}

// PATCH /api/bookings/:id
#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    pub booking_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    identity_from_headers(&headers)?;

    let window = match (&req.start_time, &req.end_time) {
        (Some(start), Some(end)) => {
            Some(TimeWindow::new(parse_datetime(start)?, parse_datetime(end)?)?)
        }
        (None, None) => None,
        _ => {
            return Err(AppError::InvalidBooking(
                "start_time and end_time must be provided together".to_string(),
            ))
        }
    };

    let booking = reservation::update_booking(
        &state,
        &id,
        UpdateBooking {
            booking_date: req.booking_date.as_deref().map(parse_date).transpose()?,
            window,
            notes: req.notes,
        },
    )?;
    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelBookingRequest {
    pub reason: String,
}

#[derive(Serialize)]
pub struct CancelBookingResponse {
    pub booking: BookingResponse,
    pub refund_percentage: u8,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<CancelBookingResponse>, AppError> {
    identity_from_headers(&headers)?;
    let outcome = reservation::cancel_booking(&state, &id, &req.reason)?;
    Ok(Json(CancelBookingResponse {
        booking: outcome.booking.into(),
        refund_percentage: outcome.refund_percentage,
    }))
}

// POST /api/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    identity_from_headers(&headers)?;
    let target = BookingStatus::parse(&req.status)
        .ok_or_else(|| AppError::InvalidBooking(format!("unknown status: {}", req.status)))?;
    let booking = reservation::update_booking_status(&state, &id, target)?;
    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/payment
#[derive(Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: String,
}

pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    identity_from_headers(&headers)?;
    let target = PaymentStatus::parse(&req.payment_status).ok_or_else(|| {
        AppError::InvalidBooking(format!("unknown payment status: {}", req.payment_status))
    })?;
    let booking = reservation::update_payment_status(&state, &id, target)?;
    Ok(Json(booking.into()))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    identity_from_headers(&headers)?;
    reservation::delete_booking(&state, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/users/:id/bookings and /api/vendors/:id/bookings
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BookingPageResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl From<BookingPage> for BookingPageResponse {
    fn from(p: BookingPage) -> Self {
        BookingPageResponse {
            bookings: p.bookings.into_iter().map(Into::into).collect(),
            total: p.total,
            page: p.page,
            limit: p.limit,
            total_pages: p.total_pages,
        }
    }
}

pub async fn user_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<BookingPageResponse>, AppError> {
    identity_from_headers(&headers)?;
    let page = reservation::list_user_bookings(
        &state,
        &user_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(10),
    )?;
    Ok(Json(page.into()))
}

pub async fn vendor_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(vendor_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<BookingPageResponse>, AppError> {
    identity_from_headers(&headers)?;
    let page = reservation::list_vendor_bookings(
        &state,
        &vendor_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(10),
    )?;
    Ok(Json(page.into()))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|_| {
        AppError::InvalidBooking(format!("invalid timestamp '{s}', expected {DATETIME_FMT}"))
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|_| AppError::InvalidBooking(format!("invalid date '{s}', expected {DATE_FMT}")))
}
