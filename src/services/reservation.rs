use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Identity, PaymentStatus, TimeWindow};
use crate::services::{availability, cancellation, lifecycle};
use crate::state::AppState;

pub struct CreateBooking {
    pub vendor_id: String,
    pub resource_id: String,
    pub booking_date: NaiveDate,
    pub window: TimeWindow,
    pub notes: Option<String>,
}

/// Partial update; `None` fields are left untouched.
pub struct UpdateBooking {
    pub booking_date: Option<NaiveDate>,
    pub window: Option<TimeWindow>,
    pub notes: Option<String>,
}

pub struct CancelOutcome {
    pub booking: Booking,
    pub refund_percentage: u8,
}

pub struct BookingPage {
    pub bookings: Vec<Booking>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Create a booking in status `pending` with a price snapshot taken from
/// the resource. All business-rule checks run before anything is written.
pub async fn create_booking(
    state: &AppState,
    identity: &Identity,
    req: CreateBooking,
) -> Result<Booking, AppError> {
    if req.booking_date < Utc::now().date_naive() {
        return Err(AppError::InvalidBooking(
            "booking date cannot be in the past".to_string(),
        ));
    }

    let resource = state.resources.validate(&req.resource_id).await?;
    if !resource.active {
        return Err(AppError::InvalidBooking(
            "resource is not available for booking".to_string(),
        ));
    }
    if resource.vendor_id != req.vendor_id {
        return Err(AppError::InvalidBooking(
            "resource does not belong to this vendor".to_string(),
        ));
    }

    // The availability check and the insert share one lock scope, so two
    // concurrent requests for overlapping windows cannot both pass the
    // check: the loser sees the winner's row and gets a conflict.
    let db = state.db.lock().unwrap();
    if !availability::is_available(&db, &req.resource_id, &req.window, None)? {
        return Err(AppError::Conflict(
            "this time slot is not available, please choose another time".to_string(),
        ));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: identity.user_id.clone(),
        vendor_id: req.vendor_id,
        resource_id: req.resource_id,
        booking_date: req.booking_date,
        window: req.window,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        price_at_booking: resource.price,
        currency: resource.currency,
        refund_percentage: None,
        notes: req.notes,
        cancel_reason: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    };
    queries::create_booking(&db, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        resource_id = %booking.resource_id,
        "booking created"
    );
    Ok(booking)
}

pub fn get_booking(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let db = state.db.lock().unwrap();
    find_booking(&db, id)
}

/// Patch date, window and/or notes. Notes may change on any non-terminal
/// booking; date and window changes are only legal while the booking is
/// pending or confirmed, and a new window must independently pass the
/// availability check (excluding this booking's own row).
pub fn update_booking(
    state: &AppState,
    id: &str,
    patch: UpdateBooking,
) -> Result<Booking, AppError> {
    let db = state.db.lock().unwrap();
    let mut booking = find_booking(&db, id)?;

    if booking.status.is_terminal() {
        return Err(AppError::InvalidBooking(
            "cannot update a booking in a terminal status".to_string(),
        ));
    }

    let reschedules = patch.booking_date.is_some() || patch.window.is_some();
    if reschedules
        && !matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        )
    {
        return Err(AppError::InvalidBooking(
            "only pending or confirmed bookings can be rescheduled".to_string(),
        ));
    }

    if let Some(window) = patch.window {
        if !availability::is_available(&db, &booking.resource_id, &window, Some(id))? {
            return Err(AppError::Conflict(
                "this time slot is not available, please choose another time".to_string(),
            ));
        }
        booking.window = window;
    }
    if let Some(date) = patch.booking_date {
        booking.booking_date = date;
    }
    if let Some(notes) = patch.notes {
        booking.notes = Some(notes);
    }
    booking.updated_at = Utc::now().naive_utc();

    if !queries::update_schedule(&db, &booking)? {
        return Err(AppError::NotFound(format!("booking {id} not found")));
    }
    Ok(booking)
}

/// Apply a lifecycle transition. The current status is re-read under the
/// lock and the update is a compare-and-swap against it, so a concurrent
/// writer surfaces as a conflict rather than being overwritten.
///
/// Cancellation is not reachable through this path: it must set the
/// cancellation metadata and refund bookkeeping, which only
/// [`cancel_booking`] does.
pub fn update_booking_status(
    state: &AppState,
    id: &str,
    target: BookingStatus,
) -> Result<Booking, AppError> {
    if target == BookingStatus::Cancelled {
        return Err(AppError::InvalidBooking(
            "bookings are cancelled via the cancel operation, which records the refund".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();
    let booking = find_booking(&db, id)?;

    lifecycle::ensure_transition(booking.status, target)?;

    if !queries::update_status(&db, id, booking.status, target)? {
        return Err(AppError::Conflict(
            "booking was modified concurrently, please retry".to_string(),
        ));
    }

    tracing::info!(
        booking_id = %id,
        from = booking.status.as_str(),
        to = target.as_str(),
        "booking status updated"
    );
    find_booking(&db, id)
}

/// Cancel a booking and record the refund owed per the cancellation
/// policy. Cancelling an already-cancelled or otherwise terminal booking
/// is an error, never a silent no-op.
pub fn cancel_booking(state: &AppState, id: &str, reason: &str) -> Result<CancelOutcome, AppError> {
    let db = state.db.lock().unwrap();
    let booking = find_booking(&db, id)?;

    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::InvalidBooking(
            "booking is already cancelled".to_string(),
        ));
    }
    if booking.status.is_terminal() {
        return Err(AppError::InvalidBooking(
            "cannot cancel a booking in a terminal status".to_string(),
        ));
    }

    let refund = cancellation::calculate_refund(booking.window.start(), Utc::now().naive_utc());
    let payment_status = if booking.payment_status == PaymentStatus::Paid && refund.percentage > 0 {
        PaymentStatus::Refunded
    } else {
        booking.payment_status
    };

    if !queries::cancel_booking(&db, id, booking.status, reason, refund.percentage, payment_status)? {
        return Err(AppError::Conflict(
            "booking was modified concurrently, please retry".to_string(),
        ));
    }

    tracing::info!(
        booking_id = %id,
        refund_percentage = refund.percentage,
        reason = refund.reason,
        "booking cancelled"
    );
    Ok(CancelOutcome {
        booking: find_booking(&db, id)?,
        refund_percentage: refund.percentage,
    })
}

/// Payment bookkeeping only; actual money movement lives elsewhere.
/// A refund is reachable solely on a cancelled booking.
pub fn update_payment_status(
    state: &AppState,
    id: &str,
    target: PaymentStatus,
) -> Result<Booking, AppError> {
    let db = state.db.lock().unwrap();
    let booking = find_booking(&db, id)?;

    let legal = matches!(
        (booking.payment_status, target),
        (PaymentStatus::Pending, PaymentStatus::Paid)
            | (PaymentStatus::Pending, PaymentStatus::Failed)
            | (PaymentStatus::Failed, PaymentStatus::Paid)
            | (PaymentStatus::Paid, PaymentStatus::Refunded)
    );
    if !legal {
        return Err(AppError::InvalidBooking(format!(
            "payment status cannot move from {} to {}",
            booking.payment_status.as_str(),
            target.as_str()
        )));
    }
    if target == PaymentStatus::Refunded && booking.status != BookingStatus::Cancelled {
        return Err(AppError::InvalidBooking(
            "only cancelled bookings can be refunded".to_string(),
        ));
    }

    if !queries::update_payment_status(&db, id, booking.payment_status, target)? {
        return Err(AppError::Conflict(
            "booking was modified concurrently, please retry".to_string(),
        ));
    }
    find_booking(&db, id)
}

/// Physical delete is restricted to bookings that were never active:
/// pending or cancelled. Anything that was ever confirmed stays on record.
pub fn delete_booking(state: &AppState, id: &str) -> Result<(), AppError> {
    let db = state.db.lock().unwrap();
    let booking = find_booking(&db, id)?;

    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Cancelled
    ) {
        return Err(AppError::InvalidBooking(
            "only pending or cancelled bookings can be deleted".to_string(),
        ));
    }

    queries::delete_booking(&db, id)?;
    tracing::info!(booking_id = %id, "booking deleted");
    Ok(())
}

pub fn list_user_bookings(
    state: &AppState,
    user_id: &str,
    page: i64,
    limit: i64,
) -> Result<BookingPage, AppError> {
    let (page, limit) = clamp_page(page, limit);
    let db = state.db.lock().unwrap();
    let bookings = queries::list_by_user(&db, user_id, limit, (page - 1) * limit)?;
    let total = queries::count_by_user(&db, user_id)?;
    Ok(paginate(bookings, total, page, limit))
}

pub fn list_vendor_bookings(
    state: &AppState,
    vendor_id: &str,
    page: i64,
    limit: i64,
) -> Result<BookingPage, AppError> {
    let (page, limit) = clamp_page(page, limit);
    let db = state.db.lock().unwrap();
    let bookings = queries::list_by_vendor(&db, vendor_id, limit, (page - 1) * limit)?;
    let total = queries::count_by_vendor(&db, vendor_id)?;
    Ok(paginate(bookings, total, page, limit))
}

fn find_booking(db: &rusqlite::Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(db, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id} not found")))
}

fn clamp_page(page: i64, limit: i64) -> (i64, i64) {
    (page.max(1), limit.clamp(1, 100))
}

fn paginate(bookings: Vec<Booking>, total: i64, page: i64, limit: i64) -> BookingPage {
    BookingPage {
        bookings,
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    }
}
