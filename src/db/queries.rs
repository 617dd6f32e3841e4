use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, TimeWindow};

const BOOKING_COLUMNS: &str = "id, user_id, vendor_id, resource_id, booking_date, start_time, end_time, \
     status, payment_status, price_at_booking, currency, refund_percentage, \
     notes, cancel_reason, cancelled_at, created_at, updated_at";

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

pub fn create_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, vendor_id, resource_id, booking_date, start_time, end_time, \
         status, payment_status, price_at_booking, currency, refund_percentage, \
         notes, cancel_reason, cancelled_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            booking.id,
            booking.user_id,
            booking.vendor_id,
            booking.resource_id,
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.window.start().format(DATETIME_FMT).to_string(),
            booking.window.end().format(DATETIME_FMT).to_string(),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.price_at_booking,
            booking.currency,
            booking.refund_percentage.map(|p| p as i64),
            booking.notes,
            booking.cancel_reason,
            booking
                .cancelled_at
                .map(|t| t.format(DATETIME_FMT).to_string()),
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings on a resource whose status still counts toward overlap checks.
/// `exclude_id` removes a booking from the result set so a reschedule does
/// not conflict with itself.
pub fn find_active_by_resource(
    conn: &Connection,
    resource_id: &str,
    exclude_id: Option<&str>,
) -> Result<Vec<Booking>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings \
         WHERE resource_id = ?1 \
           AND status IN ('pending', 'confirmed', 'in_progress') \
           AND (?2 IS NULL OR id != ?2) \
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![resource_id, exclude_id], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Persist the reschedulable fields of a booking (date, window, notes).
pub fn update_schedule(conn: &Connection, booking: &Booking) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE bookings SET booking_date = ?1, start_time = ?2, end_time = ?3, notes = ?4, updated_at = ?5 \
         WHERE id = ?6",
        params![
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.window.start().format(DATETIME_FMT).to_string(),
            booking.window.end().format(DATETIME_FMT).to_string(),
            booking.notes,
            booking.updated_at.format(DATETIME_FMT).to_string(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

/// Compare-and-swap status update: only applies if the row still carries
/// the status the caller read. Returns false when another writer got there
/// first (or the row is gone).
pub fn update_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now, id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn update_payment_status(
    conn: &Connection,
    id: &str,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 \
         WHERE id = ?3 AND payment_status = ?4",
        params![to.as_str(), now, id, from.as_str()],
    )?;
    Ok(count > 0)
}

/// Cancel with the same compare-and-swap guard as `update_status`.
pub fn cancel_booking(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    reason: &str,
    refund_percentage: u8,
    payment_status: PaymentStatus,
) -> Result<bool, AppError> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', cancel_reason = ?1, cancelled_at = ?2, \
         refund_percentage = ?3, payment_status = ?4, updated_at = ?2 \
         WHERE id = ?5 AND status = ?6",
        params![
            reason,
            now,
            refund_percentage as i64,
            payment_status.as_str(),
            id,
            from.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Physical delete, guarded at the SQL level as well as in the service:
/// only bookings that never became active may be removed.
pub fn delete_booking(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn.execute(
        "DELETE FROM bookings WHERE id = ?1 AND status IN ('pending', 'cancelled')",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn list_by_user(
    conn: &Connection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>, AppError> {
    list_by_column(conn, "user_id", user_id, limit, offset)
}

pub fn list_by_vendor(
    conn: &Connection,
    vendor_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>, AppError> {
    list_by_column(conn, "vendor_id", vendor_id, limit, offset)
}

pub fn count_by_user(conn: &Connection, user_id: &str) -> Result<i64, AppError> {
    count_by_column(conn, "user_id", user_id)
}

pub fn count_by_vendor(conn: &Connection, vendor_id: &str) -> Result<i64, AppError> {
    count_by_column(conn, "vendor_id", vendor_id)
}

fn list_by_column(
    conn: &Connection,
    column: &str,
    value: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = ?1 \
         ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
    ))?;

    let rows = stmt.query_map(params![value, limit, offset], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn count_by_column(conn: &Connection, column: &str, value: &str) -> Result<i64, AppError> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM bookings WHERE {column} = ?1"),
        params![value],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_booking_row(row: &Row) -> Result<Booking, AppError> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let vendor_id: String = row.get(2)?;
    let resource_id: String = row.get(3)?;
    let booking_date_str: String = row.get(4)?;
    let start_str: String = row.get(5)?;
    let end_str: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let payment_status_str: String = row.get(8)?;
    let price_at_booking: f64 = row.get(9)?;
    let currency: String = row.get(10)?;
    let refund_percentage: Option<i64> = row.get(11)?;
    let notes: Option<String> = row.get(12)?;
    let cancel_reason: Option<String> = row.get(13)?;
    let cancelled_at_str: Option<String> = row.get(14)?;
    let created_at_str: String = row.get(15)?;
    let updated_at_str: String = row.get(16)?;

    let booking_date = NaiveDate::parse_from_str(&booking_date_str, DATE_FMT)
        .map_err(|e| AppError::Store(format!("bad booking date: {e}")))?;
    let window = TimeWindow::new(parse_datetime(&start_str)?, parse_datetime(&end_str)?)
        .map_err(|e| AppError::Store(format!("bad window: {e}")))?;

    Ok(Booking {
        id,
        user_id,
        vendor_id,
        resource_id,
        booking_date,
        window,
        status: BookingStatus::parse(&status_str)
            .ok_or_else(|| AppError::Store(format!("bad status: {status_str}")))?,
        payment_status: PaymentStatus::parse(&payment_status_str)
            .ok_or_else(|| AppError::Store(format!("bad payment status: {payment_status_str}")))?,
        price_at_booking,
        currency,
        refund_percentage: refund_percentage.map(|p| p as u8),
        notes,
        cancel_reason,
        cancelled_at: cancelled_at_str.as_deref().map(parse_datetime).transpose()?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .map_err(|e| AppError::Store(format!("bad timestamp: {e}")))
}
