use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::TimeWindow;

/// True iff no active booking on the resource overlaps the candidate
/// window. Cancelled and otherwise terminal bookings never block a slot.
///
/// This is a read-then-decide check: the caller must hold the connection
/// lock across this call and the subsequent insert/update, otherwise two
/// concurrent requests can both see an empty slot.
pub fn is_available(
    conn: &Connection,
    resource_id: &str,
    window: &TimeWindow,
    exclude_booking_id: Option<&str>,
) -> Result<bool, AppError> {
    let active = queries::find_active_by_resource(conn, resource_id, exclude_booking_id)?;
    Ok(active.iter().all(|b| !b.window.overlaps(window)))
}
