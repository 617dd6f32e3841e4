use crate::errors::AppError;
use crate::models::BookingStatus;

/// Legal status edges:
///
/// ```text
/// pending -> confirmed -> in_progress -> completed
/// pending | confirmed | in_progress -> cancelled
/// confirmed | in_progress -> no_show
/// ```
///
/// completed, cancelled and no_show are absorbing; nothing re-enters a
/// state already left.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, InProgress)
            | (InProgress, Completed)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
            | (InProgress, Cancelled)
            | (Confirmed, NoShow)
            | (InProgress, NoShow)
    )
}

pub fn ensure_transition(from: BookingStatus, to: BookingStatus) -> Result<(), AppError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}
