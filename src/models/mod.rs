pub mod booking;
pub mod identity;
pub mod window;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use identity::{Identity, Role};
pub use window::TimeWindow;
