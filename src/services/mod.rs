pub mod availability;
pub mod cancellation;
pub mod lifecycle;
pub mod reservation;
pub mod resources;
