pub mod http;

use async_trait::async_trait;

use crate::errors::AppError;

/// Snapshot of a resource as reported by the resource service at booking
/// time. Price and currency get copied onto the booking so later price
/// changes never affect existing reservations.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub active: bool,
    pub vendor_id: String,
    pub price: f64,
    pub currency: String,
}

#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Resolve a resource by id. Returns `NotFound` when the resource does
    /// not exist and `Upstream` when the resource service cannot be
    /// reached in time; a transport failure must never read as "resource
    /// invalid".
    async fn validate(&self, resource_id: &str) -> Result<ResourceSnapshot, AppError>;
}
