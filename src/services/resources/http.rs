use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{ResourceLookup, ResourceSnapshot};
use crate::errors::AppError;

/// Client for the resource service's internal lookup route. Carries a
/// short timeout so a hung resource service surfaces as a retryable
/// upstream error instead of stalling the request.
pub struct HttpResourceLookup {
    base_url: String,
    internal_key: String,
    client: reqwest::Client,
}

impl HttpResourceLookup {
    pub fn new(base_url: String, internal_key: String, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build resource service client")?;

        Ok(Self {
            base_url,
            internal_key,
            client,
        })
    }
}

#[derive(Deserialize)]
struct ResourceResponse {
    active: bool,
    vendor_id: String,
    price: f64,
    currency: String,
}

#[async_trait]
impl ResourceLookup for HttpResourceLookup {
    async fn validate(&self, resource_id: &str) -> Result<ResourceSnapshot, AppError> {
        let url = format!("{}/api/internal/resources/{resource_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-internal-key", &self.internal_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("resource service unreachable: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("resource {resource_id} not found")));
        }

        let response = response
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("resource service returned error: {e}")))?;

        let body: ResourceResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid resource service response: {e}")))?;

        Ok(ResourceSnapshot {
            active: body.active,
            vendor_id: body.vendor_id,
            price: body.price,
            currency: body.currency,
        })
    }
}
