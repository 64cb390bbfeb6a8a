//! Outbound integrations used by the buy workflow. Concrete carrier and
//! payout clients live outside this crate; the defaults here report
//! themselves as unconfigured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("{0}")]
    Failed(String),
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(what) => {
                ServiceError::InvalidOperation(format!("{} is not configured", what))
            }
            ProviderError::Failed(msg) => ServiceError::ExternalServiceError(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelKind {
    /// Kit sent to the customer
    Outbound,
    /// Items sent back to the customer
    Return,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LabelOptions {
    pub service_type: Option<String>,
    pub weight_oz: Option<Decimal>,
    pub signature_required: Option<bool>,
}

/// Everything a carrier needs to address a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub store_id: Uuid,
    pub transaction_id: Uuid,
    pub transaction_number: String,
    pub customer_name: Option<String>,
    pub options: LabelOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingLabel {
    pub tracking_number: String,
    pub carrier: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShippingLabelProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn create_outbound_label(
        &self,
        request: LabelRequest,
    ) -> Result<ShippingLabel, ProviderError>;

    async fn create_return_label(&self, request: LabelRequest)
        -> Result<ShippingLabel, ProviderError>;

    async fn label_pdf(&self, tracking_number: String) -> Result<Vec<u8>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub store_id: Uuid,
    pub transaction_id: Uuid,
    pub recipient_email: Option<String>,
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub payout_id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send_transaction_payout(
        &self,
        request: PayoutRequest,
    ) -> Result<PayoutReceipt, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: String,
        message: String,
        context: serde_json::Value,
    ) -> Result<(), ProviderError>;
}

#[derive(Debug, Default, Clone)]
pub struct UnconfiguredShippingProvider;

#[async_trait]
impl ShippingLabelProvider for UnconfiguredShippingProvider {
    fn is_configured(&self) -> bool {
        false
    }

    async fn create_outbound_label(
        &self,
        _request: LabelRequest,
    ) -> Result<ShippingLabel, ProviderError> {
        Err(ProviderError::NotConfigured("Shipping provider".into()))
    }

    async fn create_return_label(
        &self,
        _request: LabelRequest,
    ) -> Result<ShippingLabel, ProviderError> {
        Err(ProviderError::NotConfigured("Shipping provider".into()))
    }

    async fn label_pdf(&self, _tracking_number: String) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::NotConfigured("Shipping provider".into()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct UnconfiguredPayoutProvider;

#[async_trait]
impl PayoutProvider for UnconfiguredPayoutProvider {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send_transaction_payout(
        &self,
        _request: PayoutRequest,
    ) -> Result<PayoutReceipt, ProviderError> {
        Err(ProviderError::NotConfigured("PayPal payouts".into()))
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSender for TracingNotifier {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: String,
        message: String,
        context: serde_json::Value,
    ) -> Result<(), ProviderError> {
        info!(%channel, %recipient, %message, %context, "notification");
        Ok(())
    }
}

/// Provider handles shared by the services.
#[derive(Clone)]
pub struct Collaborators {
    pub shipping: Arc<dyn ShippingLabelProvider>,
    pub payouts: Arc<dyn PayoutProvider>,
    pub notifier: Arc<dyn NotificationSender>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            shipping: Arc::new(UnconfiguredShippingProvider),
            payouts: Arc::new(UnconfiguredPayoutProvider),
            notifier: Arc::new(TracingNotifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn defaults_are_unconfigured() {
        let c = Collaborators::default();
        assert!(!c.shipping.is_configured());
        assert!(!c.payouts.is_configured());
        let err = c
            .payouts
            .send_transaction_payout(PayoutRequest {
                store_id: Uuid::nil(),
                transaction_id: Uuid::nil(),
                recipient_email: None,
                amount: Decimal::ONE,
                note: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ProviderError::NotConfigured(_));
    }

    #[test]
    fn provider_failures_map_to_bad_gateway() {
        let err: ServiceError = ProviderError::Failed("carrier timeout".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
        let err: ServiceError = ProviderError::NotConfigured("Shipping provider".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
