use async_trait::async_trait;
use bigdecimal::BigDecimal;
use shared::Result;

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct PushPayment {
    pub amount: BigDecimal,
    pub phone: String,
    pub account_reference: String,
}

/// Outbound seam to the mobile-money provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn fetch_credentials(&self) -> Result<ProviderCredentials>;

    /// Submits a push-payment request and returns the provider-assigned
    /// transaction id.
    async fn push_payment(&self, bearer: &str, push: &PushPayment) -> Result<String>;
}
