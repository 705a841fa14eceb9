use crate::models::{NewPayment, Payment};
use async_trait::async_trait;
use shared::{PaymentStatus, Result};

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &NewPayment) -> Result<Payment>;

    async fn by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Move a pending payment to a terminal status. Returns `None` when the
    /// payment is no longer pending.
    async fn finalize(&self, transaction_id: &str, to: PaymentStatus) -> Result<Option<Payment>>;
}
