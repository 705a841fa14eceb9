use crate::models::{NewPayment, Payment};
use crate::store::PaymentStore;
use async_trait::async_trait;
use chrono::Utc;
use shared::{Error, PaymentStatus, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory payment store keyed by provider transaction id.
#[derive(Default)]
pub struct MemoryPaymentStore {
    inner: Mutex<HashMap<String, Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, payment: &NewPayment) -> Result<Payment> {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(&payment.transaction_id) {
            return Err(Error::Conflict(format!(
                "duplicate transaction id {}",
                payment.transaction_id
            )));
        }
        let now = Utc::now();
        let row = Payment {
            id: payment.id,
            reservation_id: payment.reservation_id,
            order_id: payment.order_id,
            amount: payment.amount.clone(),
            status: payment.status.clone(),
            transaction_id: payment.transaction_id.clone(),
            phone: payment.phone.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.insert(row.transaction_id.clone(), row.clone());
        Ok(row)
    }

    async fn by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        Ok(self.inner.lock().await.get(transaction_id).cloned())
    }

    async fn finalize(&self, transaction_id: &str, to: PaymentStatus) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(transaction_id) {
            Some(row) if row.status == PaymentStatus::Pending.as_str() => {
                row.status = to.as_str().to_string();
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }
}
