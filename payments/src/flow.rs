use crate::models::{NewPayment, Payment};
use crate::provider::{PaymentProvider, PushPayment};
use crate::store::PaymentStore;
use crate::token::{Clock, TokenCache, SystemClock};
use bigdecimal::BigDecimal;
use inventory::ReservationEngine;
use shared::{Error, PaymentOutcome, PaymentStatus, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Push-payment lifecycle: initiate against the provider, then finalize from
/// the provider callback or a status poll.
pub struct PaymentFlow {
    store: Arc<dyn PaymentStore>,
    provider: Arc<dyn PaymentProvider>,
    tokens: TokenCache,
    reservations: Arc<ReservationEngine>,
}

impl PaymentFlow {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        provider: Arc<dyn PaymentProvider>,
        reservations: Arc<ReservationEngine>,
    ) -> Self {
        Self {
            store,
            provider,
            tokens: TokenCache::new(Arc::new(SystemClock)),
            reservations,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tokens = TokenCache::new(clock);
        self
    }

    /// Starts a push payment. Nothing is persisted unless the provider
    /// accepts the request and hands back a transaction id.
    pub async fn initiate(
        &self,
        reservation_id: Option<Uuid>,
        order_id: Option<Uuid>,
        amount: BigDecimal,
        phone: &str,
    ) -> Result<Payment> {
        if amount <= BigDecimal::from(0) {
            return Err(Error::validation("amount must be positive"));
        }

        let reference = reservation_id
            .or(order_id)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "account".to_string());

        let bearer = self.tokens.bearer(self.provider.as_ref()).await?;
        let push = PushPayment {
            amount: amount.clone(),
            phone: phone.to_string(),
            account_reference: reference,
        };
        let transaction_id = self.provider.push_payment(&bearer, &push).await?;

        let payment = self
            .store
            .insert(&NewPayment {
                id: Uuid::new_v4(),
                reservation_id,
                order_id,
                amount,
                status: PaymentStatus::Pending.as_str().to_string(),
                transaction_id,
                phone: phone.to_string(),
            })
            .await?;
        info!(
            payment = %payment.id,
            transaction_id = %payment.transaction_id,
            "Recorded pending payment"
        );
        Ok(payment)
    }

    pub async fn confirm(&self, transaction_id: &str, outcome: PaymentOutcome) -> Result<Payment> {
        let payment = self
            .store
            .by_transaction_id(transaction_id)
            .await?
            .ok_or(Error::NotFound("payment"))?;
        let target = outcome.final_status();

        if !payment.is_pending() {
            // providers redeliver callbacks; a replay of the same outcome is
            // a no-op success
            if payment.status == target.as_str() {
                return Ok(payment);
            }
            return Err(Error::AlreadyFinalized);
        }

        // flip the reservation first: confirm is idempotent, so a failure
        // between the two steps is repaired by the next redelivery
        if outcome == PaymentOutcome::Completed {
            if let Some(reservation_id) = payment.reservation_id {
                self.reservations.confirm(reservation_id).await?;
            }
        }

        match self.store.finalize(transaction_id, target).await? {
            Some(finalized) => {
                info!(
                    transaction_id = %finalized.transaction_id,
                    status = %finalized.status,
                    "Payment finalized"
                );
                Ok(finalized)
            }
            None => {
                // lost the race against a concurrent delivery of the callback
                let current = self
                    .store
                    .by_transaction_id(transaction_id)
                    .await?
                    .ok_or(Error::NotFound("payment"))?;
                if current.status == target.as_str() {
                    Ok(current)
                } else {
                    Err(Error::AlreadyFinalized)
                }
            }
        }
    }

    pub async fn status(&self, transaction_id: &str) -> Result<Payment> {
        self.store
            .by_transaction_id(transaction_id)
            .await?
            .ok_or(Error::NotFound("payment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPaymentStore;
    use crate::provider::ProviderCredentials;
    use async_trait::async_trait;
    use inventory::{MemoryReservationStore, Reservation, ReservationStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AcceptingProvider {
        pushes: AtomicUsize,
    }

    impl AcceptingProvider {
        fn new() -> Self {
            Self {
                pushes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for AcceptingProvider {
        async fn fetch_credentials(&self) -> Result<ProviderCredentials> {
            Ok(ProviderCredentials {
                access_token: "token".to_string(),
                expires_in: 3600,
            })
        }

        async fn push_payment(&self, _bearer: &str, _push: &PushPayment) -> Result<String> {
            let n = self.pushes.fetch_add(1, Ordering::SeqCst);
            Ok(format!("TXN-{n}"))
        }
    }

    struct RejectingProvider;

    #[async_trait]
    impl PaymentProvider for RejectingProvider {
        async fn fetch_credentials(&self) -> Result<ProviderCredentials> {
            Ok(ProviderCredentials {
                access_token: "token".to_string(),
                expires_in: 3600,
            })
        }

        async fn push_payment(&self, _bearer: &str, _push: &PushPayment) -> Result<String> {
            Err(Error::ProviderRejected("declined".to_string()))
        }
    }

    async fn flow_with_reservation(
        provider: Arc<dyn PaymentProvider>,
    ) -> (PaymentFlow, Arc<MemoryPaymentStore>, Arc<ReservationEngine>, Reservation) {
        let reservation_store = Arc::new(MemoryReservationStore::new());
        let unit = reservation_store.create_unit(10).await.unwrap();
        let engine = Arc::new(ReservationEngine::new(reservation_store));
        let reservation = engine
            .reserve(unit.id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();

        let store = Arc::new(MemoryPaymentStore::new());
        let flow = PaymentFlow::new(store.clone(), provider, engine.clone());
        (flow, store, engine, reservation)
    }

    #[tokio::test]
    async fn initiate_records_a_pending_payment() {
        let (flow, store, _, reservation) =
            flow_with_reservation(Arc::new(AcceptingProvider::new())).await;

        let payment = flow
            .initiate(Some(reservation.id), None, BigDecimal::from(150), "0712345678")
            .await
            .unwrap();

        assert!(payment.is_pending());
        assert_eq!(payment.reservation_id, Some(reservation.id));
        let stored = store
            .by_transaction_id(&payment.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, payment.id);
    }

    #[tokio::test]
    async fn provider_rejection_persists_nothing() {
        let (flow, store, _, reservation) =
            flow_with_reservation(Arc::new(RejectingProvider)).await;

        let err = flow
            .initiate(Some(reservation.id), None, BigDecimal::from(80), "0712345678")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderRejected(_)));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let (flow, store, _, _) = flow_with_reservation(Arc::new(AcceptingProvider::new())).await;

        let err = flow
            .initiate(None, None, BigDecimal::from(0), "0712345678")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn completed_callback_confirms_reservation_and_replays_as_noop() {
        let (flow, _, engine, reservation) =
            flow_with_reservation(Arc::new(AcceptingProvider::new())).await;
        let payment = flow
            .initiate(Some(reservation.id), None, BigDecimal::from(200), "0712345678")
            .await
            .unwrap();

        let confirmed = flow
            .confirm(&payment.transaction_id, PaymentOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Completed.as_str());

        let reservation = engine
            .store()
            .reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reservation.is_confirmed());

        // webhook redelivery
        let replayed = flow
            .confirm(&payment.transaction_id, PaymentOutcome::Completed)
            .await
            .unwrap();
        assert_eq!(replayed.status, PaymentStatus::Completed.as_str());

        let err = flow
            .confirm(&payment.transaction_id, PaymentOutcome::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyFinalized));
    }

    #[tokio::test]
    async fn failed_callback_leaves_reservation_pending() {
        let (flow, _, engine, reservation) =
            flow_with_reservation(Arc::new(AcceptingProvider::new())).await;
        let payment = flow
            .initiate(Some(reservation.id), None, BigDecimal::from(200), "0712345678")
            .await
            .unwrap();

        let failed = flow
            .confirm(&payment.transaction_id, PaymentOutcome::Failed)
            .await
            .unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed.as_str());

        let reservation = engine
            .store()
            .reservation(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reservation.is_pending());
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (flow, _, _, _) = flow_with_reservation(Arc::new(AcceptingProvider::new())).await;
        let err = flow
            .confirm("TXN-MISSING", PaymentOutcome::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("payment")));
    }
}
