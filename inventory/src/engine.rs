use crate::models::{NewReservation, Reservation};
use crate::store::{ReleaseOutcome, ReservationStore};
use chrono::{DateTime, Utc};
use shared::{Error, ReservationStatus, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Serializes all capacity mutation for inventory units. Reads a unit
/// snapshot, checks it, and commits through the store's version-guarded
/// primitives, retrying a bounded number of times when the version moved.
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    max_attempts: u32,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    pub async fn reserve(
        &self,
        unit_id: Uuid,
        requester_id: Uuid,
        quantity: i32,
        idempotency_key: Option<&str>,
    ) -> Result<Reservation> {
        if quantity <= 0 {
            return Err(Error::InvalidQuantity(quantity));
        }

        if let Some(key) = idempotency_key {
            if let Some(prior) = self.store.reservation_by_key(key).await? {
                debug!(
                    reservation = %prior.id,
                    "idempotency key seen before, returning prior reservation"
                );
                return Ok(prior);
            }
        }

        for attempt in 1..=self.max_attempts {
            let unit = self
                .store
                .inventory_unit(unit_id)
                .await?
                .ok_or(Error::NotFound("inventory unit"))?;
            if unit.capacity_remaining < quantity {
                return Err(Error::InsufficientCapacity {
                    requested: quantity,
                    available: unit.capacity_remaining,
                });
            }

            let reservation = NewReservation {
                id: Uuid::new_v4(),
                inventory_unit_id: unit_id,
                requester_id,
                quantity,
                status: ReservationStatus::Pending.as_str().to_string(),
                idempotency_key: idempotency_key.map(str::to_string),
            };

            match self.store.commit_reserve(&unit, &reservation).await {
                Ok(Some(row)) => return Ok(row),
                Ok(None) => {
                    debug!(attempt, unit = %unit_id, "unit version moved during reserve, retrying");
                }
                // a concurrent request with the same key won the insert race
                Err(err @ Error::Conflict(_)) => {
                    if let Some(key) = idempotency_key {
                        if let Some(prior) = self.store.reservation_by_key(key).await? {
                            return Ok(prior);
                        }
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::Contention)
    }

    pub async fn release(&self, reservation_id: Uuid) -> Result<Reservation> {
        for attempt in 1..=self.max_attempts {
            let reservation = self
                .store
                .reservation(reservation_id)
                .await?
                .ok_or(Error::NotFound("reservation"))?;
            if reservation.is_cancelled() {
                return Err(Error::AlreadyReleased);
            }
            let unit = self
                .store
                .inventory_unit(reservation.inventory_unit_id)
                .await?
                .ok_or(Error::NotFound("inventory unit"))?;

            match self.store.commit_release(&unit, &reservation).await? {
                ReleaseOutcome::Released(row) => return Ok(row),
                ReleaseOutcome::AlreadyReleased => return Err(Error::AlreadyReleased),
                ReleaseOutcome::VersionConflict => {
                    debug!(attempt, unit = %unit.id, "unit version moved during release, retrying");
                }
            }
        }
        Err(Error::Contention)
    }

    /// Pending -> confirmed. Confirming an already-confirmed reservation is a
    /// no-op so payment callbacks can be replayed.
    pub async fn confirm(&self, reservation_id: Uuid) -> Result<Reservation> {
        let reservation = self
            .store
            .reservation(reservation_id)
            .await?
            .ok_or(Error::NotFound("reservation"))?;
        if reservation.is_confirmed() {
            return Ok(reservation);
        }
        if reservation.is_cancelled() {
            return Err(Error::Conflict("reservation was cancelled".to_string()));
        }

        match self
            .store
            .transition_reservation(
                reservation_id,
                ReservationStatus::Pending,
                ReservationStatus::Confirmed,
            )
            .await?
        {
            Some(row) => Ok(row),
            None => {
                // raced with a concurrent confirm or release
                let current = self
                    .store
                    .reservation(reservation_id)
                    .await?
                    .ok_or(Error::NotFound("reservation"))?;
                if current.is_confirmed() {
                    Ok(current)
                } else {
                    Err(Error::Conflict("reservation was cancelled".to_string()))
                }
            }
        }
    }

    pub async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let expired = self.store.pending_older_than(cutoff).await?;
        let mut released = 0;
        for reservation in expired {
            match self.release(reservation.id).await {
                Ok(_) => released += 1,
                Err(Error::AlreadyReleased) => {}
                Err(e) => {
                    warn!("Failed to release expired reservation {}: {}", reservation.id, e);
                }
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryReservationStore;
    use chrono::Duration;

    async fn engine_with_unit(capacity: i32) -> (ReservationEngine, Uuid) {
        let store = Arc::new(MemoryReservationStore::new());
        let unit = store.create_unit(capacity).await.unwrap();
        (ReservationEngine::new(store), unit.id)
    }

    #[tokio::test]
    async fn reserve_decrements_and_release_restores() {
        let (engine, unit_id) = engine_with_unit(5).await;
        let requester = Uuid::new_v4();

        let first = engine.reserve(unit_id, requester, 3, None).await.unwrap();
        assert!(first.is_pending());
        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 2);

        let err = engine.reserve(unit_id, requester, 3, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientCapacity { requested: 3, available: 2 }
        ));
        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 2);

        let released = engine.release(first.id).await.unwrap();
        assert!(released.is_cancelled());
        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 5);
    }

    #[tokio::test]
    async fn repeated_idempotency_key_returns_prior_reservation() {
        let (engine, unit_id) = engine_with_unit(10).await;
        let requester = Uuid::new_v4();

        let first = engine
            .reserve(unit_id, requester, 4, Some("retry-1"))
            .await
            .unwrap();
        let second = engine
            .reserve(unit_id, requester, 4, Some("retry-1"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 6);
    }

    #[tokio::test]
    async fn release_twice_reports_already_released() {
        let (engine, unit_id) = engine_with_unit(3).await;
        let reservation = engine
            .reserve(unit_id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();

        engine.release(reservation.id).await.unwrap();
        let err = engine.release(reservation.id).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyReleased));

        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 3);
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let (engine, unit_id) = engine_with_unit(3).await;
        for quantity in [0, -2] {
            let err = engine
                .reserve(unit_id, Uuid::new_v4(), quantity, None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidQuantity(q) if q == quantity));
        }
    }

    #[tokio::test]
    async fn unknown_unit_and_reservation_are_not_found() {
        let (engine, _) = engine_with_unit(1).await;
        let err = engine
            .reserve(Uuid::new_v4(), Uuid::new_v4(), 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound("inventory unit")));

        let err = engine.release(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound("reservation")));
    }

    #[tokio::test]
    async fn confirm_is_idempotent_and_rejects_cancelled() {
        let (engine, unit_id) = engine_with_unit(2).await;
        let reservation = engine
            .reserve(unit_id, Uuid::new_v4(), 1, None)
            .await
            .unwrap();

        let confirmed = engine.confirm(reservation.id).await.unwrap();
        assert!(confirmed.is_confirmed());
        let again = engine.confirm(reservation.id).await.unwrap();
        assert!(again.is_confirmed());

        let other = engine
            .reserve(unit_id, Uuid::new_v4(), 1, None)
            .await
            .unwrap();
        engine.release(other.id).await.unwrap();
        let err = engine.confirm(other.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn release_expired_only_touches_stale_pending_reservations() {
        let (engine, unit_id) = engine_with_unit(6).await;
        let stale = engine
            .reserve(unit_id, Uuid::new_v4(), 2, None)
            .await
            .unwrap();
        let confirmed = engine
            .reserve(unit_id, Uuid::new_v4(), 1, None)
            .await
            .unwrap();
        engine.confirm(confirmed.id).await.unwrap();

        let cutoff = Utc::now() + Duration::seconds(1);
        let released = engine.release_expired(cutoff).await.unwrap();
        assert_eq!(released, 1);

        let unit = engine.store().inventory_unit(unit_id).await.unwrap().unwrap();
        assert_eq!(unit.capacity_remaining, 5);
        let stale = engine.store().reservation(stale.id).await.unwrap().unwrap();
        assert!(stale.is_cancelled());
        let confirmed = engine
            .store()
            .reservation(confirmed.id)
            .await
            .unwrap()
            .unwrap();
        assert!(confirmed.is_confirmed());
    }
}
