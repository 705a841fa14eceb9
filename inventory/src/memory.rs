//! In-memory store with the same compare-and-swap semantics as the Postgres
//! store. Backs the engine tests and anything that wants an embedded pool.

use crate::models::{InventoryUnit, NewReservation, Reservation};
use crate::store::{ReleaseOutcome, ReservationStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Error, ReservationStatus, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    units: HashMap<Uuid, InventoryUnit>,
    reservations: HashMap<Uuid, Reservation>,
    by_key: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryReservationStore {
    inner: Mutex<Inner>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn create_unit(&self, capacity: i32) -> Result<InventoryUnit> {
        if capacity < 0 {
            return Err(Error::InvalidQuantity(capacity));
        }
        let now = Utc::now();
        let unit = InventoryUnit {
            id: Uuid::new_v4(),
            capacity_total: capacity,
            capacity_remaining: capacity,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.units.insert(unit.id, unit.clone());
        Ok(unit)
    }

    async fn inventory_unit(&self, id: Uuid) -> Result<Option<InventoryUnit>> {
        Ok(self.inner.lock().await.units.get(&id).cloned())
    }

    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>> {
        Ok(self.inner.lock().await.reservations.get(&id).cloned())
    }

    async fn reservation_by_key(&self, key: &str) -> Result<Option<Reservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_key
            .get(key)
            .and_then(|id| inner.reservations.get(id))
            .cloned())
    }

    async fn commit_reserve(
        &self,
        unit: &InventoryUnit,
        reservation: &NewReservation,
    ) -> Result<Option<Reservation>> {
        let mut inner = self.inner.lock().await;

        // mirrors the unique index on idempotency_key
        if let Some(key) = &reservation.idempotency_key {
            if inner.by_key.contains_key(key) {
                return Err(Error::Conflict(format!("duplicate idempotency key {key}")));
            }
        }

        let stored = inner
            .units
            .get_mut(&unit.id)
            .ok_or(Error::NotFound("inventory unit"))?;
        if stored.version != unit.version {
            return Ok(None);
        }
        stored.capacity_remaining -= reservation.quantity;
        stored.version += 1;
        stored.updated_at = Utc::now();

        let now = Utc::now();
        let row = Reservation {
            id: reservation.id,
            inventory_unit_id: reservation.inventory_unit_id,
            requester_id: reservation.requester_id,
            quantity: reservation.quantity,
            status: reservation.status.clone(),
            idempotency_key: reservation.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        };
        if let Some(key) = &row.idempotency_key {
            inner.by_key.insert(key.clone(), row.id);
        }
        inner.reservations.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn commit_release(
        &self,
        unit: &InventoryUnit,
        reservation: &Reservation,
    ) -> Result<ReleaseOutcome> {
        let mut inner = self.inner.lock().await;

        let current_status = inner
            .reservations
            .get(&reservation.id)
            .map(|r| r.status.clone())
            .ok_or(Error::NotFound("reservation"))?;
        if current_status == ReservationStatus::Cancelled.as_str() {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        match inner.units.get_mut(&unit.id) {
            None => return Err(Error::NotFound("inventory unit")),
            Some(stored) => {
                if stored.version != unit.version {
                    return Ok(ReleaseOutcome::VersionConflict);
                }
                stored.capacity_remaining += reservation.quantity;
                stored.version += 1;
                stored.updated_at = Utc::now();
            }
        }

        let row = inner
            .reservations
            .get_mut(&reservation.id)
            .ok_or(Error::NotFound("reservation"))?;
        row.status = ReservationStatus::Cancelled.as_str().to_string();
        row.updated_at = Utc::now();
        Ok(ReleaseOutcome::Released(row.clone()))
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        let mut inner = self.inner.lock().await;
        match inner.reservations.get_mut(&id) {
            Some(row) if row.status == from.as_str() => {
                row.status = to.as_str().to_string();
                row.updated_at = Utc::now();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .reservations
            .values()
            .filter(|r| r.is_pending() && r.created_at < cutoff)
            .cloned()
            .collect())
    }
}
