use crate::models::{InventoryUnit, NewReservation, Reservation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ReservationStatus, Result};
use uuid::Uuid;

#[derive(Debug)]
pub enum ReleaseOutcome {
    Released(Reservation),
    AlreadyReleased,
    VersionConflict,
}

/// Storage seam for the reservation engine. All capacity mutation goes
/// through `commit_reserve` / `commit_release`; both are guarded by the
/// version carried in the unit snapshot the caller read.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create_unit(&self, capacity: i32) -> Result<InventoryUnit>;

    async fn inventory_unit(&self, id: Uuid) -> Result<Option<InventoryUnit>>;

    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>>;

    async fn reservation_by_key(&self, key: &str) -> Result<Option<Reservation>>;

    /// Decrement the unit and insert the reservation as one all-or-nothing
    /// commit. Returns `None` when the unit's version moved underneath the
    /// snapshot.
    async fn commit_reserve(
        &self,
        unit: &InventoryUnit,
        reservation: &NewReservation,
    ) -> Result<Option<Reservation>>;

    /// Flip the reservation to cancelled and restore the unit's capacity as
    /// one all-or-nothing commit.
    async fn commit_release(
        &self,
        unit: &InventoryUnit,
        reservation: &Reservation,
    ) -> Result<ReleaseOutcome>;

    /// Move a reservation from one status to another. Returns `None` when the
    /// reservation is no longer in `from`.
    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Option<Reservation>>;

    async fn pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>>;
}
