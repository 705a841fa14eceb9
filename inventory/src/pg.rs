use crate::models::{InventoryUnit, NewInventoryUnit, NewReservation, Reservation};
use crate::schema::{inventory_units, reservations};
use crate::store::{ReleaseOutcome, ReservationStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{Error, ReservationStatus, Result};
use uuid::Uuid;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgReservationStore {
    pool: DbPool,
}

impl PgReservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn create_unit(&self, capacity: i32) -> Result<InventoryUnit> {
        if capacity < 0 {
            return Err(Error::InvalidQuantity(capacity));
        }
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let unit = diesel::insert_into(inventory_units::table)
            .values(&NewInventoryUnit {
                id: Uuid::new_v4(),
                capacity_total: capacity,
                capacity_remaining: capacity,
            })
            .get_result::<InventoryUnit>(&mut conn)
            .await?;
        Ok(unit)
    }

    async fn inventory_unit(&self, id: Uuid) -> Result<Option<InventoryUnit>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let unit = inventory_units::table
            .filter(inventory_units::id.eq(id))
            .first::<InventoryUnit>(&mut conn)
            .await
            .optional()?;
        Ok(unit)
    }

    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let reservation = reservations::table
            .filter(reservations::id.eq(id))
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(reservation)
    }

    async fn reservation_by_key(&self, key: &str) -> Result<Option<Reservation>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let reservation = reservations::table
            .filter(reservations::idempotency_key.eq(key))
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(reservation)
    }

    async fn commit_reserve(
        &self,
        unit: &InventoryUnit,
        reservation: &NewReservation,
    ) -> Result<Option<Reservation>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let unit_id = unit.id;
        let expected_version = unit.version;
        let quantity = reservation.quantity;
        let reservation = reservation.clone();

        let created = conn
            .transaction::<_, DieselError, _>(|conn| {
                Box::pin(async move {
                    let updated = diesel::update(
                        inventory_units::table
                            .filter(inventory_units::id.eq(unit_id))
                            .filter(inventory_units::version.eq(expected_version)),
                    )
                    .set((
                        inventory_units::capacity_remaining
                            .eq(inventory_units::capacity_remaining - quantity),
                        inventory_units::version.eq(inventory_units::version + 1),
                        inventory_units::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;

                    if updated == 0 {
                        return Ok(None);
                    }

                    let row = diesel::insert_into(reservations::table)
                        .values(&reservation)
                        .get_result::<Reservation>(conn)
                        .await?;
                    Ok(Some(row))
                })
            })
            .await?;
        Ok(created)
    }

    async fn commit_release(
        &self,
        unit: &InventoryUnit,
        reservation: &Reservation,
    ) -> Result<ReleaseOutcome> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let unit_id = unit.id;
        let expected_version = unit.version;
        let reservation_id = reservation.id;
        let quantity = reservation.quantity;

        let outcome = conn
            .transaction::<_, DieselError, _>(|conn| {
                Box::pin(async move {
                    let released = diesel::update(
                        reservations::table
                            .filter(reservations::id.eq(reservation_id))
                            .filter(
                                reservations::status
                                    .ne(ReservationStatus::Cancelled.as_str()),
                            ),
                    )
                    .set((
                        reservations::status.eq(ReservationStatus::Cancelled.as_str()),
                        reservations::updated_at.eq(Utc::now()),
                    ))
                    .get_result::<Reservation>(conn)
                    .await
                    .optional()?;

                    let Some(released) = released else {
                        return Ok(ReleaseOutcome::AlreadyReleased);
                    };

                    let updated = diesel::update(
                        inventory_units::table
                            .filter(inventory_units::id.eq(unit_id))
                            .filter(inventory_units::version.eq(expected_version)),
                    )
                    .set((
                        inventory_units::capacity_remaining
                            .eq(inventory_units::capacity_remaining + quantity),
                        inventory_units::version.eq(inventory_units::version + 1),
                        inventory_units::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;

                    if updated == 0 {
                        // the status flip above must not survive a stale snapshot
                        return Err(DieselError::RollbackTransaction);
                    }
                    Ok(ReleaseOutcome::Released(released))
                })
            })
            .await;

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(DieselError::RollbackTransaction) => Ok(ReleaseOutcome::VersionConflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let row = diesel::update(
            reservations::table
                .filter(reservations::id.eq(id))
                .filter(reservations::status.eq(from.as_str())),
        )
        .set((
            reservations::status.eq(to.as_str()),
            reservations::updated_at.eq(Utc::now()),
        ))
        .get_result::<Reservation>(&mut conn)
        .await
        .optional()?;
        Ok(row)
    }

    async fn pending_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let rows = reservations::table
            .filter(reservations::status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservations::created_at.lt(cutoff))
            .order(reservations::created_at.asc())
            .limit(100)
            .load::<Reservation>(&mut conn)
            .await?;
        Ok(rows)
    }
}
