use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::ReservationStatus;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::inventory_units)]
pub struct InventoryUnit {
    pub id: Uuid,
    pub capacity_total: i32,
    pub capacity_remaining: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::inventory_units)]
pub struct NewInventoryUnit {
    pub id: Uuid,
    pub capacity_total: i32,
    pub capacity_remaining: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: Uuid,
    pub inventory_unit_id: Uuid,
    pub requester_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending.as_str()
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed.as_str()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub id: Uuid,
    pub inventory_unit_id: Uuid,
    pub requester_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub idempotency_key: Option<String>,
}
