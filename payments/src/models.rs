use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::PaymentStatus;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payments)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub status: String,
    pub transaction_id: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub status: String,
    pub transaction_id: String,
    pub phone: String,
}
