use crate::models::{NewPayment, Payment};
use crate::schema::payments;
use crate::store::PaymentStore;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::{Error, PaymentStatus, Result};

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgPaymentStore {
    pool: DbPool,
}

impl PgPaymentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, payment: &NewPayment) -> Result<Payment> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let row = diesel::insert_into(payments::table)
            .values(payment)
            .get_result::<Payment>(&mut conn)
            .await?;
        Ok(row)
    }

    async fn by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let row = payments::table
            .filter(payments::transaction_id.eq(transaction_id))
            .first::<Payment>(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn finalize(&self, transaction_id: &str, to: PaymentStatus) -> Result<Option<Payment>> {
        let mut conn = self.pool.get().await.map_err(Error::internal)?;
        let row = diesel::update(
            payments::table
                .filter(payments::transaction_id.eq(transaction_id))
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .set((
            payments::status.eq(to.as_str()),
            payments::updated_at.eq(Utc::now()),
        ))
        .get_result::<Payment>(&mut conn)
        .await
        .optional()?;
        Ok(row)
    }
}
