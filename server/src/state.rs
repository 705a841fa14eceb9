use crate::auth::JwtKeys;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection};
use inventory::{ReservationEngine, ReservationStore};
use payments::PaymentFlow;
use std::sync::Arc;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub inventory: Arc<dyn ReservationStore>,
    pub engine: Arc<ReservationEngine>,
    pub payments: Arc<PaymentFlow>,
    pub jwt: Arc<JwtKeys>,
}
