pub mod engine;
pub mod memory;
pub mod models;
pub mod pg;
pub mod reaper;
pub mod schema;
pub mod store;

pub use engine::ReservationEngine;
pub use memory::MemoryReservationStore;
pub use models::{InventoryUnit, NewReservation, Reservation};
pub use pg::PgReservationStore;
pub use reaper::ReservationReaper;
pub use store::{ReleaseOutcome, ReservationStore};
