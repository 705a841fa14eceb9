use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: i32, available: i32 },

    #[error("reservation already released")]
    AlreadyReleased,

    #[error("payment already finalized")]
    AlreadyFinalized,

    #[error("concurrent update contention, retries exhausted")]
    Contention,

    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("payment provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("payment provider timed out")]
    ProviderTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<DieselError> for Error {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Error::NotFound("record"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            | DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Error::Conflict(info.message().to_string())
            }
            other => Error::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Passenger,
    Seller,
    Buyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Passenger => "passenger",
            Role::Seller => "seller",
            Role::Buyer => "buyer",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "driver" => Some(Role::Driver),
            "passenger" => Some(Role::Passenger),
            "seller" => Some(Role::Seller),
            "buyer" => Some(Role::Buyer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<ReservationStatus> {
        match s {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome reported by the provider callback or a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Completed,
    Failed,
}

impl PaymentOutcome {
    pub fn final_status(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Completed => PaymentStatus::Completed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}
