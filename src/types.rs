use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use thiserror::Error;

/// Partial unique index guarding one active reservation per table and slot.
pub const ACTIVE_SLOT_INDEX: &str = "reservations_active_slot";
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No tables available at the requested time")]
    NoCapacity,

    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0}")]
    Ambiguous(String),

    #[error("{0}")]
    InvalidState(String),

    /// The payload is logged, never sent to the client.
    #[error("Internal server error")]
    Internal(String),
}

impl ServiceError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Could not validate credentials".into())
    }

    pub fn api_key_required() -> Self {
        Self::Forbidden("API key required for this operation".into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) | ServiceError::NoCapacity => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) | ServiceError::EmailTaken => StatusCode::BAD_REQUEST,
            ServiceError::Ambiguous(_) | ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ServiceError::Internal(detail) = self {
            tracing::error!(%detail, "request failed");
        }

        let mut builder = HttpResponse::build(self.status_code());
        if let ServiceError::Unauthorized(_) = self {
            builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        builder.json(ErrorBody { detail: self.to_string() })
    }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ServiceError::NotFound("Record not found".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                match info.constraint_name() {
                    Some(ACTIVE_SLOT_INDEX) => ServiceError::NoCapacity,
                    Some(EMAIL_CONSTRAINT) => ServiceError::EmailTaken,
                    _ => ServiceError::Internal(info.message().to_owned()),
                }
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::Internal(format!("Failed to establish connection: {err}"))
    }
}

impl From<actix::MailboxError> for ServiceError {
    fn from(err: actix::MailboxError) -> Self {
        ServiceError::Internal(format!("Database actor unavailable: {err}"))
    }
}

impl From<argon2::password_hash::Error> for ServiceError {
    fn from(err: argon2::password_hash::Error) -> Self {
        ServiceError::Internal(format!("Password hashing failed: {err}"))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Slot times travel as `HH:MM`; `HH:MM:SS` is accepted on input.
pub mod slot_time {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de, Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid time '{raw}', expected HH:MM"))),
                None => Ok(None),
            }
        }
    }
}
