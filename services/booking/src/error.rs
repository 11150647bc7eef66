use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Booking service error variants.
///
/// Token failures share one variant on purpose: the precise cause is logged
/// by the token authority and never reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("booking not found")]
    BookingNotFound,
    #[error("service not found")]
    ServiceNotFound,
    #[error("booking is already cancelled")]
    AlreadyCancelled,
    #[error("past bookings cannot be changed")]
    PastBooking,
    #[error("booking is not in a valid state for this operation")]
    WrongState,
    #[error("invalid date")]
    InvalidDate,
    #[error("date must be in the future")]
    PastDate,
    #[error("missing required data")]
    MissingData,
    #[error("invalid action")]
    InvalidAction,
    #[error("the requested time is no longer available")]
    SlotUnavailable,
    #[error("action token required")]
    MissingToken,
    #[error("invalid, expired or used token")]
    InvalidToken,
    #[error("token does not belong to this booking")]
    TokenMismatch,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing signature")]
    MissingSignature,
    #[error("request timestamp outside the accepted window")]
    StaleRequest,
    #[error("too many requests, try again later")]
    RateLimited,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl BookingServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BookingNotFound => "BOOKING_NOT_FOUND",
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::AlreadyCancelled => "ALREADY_CANCELLED",
            Self::PastBooking => "PAST_BOOKING",
            Self::WrongState => "WRONG_STATE",
            Self::InvalidDate => "INVALID_DATE",
            Self::PastDate => "PAST_DATE",
            Self::MissingData => "MISSING_DATA",
            Self::InvalidAction => "INVALID_ACTION",
            Self::SlotUnavailable => "SLOT_UNAVAILABLE",
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenMismatch => "TOKEN_MISMATCH",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::StaleRequest => "STALE_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
            Self::Provider(_) => "PROVIDER",
            Self::NotConfigured(_) => "NOT_CONFIGURED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BookingNotFound | Self::ServiceNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyCancelled
            | Self::PastBooking
            | Self::WrongState
            | Self::InvalidDate
            | Self::PastDate
            | Self::MissingData
            | Self::InvalidAction => StatusCode::BAD_REQUEST,
            Self::SlotUnavailable => StatusCode::CONFLICT,
            Self::MissingToken
            | Self::InvalidToken
            | Self::TokenMismatch
            | Self::Forbidden
            | Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::MissingSignature | Self::StaleRequest => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::NotConfigured(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Provider(_) => "upstream provider error".to_owned(),
            Self::NotConfigured(_) => "service misconfigured".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for BookingServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // TraceLayer records every request; only server-side failures are logged here.
        match &self {
            Self::Internal(e) => tracing::error!(error = ?e, kind = "INTERNAL", "internal error"),
            Self::Provider(detail) => {
                tracing::error!(detail = %detail, kind = "PROVIDER", "provider error")
            }
            Self::NotConfigured(what) => {
                tracing::error!(what = *what, kind = "NOT_CONFIGURED", "missing configuration")
            }
            _ => {}
        }
        let body = serde_json::json!({
            "success": false,
            "kind": self.kind(),
            "message": self.public_message(),
        });
        (status, axum::Json(body)).into_response()
    }
}
