//! Unified error handling for the VTU backend.
//!
//! Module-level errors (`DatabaseError`, `PaymentError`, `VendError`) convert
//! into one `AppError` taxonomy with HTTP status mapping, structured error
//! codes and user-facing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::error::DatabaseError;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "INSUFFICIENT_BALANCE")]
    InsufficientBalance,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "DUPLICATE_TRANSACTION")]
    DuplicateTransaction,
    #[serde(rename = "SERVICE_DISABLED")]
    ServiceDisabled,
    #[serde(rename = "MAINTENANCE_MODE")]
    MaintenanceMode,
    #[serde(rename = "AMOUNT_OUT_OF_RANGE")]
    AmountOutOfRange,
    #[serde(rename = "TRANSACTION_NOT_REFUNDABLE")]
    TransactionNotRefundable,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "VENDING_PROVIDER_ERROR")]
    VendingProviderError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Wallet balance does not cover the purchase
    InsufficientBalance { available: String, required: String },
    /// Transaction with the given reference doesn't exist
    TransactionNotFound { tx_ref: String },
    /// User doesn't exist in the system
    UserNotFound { user_id: String },
    /// Duplicate transaction reference
    DuplicateTransaction { tx_ref: String },
    /// Transaction type is switched off in app settings
    ServiceDisabled { service: String },
    /// Platform-wide maintenance toggle is on
    MaintenanceMode,
    /// Amount falls outside the configured purchase limits
    AmountOutOfRange {
        amount: String,
        min: String,
        max: String,
    },
    /// Refund requested for a transaction that isn't a failed vend
    TransactionNotRefundable { tx_ref: String, reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (payment processor, vending resellers)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Funding processor (Paystack) error
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Vending reseller (smeplug, vtpass) error
    VendingProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// Required field missing
    MissingField { field: String },
    /// Field value failed validation
    InvalidField { field: String, reason: String },
    /// Webhook signature missing or failed verification
    InvalidSignature,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => 422,
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::UserNotFound { .. } => 404,
                DomainError::DuplicateTransaction { .. } => 409,
                DomainError::ServiceDisabled { .. } => 422,
                DomainError::MaintenanceMode => 503,
                DomainError::AmountOutOfRange { .. } => 422,
                DomainError::TransactionNotRefundable { .. } => 409,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502,
                ExternalError::VendingProvider { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidSignature => 401,
                _ => 400,
            },
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::DuplicateTransaction { .. } => ErrorCode::DuplicateTransaction,
                DomainError::ServiceDisabled { .. } => ErrorCode::ServiceDisabled,
                DomainError::MaintenanceMode => ErrorCode::MaintenanceMode,
                DomainError::AmountOutOfRange { .. } => ErrorCode::AmountOutOfRange,
                DomainError::TransactionNotRefundable { .. } => {
                    ErrorCode::TransactionNotRefundable
                }
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::VendingProvider { .. } => ErrorCode::VendingProviderError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidSignature => ErrorCode::InvalidSignature,
                _ => ErrorCode::ValidationError,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::InsufficientBalance {
                    available,
                    required,
                } => {
                    format!(
                        "Insufficient wallet balance. Available: {}, Required: {}",
                        available, required
                    )
                }
                DomainError::TransactionNotFound { tx_ref } => {
                    format!("Transaction '{}' not found", tx_ref)
                }
                DomainError::UserNotFound { user_id } => {
                    format!("User '{}' not found", user_id)
                }
                DomainError::DuplicateTransaction { tx_ref } => {
                    format!("Transaction '{}' already exists", tx_ref)
                }
                DomainError::ServiceDisabled { service } => {
                    format!("{} purchases are currently disabled", service)
                }
                DomainError::MaintenanceMode => {
                    "Platform is under maintenance. Please try again later".to_string()
                }
                DomainError::AmountOutOfRange { amount, min, max } => {
                    format!(
                        "Amount {} is outside the allowed range ({} - {})",
                        amount, min, max
                    )
                }
                DomainError::TransactionNotRefundable { tx_ref, reason } => {
                    format!("Transaction '{}' cannot be refunded: {}", tx_ref, reason)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::VendingProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Vending provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Purchase could not be delivered. Please contact support".to_string()
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::InvalidSignature => "Invalid webhook signature".to_string(),
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::VendingProvider { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let kind = match &err {
            DatabaseError::NotFound { entity } => match entity.as_str() {
                "user" => AppErrorKind::Domain(DomainError::UserNotFound {
                    user_id: "unknown".to_string(),
                }),
                "transaction" => AppErrorKind::Domain(DomainError::TransactionNotFound {
                    tx_ref: "unknown".to_string(),
                }),
                _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: err.to_string(),
                    is_retryable: false,
                }),
            },
            DatabaseError::UniqueViolation { constraint } => {
                AppErrorKind::Domain(DomainError::DuplicateTransaction {
                    tx_ref: constraint.clone(),
                })
            }
            _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };

        AppError::new(kind)
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::InsufficientBalance {
            available: "50".to_string(),
            required: "100".to_string(),
        }));

        assert_eq!(error.status_code(), 422);
        assert_eq!(error.error_code(), ErrorCode::InsufficientBalance);
        assert!(error.user_message().contains("Insufficient wallet balance"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_maintenance_mode_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::MaintenanceMode));

        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), ErrorCode::MaintenanceMode);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_rate_limit_error() {
        let error = AppError::new(AppErrorKind::External(ExternalError::RateLimit {
            service: "smeplug".to_string(),
            retry_after: Some(60),
        }));

        assert_eq!(error.status_code(), 429);
        assert_eq!(error.error_code(), ErrorCode::RateLimitError);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_invalid_signature_maps_to_401() {
        let error = AppError::new(AppErrorKind::Validation(ValidationError::InvalidSignature));

        assert_eq!(error.status_code(), 401);
        assert_eq!(error.error_code(), ErrorCode::InvalidSignature);
    }

    #[test]
    fn test_unique_violation_becomes_duplicate() {
        let db_err = DatabaseError::UniqueViolation {
            constraint: "transactions_tx_ref_key".to_string(),
        };
        let error = AppError::from(db_err);

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::DuplicateTransaction);
    }
}
