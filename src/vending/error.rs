use thiserror::Error;

pub type VendResult<T> = Result<T, VendError>;

#[derive(Debug, Clone, Error)]
pub enum VendError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitError {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Service {service} is not supported by {provider}")]
    UnsupportedService { service: String, provider: String },

    #[error("Reseller wallet exhausted: {message}")]
    ResellerBalanceError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl VendError {
    /// Retryable here means "the vend outcome is unknown or transient"; the
    /// settlement engine keeps the transaction pending for requery instead of
    /// failing it outright.
    pub fn is_retryable(&self) -> bool {
        match self {
            VendError::ValidationError { .. } => false,
            VendError::NetworkError { .. } => true,
            VendError::RateLimitError { .. } => true,
            VendError::UnsupportedService { .. } => false,
            VendError::ResellerBalanceError { .. } => false,
            VendError::ProviderError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            VendError::ValidationError { .. } => 400,
            VendError::NetworkError { .. } => 503,
            VendError::RateLimitError { .. } => 429,
            VendError::UnsupportedService { .. } => 422,
            VendError::ResellerBalanceError { .. } => 502,
            VendError::ProviderError { .. } => 502,
        }
    }
}

impl From<VendError> for crate::error::AppError {
    fn from(err: VendError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        AppError::new(AppErrorKind::External(ExternalError::VendingProvider {
            provider: "vending".to_string(),
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(VendError::NetworkError {
            message: "timeout".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn reseller_balance_errors_are_terminal() {
        let err = VendError::ResellerBalanceError {
            message: "insufficient wallet".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.http_status_code(), 502);
    }
}
