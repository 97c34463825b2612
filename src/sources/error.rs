//! Lookup source error types

use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors raised by a location lookup source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The service has no record for the address
    #[error("{provider} has no record for {ip}")]
    NotFound { provider: String, ip: Ipv4Addr },

    /// Missing or rejected credentials
    #[error("{provider} refused the request: permission required")]
    PermissionRequired { provider: String },

    /// Request quota exhausted
    #[error("{provider} request limit exceeded")]
    LimitExceeded { provider: String },

    /// Non-success HTTP status not covered above
    #[error("{provider} service error: HTTP {status}")]
    Service { provider: String, status: u16 },

    /// Body could not be decoded or had an unexpected shape
    #[error("{provider} returned an invalid response: {details}")]
    InvalidResponse { provider: String, details: String },

    /// Valid response without latitude/longitude
    #[error("{provider} returned no coordinates for {ip}")]
    MissingCoordinates { provider: String, ip: Ipv4Addr },

    /// Transport failure (DNS, connect, timeout)
    #[error("request to {provider} failed: {details}")]
    Request { provider: String, details: String },

    /// Source cannot run with the current settings
    #[error("{provider} is not configured: {details}")]
    NotConfigured { provider: String, details: String },
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    /// Whether the same request could succeed if retried later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SourceError::LimitExceeded { .. } | SourceError::Service { .. } | SourceError::Request { .. }
        )
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(provider: &str, ip: Ipv4Addr, status: u16) -> Self {
        let provider = provider.to_string();
        match status {
            404 => SourceError::NotFound { provider, ip },
            401 | 403 => SourceError::PermissionRequired { provider },
            429 => SourceError::LimitExceeded { provider },
            _ => SourceError::Service { provider, status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let ip = Ipv4Addr::new(8, 8, 8, 8);
        assert!(matches!(SourceError::from_status("x", ip, 404), SourceError::NotFound { .. }));
        assert!(matches!(SourceError::from_status("x", ip, 403), SourceError::PermissionRequired { .. }));
        assert!(matches!(SourceError::from_status("x", ip, 429), SourceError::LimitExceeded { .. }));
        assert_eq!(
            SourceError::from_status("x", ip, 502),
            SourceError::Service { provider: "x".to_string(), status: 502 }
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(SourceError::LimitExceeded { provider: "x".into() }.is_recoverable());
        assert!(!SourceError::PermissionRequired { provider: "x".into() }.is_recoverable());
    }

    #[test]
    fn test_display() {
        let e = SourceError::MissingCoordinates {
            provider: "HostIP".into(),
            ip: Ipv4Addr::new(1, 2, 3, 4),
        };
        assert_eq!(e.to_string(), "HostIP returned no coordinates for 1.2.3.4");
    }
}
