//! Error types for the resource pool

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool is already open")]
    AlreadyOpen,

    #[error("Pool is not open")]
    NotOpen,

    #[error("Invalid resource: {0}")]
    InvalidArgument(String),

    #[error("Resource is not registered with this pool")]
    NotRegistered,
}

impl PoolError {
    /// Whether this error comes from pool lifecycle misuse rather than from
    /// the resource passed in
    pub fn is_state_error(&self) -> bool {
        matches!(self, PoolError::AlreadyOpen | PoolError::NotOpen)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors() {
        assert!(PoolError::AlreadyOpen.is_state_error());
        assert!(PoolError::NotOpen.is_state_error());
        assert!(!PoolError::NotRegistered.is_state_error());
        assert!(!PoolError::InvalidArgument("x".into()).is_state_error());
        assert_eq!(PoolError::NotOpen.to_string(), "Pool is not open");
    }
}
