//! Pool configuration options

use std::time::Duration;

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<u32>::new()
///     .with_name("connections")
///     .with_validation(|id| *id != 0)
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.name, "connections");
/// assert!(config.validation_function.is_some());
/// assert_eq!(config.operation_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration<R> {
    /// Name used in log events and as the `pool` metrics label
    pub name: String,

    /// Resources failing this check are refused by `add`
    pub validation_function: Option<fn(&R) -> bool>,

    /// Whether to validate resources again when they are released
    pub validate_on_release: bool,

    /// Bound used by `acquire_default` and `acquire_async_default`
    pub operation_timeout: Option<Duration>,
}

impl<R> Default for PoolConfiguration<R> {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            validation_function: None,
            validate_on_release: false,
            operation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl<R> PoolConfiguration<R> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Install a validator checked when resources are added
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<i32>::new()
    ///     .with_validation(|x| *x > 0);
    ///
    /// let validate = config.validation_function.unwrap();
    /// assert!(validate(&1));
    /// assert!(!validate(&-1));
    /// assert!(!config.validate_on_release);
    /// ```
    pub fn with_validation(mut self, func: fn(&R) -> bool) -> Self {
        self.validation_function = Some(func);
        self
    }

    /// Also run the validator on release; failing resources are dropped from the pool
    pub fn with_validate_on_release(mut self) -> Self {
        self.validate_on_release = true;
        self
    }

    /// Set the default acquire timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Make `acquire_default` wait without bound
    pub fn without_timeout(mut self) -> Self {
        self.operation_timeout = None;
        self
    }

    pub(crate) fn is_valid(&self, resource: &R) -> bool {
        self.validation_function.is_none_or(|validate| validate(resource))
    }
}
