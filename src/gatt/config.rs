use bon::Builder;

use super::directory::DeviceFilter;
use super::dispatch::RetryPolicy;
use super::messages::ErrorMessages;

/// Settings for one Connection.
///
/// ```
/// use std::time::Duration;
///
/// use blesched::{DeviceFilter, RetryPolicy, SchedulerConfig};
///
/// let config = SchedulerConfig::builder()
///     .retry(RetryPolicy::new(Duration::from_millis(2), Duration::from_millis(500)))
///     .device_filter(DeviceFilter::name_contains("HRM"))
///     .rescan_on_link_loss(false)
///     .build();
///
/// assert_eq!(Duration::from_millis(500), config.retry().ceiling());
/// assert!(!config.rescan_on_link_loss());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SchedulerConfig {
    #[builder(default)]
    retry: RetryPolicy,
    device_filter: Option<DeviceFilter>,
    /// Resume scanning after an unrequested disconnect.
    #[builder(default = true)]
    rescan_on_link_loss: bool,
    #[builder(default)]
    messages: ErrorMessages,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    #[must_use]
    pub fn device_filter(&self) -> Option<&DeviceFilter> {
        self.device_filter.as_ref()
    }

    #[must_use]
    pub fn rescan_on_link_loss(&self) -> bool {
        self.rescan_on_link_loss
    }

    #[must_use]
    pub fn messages(&self) -> &ErrorMessages {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_rescan_with_default_backoff() {
        let config = SchedulerConfig::default();

        assert!(config.rescan_on_link_loss());
        assert_eq!(RetryPolicy::default(), config.retry());
        assert!(config.device_filter().is_none());
    }
}
