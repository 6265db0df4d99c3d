//! Data manager configuration.

use std::time::Duration;

use crate::core::{
    APP_ID_MASK, DEFAULT_APP_ID, DEFAULT_BLOCK_ACK_BATCH_SIZE, DEFAULT_MAX_PHYSICAL_LINKS,
    DataManagerError, EventMask, MIN_EARLY_LOSS_DURATION, Result,
};

/// Data manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataManagerConfig {
    /// Application id placed in every request identifier (4 bits).
    pub app_id: u8,

    /// Completions accumulated before credits are restored.
    pub block_ack_batch_size: u16,

    /// Number of physical links that can be supervised at once.
    pub max_physical_links: usize,

    /// Shortest early loss window before the supervision chain arms its
    /// final timer.
    pub min_early_loss: Duration,

    /// Upward events enabled at startup.
    pub event_mask: EventMask,
}

impl Default for DataManagerConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID,
            block_ack_batch_size: DEFAULT_BLOCK_ACK_BATCH_SIZE,
            max_physical_links: DEFAULT_MAX_PHYSICAL_LINKS,
            min_early_loss: MIN_EARLY_LOSS_DURATION,
            event_mask: EventMask::default(),
        }
    }
}

impl DataManagerConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> DataManagerConfigBuilder {
        DataManagerConfigBuilder::new()
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        if u32::from(self.app_id) > APP_ID_MASK {
            return Err(DataManagerError::InvalidParameter(format!(
                "app id {:#x} does not fit in 4 bits",
                self.app_id
            )));
        }
        if self.block_ack_batch_size == 0 {
            return Err(DataManagerError::InvalidParameter(
                "block ack batch size must be at least 1".into(),
            ));
        }
        if self.max_physical_links == 0 {
            return Err(DataManagerError::InvalidParameter(
                "at least one physical link slot is required".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`DataManagerConfig`].
#[derive(Debug)]
pub struct DataManagerConfigBuilder {
    config: DataManagerConfig,
}

impl DataManagerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: DataManagerConfig::default(),
        }
    }

    /// Set the application id.
    pub fn app_id(mut self, app_id: u8) -> Self {
        self.config.app_id = app_id;
        self
    }

    /// Set the completion batch size.
    pub fn block_ack_batch_size(mut self, size: u16) -> Self {
        self.config.block_ack_batch_size = size;
        self
    }

    /// Set the number of supervision slots.
    pub fn max_physical_links(mut self, max: usize) -> Self {
        self.config.max_physical_links = max;
        self
    }

    /// Set the minimum early loss window.
    pub fn min_early_loss(mut self, min: Duration) -> Self {
        self.config.min_early_loss = min;
        self
    }

    /// Set the initial event mask.
    pub fn event_mask(mut self, mask: EventMask) -> Self {
        self.config.event_mask = mask;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<DataManagerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for DataManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
