//! Mock identify indicator.

use crate::{Result, traits::IdentifyIndicator, types::DeviceInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Indicator that counts identification routines instead of blinking.
#[derive(Debug)]
pub struct MockIndicator {
    blinks: Arc<AtomicUsize>,
    name: String,
}

impl MockIndicator {
    pub fn new() -> (Self, MockIndicatorHandle) {
        let blinks = Arc::new(AtomicUsize::new(0));
        let indicator = Self {
            blinks: blinks.clone(),
            name: "Mock Indicator".to_string(),
        };
        (indicator, MockIndicatorHandle { blinks })
    }
}

impl Default for MockIndicator {
    fn default() -> Self {
        Self::new().0
    }
}

impl IdentifyIndicator for MockIndicator {
    async fn identify(&mut self) -> Result<()> {
        let count = self.blinks.fetch_add(1, Ordering::SeqCst) + 1;
        info!(count, "Mock indicator blinking");
        Ok(())
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Mock Indicator v1.0"))
    }
}

#[derive(Debug, Clone)]
pub struct MockIndicatorHandle {
    blinks: Arc<AtomicUsize>,
}

impl MockIndicatorHandle {
    /// Number of identification routines run so far.
    pub fn blink_count(&self) -> usize {
        self.blinks.load(Ordering::SeqCst)
    }
}
