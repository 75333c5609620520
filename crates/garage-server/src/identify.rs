//! Identify handler.

use garage_hardware::{AnyIndicator, IdentifyIndicator};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Triggers the accessory's identification routine.
///
/// Called from the Identify characteristic's write path while its lock is
/// held, so implementations must return immediately and never fail.
pub trait IdentifyHandler: Send + Sync {
    fn identify(&self);
}

/// Logs the request and runs the identify routine on an indicator device.
///
/// Requests are handed to a task that owns the indicator; requests arriving
/// while a routine runs are queued.
#[derive(Debug, Clone)]
pub struct IndicatorIdentify {
    requests: mpsc::UnboundedSender<()>,
}

impl IndicatorIdentify {
    /// Must be called from within a Tokio runtime.
    pub fn spawn(indicator: impl Into<AnyIndicator>) -> (Self, JoinHandle<()>) {
        let mut indicator = indicator.into();
        let (requests, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if let Err(err) = indicator.identify().await {
                    warn!(error = %err, "Identify indicator failed");
                }
            }
            debug!("Identify task stopped");
        });

        (Self { requests }, task)
    }
}

impl IdentifyHandler for IndicatorIdentify {
    fn identify(&self) {
        info!("accessory identify");
        if self.requests.send(()).is_err() {
            warn!("Identify indicator task is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garage_hardware::mock::MockIndicator;

    #[tokio::test]
    async fn test_identify_drives_indicator() {
        let (indicator, handle) = MockIndicator::new();
        let (identify, task) = IndicatorIdentify::spawn(indicator);

        identify.identify();
        identify.identify();
        drop(identify);
        task.await.unwrap();

        assert_eq!(handle.blink_count(), 2);
    }
}
