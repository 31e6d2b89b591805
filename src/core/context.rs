//! Shared process context
//!
//! One notification log and one progress channel per process, handed to the
//! monitor, the initiator and the dispatcher explicitly.

use std::sync::Arc;

use crate::channel::ProgressChannel;
use crate::config::RecoveryConfig;
use crate::core::error::Result;
use crate::notification::NotificationLog;

#[derive(Clone, Debug)]
pub struct RecoveryContext {
    config: Arc<RecoveryConfig>,
    log: Arc<NotificationLog>,
    channel: ProgressChannel,
}

impl RecoveryContext {
    /// Build the context, opening the configured named channel
    ///
    /// Failing to open the channel is fatal for the process.
    pub fn new(config: RecoveryConfig) -> Result<Self> {
        let channel = ProgressChannel::open(&config.channel.name, config.channel.capacity)?;
        tracing::info!(
            "Progress channel {} open, capacity {}",
            channel.name(),
            channel.capacity()
        );
        Ok(Self::with_channel(config, channel))
    }

    /// Context over an in-process channel of the configured capacity
    pub fn in_memory(config: RecoveryConfig) -> Self {
        let channel = ProgressChannel::in_memory(config.channel.capacity);
        Self::with_channel(config, channel)
    }

    fn with_channel(config: RecoveryConfig, channel: ProgressChannel) -> Self {
        Self {
            config: Arc::new(config),
            log: Arc::new(NotificationLog::new()),
            channel,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub fn log(&self) -> Arc<NotificationLog> {
        Arc::clone(&self.log)
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ProgressRecord, UpdateStatus};

    #[test]
    fn test_clones_share_log_and_channel() {
        let mut config = RecoveryConfig::default();
        config.channel.capacity = 4;
        let context = RecoveryContext::in_memory(config);
        let other = context.clone();

        other.log().append("hello");
        other.channel().send(&ProgressRecord::new(UpdateStatus::Start));

        assert_eq!(context.log().len(), 1);
        assert_eq!(context.channel().capacity(), 4);
        assert_eq!(
            context.channel().try_receive().and_then(|r| r.status()),
            Some(UpdateStatus::Start)
        );
    }

    #[test]
    fn test_fresh_contexts_are_independent() {
        let first = RecoveryContext::in_memory(RecoveryConfig::default());
        let second = RecoveryContext::in_memory(RecoveryConfig::default());

        first.log().append("only here");
        assert!(second.log().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unopenable_channel_is_fatal() {
        use crate::core::error::{Classify, ErrorClass, RecoveryError};

        let mut config = RecoveryConfig::default();
        config.channel.name = "no-leading-slash".to_string();

        let err = RecoveryContext::new(config).unwrap_err();
        assert!(matches!(err, RecoveryError::Channel(_)));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_named_channel_context() {
        let mut config = RecoveryConfig::default();
        config.channel.name = format!("/recovery-ctx-{}", crate::core::utils::short_unique_id());
        config.channel.capacity = 4;

        let context = match RecoveryContext::new(config.clone()) {
            Ok(context) => context,
            // mqueue may be unavailable in restricted sandboxes
            Err(_) => return,
        };
        context.channel().send(&ProgressRecord::new(UpdateStatus::Run));
        assert!(context.channel().try_receive().is_some());

        drop(context);
        let _ = crate::channel::PosixMessageQueue::unlink(&config.channel.name);
    }
}
