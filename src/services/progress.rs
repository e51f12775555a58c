//! Progress notifications emitted while a sync runs.
//!
//! Sinks are purely informational: they cannot fail and never influence
//! control flow.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub message: String,
    /// 0..=100 when known.
    pub progress: Option<u8>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, progress: Option<u32>) -> Self {
        Self {
            message: message.into(),
            progress: progress.map(|value| value.min(100) as u8),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

pub fn report(sink: &dyn ProgressSink, message: impl Into<String>, progress: u32) {
    sink.notify(ProgressEvent::new(message, Some(progress)));
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn notify(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify(&self, event: ProgressEvent) {
        debug!(progress = ?event.progress, "{}", event.message);
    }
}

/// Forwards events to a streaming response. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn notify(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn progress_is_clamped_to_one_hundred() {
        assert_eq!(ProgressEvent::new("done", Some(250)).progress, Some(100));
        assert_eq!(ProgressEvent::new("unknown", None).progress, None);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelProgress::new(tx);
        report(&sink, "first", 10);
        drop(rx);
        report(&sink, "second", 20);
    }

    #[test]
    fn channel_sink_forwards_events_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelProgress::new(tx);
        report(&sink, "a", 1);
        report(&sink, "b", 2);

        assert_eq!(rx.try_recv().unwrap().message, "a");
        assert_eq!(rx.try_recv().unwrap().progress, Some(2));
    }
}
