//! Progress notification.
//!
//! The scheduler reports lifecycle milestones to an optional [`Notifier`].
//! Delivery is best effort: a failing notifier is logged and ignored, it
//! never affects the run.

use crate::models::{EventStatus, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// Failure to deliver a progress event.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("progress receiver disconnected")]
    Disconnected,

    #[error("failed to write progress event: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode progress event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Observer of run milestones.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &ProgressEvent) -> Result<(), NotifyError>;
}

/// Deliver an event if a notifier is attached, logging any failure.
pub(crate) fn dispatch(notifier: Option<&dyn Notifier>, status: EventStatus, message: impl Into<String>) {
    let Some(notifier) = notifier else {
        return;
    };
    let event = ProgressEvent::now(status, message);
    if let Err(e) = notifier.notify(&event) {
        warn!("Progress notifier failed: {}", e);
    }
}

/// Forwards events into a tokio channel, e.g. for a streaming response.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// A notifier together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event.clone())
            .map_err(|_| NotifyError::Disconnected)
    }
}

/// Writes each event as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesNotifier<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> Notifier for JsonLinesNotifier<W> {
    fn notify(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        let line = serde_json::to_string(event)?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// Terminal progress bar advancing once per finished agent.
pub struct ProgressBarNotifier {
    bar: ProgressBar,
}

impl ProgressBarNotifier {
    pub fn new(total_agents: usize) -> Self {
        let bar = ProgressBar::new(total_agents as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl Notifier for ProgressBarNotifier {
    fn notify(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        match event.status {
            EventStatus::Started | EventStatus::Running => {
                self.bar.set_message(event.message.clone());
            }
            EventStatus::Progress => {
                self.bar.inc(1);
                self.bar.set_message(event.message.clone());
            }
            EventStatus::Completed => {
                self.bar.finish_and_clear();
            }
        }
        Ok(())
    }
}

impl Drop for ProgressBarNotifier {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_forwards_events() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        tokio_test::assert_ok!(notifier.notify(&ProgressEvent::now(EventStatus::Started, "go")));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.status, EventStatus::Started);
        assert_eq!(event.message, "go");
    }

    #[test]
    fn test_channel_notifier_reports_disconnect() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        let err = notifier
            .notify(&ProgressEvent::now(EventStatus::Running, "x"))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Disconnected));
    }

    #[test]
    fn test_json_lines_notifier() {
        let notifier = JsonLinesNotifier::new(Vec::new());
        notifier
            .notify(&ProgressEvent::now(EventStatus::Running, "Running error_detector"))
            .unwrap();
        notifier
            .notify(&ProgressEvent::now(EventStatus::Completed, "Analysis complete"))
            .unwrap();

        let text = String::from_utf8(notifier.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "running");
        assert_eq!(lines[1]["message"], "Analysis complete");
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn test_dispatch_swallows_failures() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        dispatch(Some(&notifier), EventStatus::Progress, "ignored");
        dispatch(None, EventStatus::Progress, "no observer");
    }

    #[test]
    fn test_progress_bar_notifier_lifecycle() {
        let notifier = ProgressBarNotifier::new(2);
        for status in [
            EventStatus::Started,
            EventStatus::Running,
            EventStatus::Progress,
            EventStatus::Progress,
            EventStatus::Completed,
        ] {
            notifier
                .notify(&ProgressEvent::now(status, "step"))
                .unwrap();
        }
        assert!(notifier.bar.is_finished());
        assert_eq!(notifier.bar.position(), 2);
    }
}
