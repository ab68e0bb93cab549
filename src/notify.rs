//! Toast notifications shown to the user after a commit.

use std::sync::Mutex;

use serde::Serialize;

pub const LEAD_UPDATED: &str = "Lead updated successfully!";
pub const LEAD_UPDATE_FAILED: &str = "Failed to update lead";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Prints toasts to stdout, green for success and red for errors.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Success => {
                println!("{} {}", console::style("✓").green().bold(), console::style(&toast.message).green())
            }
            ToastLevel::Error => {
                println!("{} {}", console::style("✗").red().bold(), console::style(&toast.message).red())
            }
        }
    }
}

/// Keeps toasts in memory for headless callers.
#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Toast> {
        self.toasts.lock().ok().and_then(|t| t.last().cloned())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_keeps_order() {
        let n = RecordingNotifier::new();
        assert!(n.last().is_none());
        n.notify(Toast::success(LEAD_UPDATED));
        n.notify(Toast::error(LEAD_UPDATE_FAILED));
        let toasts = n.toasts();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].level, ToastLevel::Success);
        assert_eq!(n.last().unwrap().message, LEAD_UPDATE_FAILED);
    }

    #[test]
    fn test_toast_serializes_level_in_snake_case() {
        let json = serde_json::to_value(Toast::error("nope")).unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["message"], "nope");
    }
}
