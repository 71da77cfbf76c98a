//! System notifications for timer events.

use crate::collaborators::NotificationSink;
use notify_rust::Notification;
use std::thread;

/// Shows desktop notifications through the platform notification service.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    /// Runs in a background thread to avoid blocking the event loop.
    fn show(&self, title: &str, body: &str) {
        let title = title.to_string();
        let body = body.to_string();
        thread::spawn(move || {
            if let Err(e) = Notification::new()
                .summary(&title)
                .body(&body)
                .sound_name("default")
                .show()
            {
                tracing::warn!("failed to show notification: {}", e);
            }
        });
    }
}
