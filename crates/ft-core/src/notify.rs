//! User-facing notifications.

use crate::api::ActiveEntry;

pub const TITLE: &str = "Flip Tracker";
pub const TITLE_NOTICE: &str = "Flip Tracker notice";
pub const TITLE_ERROR: &str = "Flip Tracker error";

/// Sink for short human-readable status messages.
///
/// Fire-and-forget: implementations must not block and must swallow their
/// own failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

pub(crate) fn tracking_message(entry: &ActiveEntry) -> String {
    format!("Currently tracking {}", entry.label)
}
