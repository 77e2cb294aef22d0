//! Console notification sink.

use std::io::Write;

use ft_core::Notifier;

/// Prints notifications as `title: message` lines on stdout.
///
/// Write errors (e.g. a closed pipe) are logged and otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::debug!(title, message, "notify");
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{title}: {message}").and_then(|()| stdout.flush()) {
            tracing::warn!(error = %err, "failed to print notification");
        }
    }
}
