//! Where inbound payloads go once the read loop has accepted them.

use tracing::debug;

use crate::connection::Subject;

/// Receives every normalized inbound payload, in arrival order.
///
/// Called from the read loop, so implementations must not block.
pub trait InboundHandler: Send + Sync + 'static {
    fn on_message(&self, subject: &Subject, message: &str);
}

/// Logs inbound payloads and otherwise discards them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInbound;

impl InboundHandler for LogInbound {
    fn on_message(&self, subject: &Subject, message: &str) {
        debug!(subject = %subject, "📨 {}", message);
    }
}

/// Folds newlines into spaces and trims surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_folds_newlines() {
        assert_eq!(normalize("hello\n"), "hello");
        assert_eq!(normalize("  a\nb\r\n"), "a b");
        assert_eq!(normalize("\n\n"), "");
        assert_eq!(normalize("plain"), "plain");
    }
}
