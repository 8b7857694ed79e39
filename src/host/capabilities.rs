//! Capability traits: the safe, trait-object form of the host call table.
//!
//! The raw ABI exposes one flat function-pointer table; host-side these
//! operations are grouped per concern so each seam can be mocked or narrowed
//! independently. Call shapes mirror the table entries one to one.

use crate::bus::{CallbackId, EventHandler};
use crate::timer::TimerHandle;

/// Event bus operations available to a module.
pub trait EventApi {
    /// Dispatch an event synchronously to all current subscribers.
    fn send_event(&self, event: &str, payload: &str);

    /// Subscribe a handler under a callback identity (idempotent per pair).
    fn register_event(&self, event: &str, id: CallbackId, handler: EventHandler);

    /// Remove a callback identity from every event.
    ///
    /// Returns false for an identity with no subscriptions.
    fn unregister_event(&self, id: CallbackId) -> bool;
}

/// Key/value store operations available to a module.
pub trait DataApi {
    /// Store a value (flat namespace, last write wins).
    fn set_data(&self, key: &str, value: &str) -> bool;

    /// Fetch a value; `None` when absent, never an error.
    fn get_data(&self, key: &str) -> Option<String>;

    /// Whether a key is present.
    fn has_data(&self, key: &str) -> bool;

    /// Remove a key; false when it was absent.
    fn delete_data(&self, key: &str) -> bool;
}

/// Timer operations available to a module.
pub trait TimerApi {
    /// Schedule a callback; [`TimerHandle::INVALID`] on failure.
    fn set_timer(&self, interval_ms: u32, callback: EventHandler, repeat: bool) -> TimerHandle;

    /// Cancel a timer; false for unknown or spent handles.
    fn cancel_timer(&self, handle: TimerHandle) -> bool;
}

/// Logging through the host's logging stack.
pub trait LogApi {
    /// Emit a log record attributed to the calling module.
    fn log(&self, level: LogLevel, message: &str);
}

/// Module management operations available to a module.
pub trait ControlApi {
    /// Load and initialize another module by name.
    fn load_plugin(&self, name: &str) -> bool;

    /// Shut down and unload a module by name.
    fn unload_plugin(&self, name: &str) -> bool;
}

/// The full capability surface a module holds between init and shutdown.
pub trait HostApi:
    EventApi + DataApi + TimerApi + LogApi + ControlApi + Send + Sync
{
}

impl<T> HostApi for T where
    T: EventApi + DataApi + TimerApi + LogApi + ControlApi + Send + Sync
{
}

/// Severity of a module log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Finest-grained diagnostics.
    Trace,
    /// Debug diagnostics.
    Debug,
    /// Informational.
    Info,
    /// Something surprising but recoverable.
    Warn,
    /// An operation failed.
    Error,
}

impl LogLevel {
    /// Parse the level names crossing the ABI (`"INFO"`, `"warn"`, ...).
    ///
    /// Unknown names map to `Info` rather than erroring; a bad level string
    /// is not worth dropping the message over.
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_uppercase().as_str() {
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "WARN" | "WARNING" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Route a module log record into the tracing stack.
pub(crate) fn emit_plugin_log(level: LogLevel, module: &str, message: &str) {
    match level {
        LogLevel::Trace => {
            tracing::trace!(target: "armature::plugin", module = %module, "{message}");
        }
        LogLevel::Debug => {
            tracing::debug!(target: "armature::plugin", module = %module, "{message}");
        }
        LogLevel::Info => {
            tracing::info!(target: "armature::plugin", module = %module, "{message}");
        }
        LogLevel::Warn => {
            tracing::warn!(target: "armature::plugin", module = %module, "{message}");
        }
        LogLevel::Error => {
            tracing::error!(target: "armature::plugin", module = %module, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("whatever"), LogLevel::Info);
    }
}
