//! The host capability table and module entry points.
//!
//! [`HostVTable`] is the fixed function-pointer table the host hands to a
//! module's `plugin_init`. It is created once by the host; the reference a
//! module receives stays valid until that module's `plugin_shutdown`
//! returns. Field order, signatures, and calling convention are part of the
//! versioned ABI and must not change within a version.

use super::descriptor::RawPluginDescriptor;
use std::ffi::c_char;

/// Callback invoked for event deliveries and timer firings.
///
/// Arguments are the event name and an opaque payload, both null-terminated
/// and owned by the caller for the duration of the call. Callback identity
/// (the function address) is what `unregister_event` matches on.
pub type RawEventCallback = extern "C" fn(name: *const c_char, payload: *const c_char);

/// Operations the host exposes to a loaded module.
///
/// Every boundary-crossing value is a primitive or a pointer with documented
/// ownership; no allocation crosses implicitly. String results from
/// `get_data` are host-owned and valid only until the next call that writes
/// or deletes that key.
#[repr(C)]
pub struct HostVTable {
    /// Dispatch an event synchronously to all current subscribers.
    pub send_event: extern "C" fn(name: *const c_char, payload: *const c_char),
    /// Subscribe a callback to an event name (idempotent per pair).
    pub register_event: extern "C" fn(name: *const c_char, callback: RawEventCallback),
    /// Remove a callback from every event it is subscribed to.
    pub unregister_event: extern "C" fn(callback: RawEventCallback),

    /// Load and initialize another module by name.
    pub load_plugin: extern "C" fn(name: *const c_char) -> bool,
    /// Shut down and unload a module by name.
    pub unload_plugin: extern "C" fn(name: *const c_char) -> bool,

    /// Emit a log record through the host's logging stack.
    pub log: extern "C" fn(level: *const c_char, message: *const c_char),

    /// Store a value under a key (flat namespace, last write wins).
    pub set_data: extern "C" fn(key: *const c_char, value: *const c_char) -> bool,
    /// Fetch a value; null when the key is absent.
    pub get_data: extern "C" fn(key: *const c_char) -> *const c_char,
    /// Whether a key is present.
    pub has_data: extern "C" fn(key: *const c_char) -> bool,
    /// Remove a key; false when it was absent.
    pub delete_data: extern "C" fn(key: *const c_char) -> bool,

    /// Schedule a callback after `interval_ms`; 0 on failure.
    pub set_timer: extern "C" fn(interval_ms: u32, callback: RawEventCallback, repeat: bool) -> u64,
    /// Cancel a timer by handle; false for unknown or spent handles.
    pub cancel_timer: extern "C" fn(handle: u64) -> bool,
}

/// Symbol name of the metadata entry point.
pub const PLUGIN_GET_INFO_SYMBOL: &[u8] = b"plugin_get_info\0";
/// Symbol name of the init entry point.
pub const PLUGIN_INIT_SYMBOL: &[u8] = b"plugin_init\0";
/// Symbol name of the shutdown entry point.
pub const PLUGIN_SHUTDOWN_SYMBOL: &[u8] = b"plugin_shutdown\0";

/// `plugin_get_info`: returns a stable pointer to static metadata; must
/// not allocate per call.
pub type PluginGetInfoFn = unsafe extern "C" fn() -> *const RawPluginDescriptor;

/// `plugin_init`: receives the capability table, returns true on success.
pub type PluginInitFn = unsafe extern "C" fn(host: *const HostVTable) -> bool;

/// `plugin_shutdown`: releases whatever init acquired.
pub type PluginShutdownFn = unsafe extern "C" fn();

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_vtable_is_twelve_pointers() {
        // The table is exactly the twelve documented entries, no gaps.
        assert_eq!(size_of::<HostVTable>(), 12 * size_of::<usize>());
    }
}
