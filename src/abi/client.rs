//! Plugin-side conveniences: a safe wrapper over the capability table and a
//! macro for declaring a module's static descriptor and entry points.

use super::vtable::{HostVTable, RawEventCallback};
use std::ffi::{CStr, CString};

/// Safe plugin-side view of the host capability table.
///
/// A `HostClient` is handed to the init function generated by
/// [`declare_plugin!`](crate::declare_plugin) and should be threaded through
/// the plugin's own code rather than stashed in a mutable global. It is
/// `Copy`, so keeping it in plugin state is cheap.
///
/// The underlying table stays valid until the plugin's shutdown entry point
/// returns; a client must not be used after that.
///
/// Keys, values, and event names containing interior NUL bytes cannot cross
/// the boundary; calls carrying them fail with the operation's failure
/// sentinel (or are dropped, for void operations).
#[derive(Clone, Copy)]
pub struct HostClient {
    table: &'static HostVTable,
}

impl HostClient {
    /// Wrap a raw capability table pointer.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// A non-null `table` must point to a host capability table that remains
    /// valid until the plugin's shutdown entry point returns.
    pub unsafe fn from_raw(table: *const HostVTable) -> Option<Self> {
        if table.is_null() {
            return None;
        }
        // SAFETY: Caller guarantees the table outlives the plugin, which is
        // the only scope a HostClient is reachable from.
        Some(Self {
            table: unsafe { &*table },
        })
    }

    /// Dispatch an event to all current subscribers.
    pub fn send(&self, event: &str, payload: &str) {
        let (Ok(event), Ok(payload)) = (CString::new(event), CString::new(payload)) else {
            return;
        };
        (self.table.send_event)(event.as_ptr(), payload.as_ptr());
    }

    /// Subscribe a callback to an event name.
    pub fn on(&self, event: &str, callback: RawEventCallback) {
        let Ok(event) = CString::new(event) else {
            return;
        };
        (self.table.register_event)(event.as_ptr(), callback);
    }

    /// Remove a callback from every event it is subscribed to.
    pub fn off(&self, callback: RawEventCallback) {
        (self.table.unregister_event)(callback);
    }

    /// Emit a log record through the host.
    pub fn log(&self, level: &str, message: &str) {
        let (Ok(level), Ok(message)) = (CString::new(level), CString::new(message)) else {
            return;
        };
        (self.table.log)(level.as_ptr(), message.as_ptr());
    }

    /// Log at info level.
    pub fn info(&self, message: &str) {
        self.log("INFO", message);
    }

    /// Log at warn level.
    pub fn warn(&self, message: &str) {
        self.log("WARN", message);
    }

    /// Log at error level.
    pub fn error(&self, message: &str) {
        self.log("ERROR", message);
    }

    /// Store a value under a key.
    pub fn store(&self, key: &str, value: &str) -> bool {
        let (Ok(key), Ok(value)) = (CString::new(key), CString::new(value)) else {
            return false;
        };
        (self.table.set_data)(key.as_ptr(), value.as_ptr())
    }

    /// Fetch a value, copying it out of host memory immediately.
    pub fn fetch(&self, key: &str) -> Option<String> {
        let key = CString::new(key).ok()?;
        let ptr = (self.table.get_data)(key.as_ptr());
        if ptr.is_null() {
            return None;
        }
        // SAFETY: The host guarantees a non-null result points at a valid
        // string until the next write to this key; we copy it out before
        // returning control.
        let value = unsafe { CStr::from_ptr(ptr) };
        Some(value.to_string_lossy().into_owned())
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        let Ok(key) = CString::new(key) else {
            return false;
        };
        (self.table.has_data)(key.as_ptr())
    }

    /// Remove a key.
    pub fn remove(&self, key: &str) -> bool {
        let Ok(key) = CString::new(key) else {
            return false;
        };
        (self.table.delete_data)(key.as_ptr())
    }

    /// Schedule a callback after `interval_ms` milliseconds.
    ///
    /// Returns the timer handle, or 0 if the timer could not be created.
    pub fn timer(&self, interval_ms: u32, callback: RawEventCallback, repeat: bool) -> u64 {
        (self.table.set_timer)(interval_ms, callback, repeat)
    }

    /// Cancel a timer by handle.
    pub fn cancel_timer(&self, handle: u64) -> bool {
        (self.table.cancel_timer)(handle)
    }

    /// Ask the host to load and initialize another module.
    pub fn load_module(&self, name: &str) -> bool {
        let Ok(name) = CString::new(name) else {
            return false;
        };
        (self.table.load_plugin)(name.as_ptr())
    }

    /// Ask the host to shut down and unload a module.
    pub fn unload_module(&self, name: &str) -> bool {
        let Ok(name) = CString::new(name) else {
            return false;
        };
        (self.table.unload_plugin)(name.as_ptr())
    }
}

/// Declare a loadable module's static descriptor and entry points.
///
/// Expands to a static [`RawPluginDescriptor`](crate::abi::RawPluginDescriptor)
/// plus the three exported symbols (`plugin_get_info`, `plugin_init`,
/// `plugin_shutdown`) the host resolves. The init function receives a
/// [`HostClient`](crate::abi::HostClient); keeping it for later use is the
/// plugin's responsibility.
///
/// # Example
///
/// ```ignore
/// use armature::abi::{DependencyKind, HostClient, Priority};
/// use armature::declare_plugin;
///
/// fn start(host: HostClient) -> bool {
///     host.info("heartbeat starting");
///     true
/// }
///
/// fn stop() {}
///
/// declare_plugin! {
///     name: "heartbeat",
///     version: "1.0.0",
///     priority: Priority::Default,
///     dependencies: [("logger", DependencyKind::Required)],
///     init: start,
///     shutdown: stop,
/// }
/// ```
#[macro_export]
macro_rules! declare_plugin {
    (
        name: $name:literal,
        version: $version:literal,
        priority: $priority:expr,
        dependencies: [ $( ($dep_name:literal, $dep_kind:expr) ),* $(,)? ],
        init: $init:expr,
        shutdown: $shutdown:expr $(,)?
    ) => {
        static PLUGIN_DESCRIPTOR: $crate::abi::RawPluginDescriptor =
            $crate::abi::RawPluginDescriptor {
                name: concat!($name, "\0").as_bytes().as_ptr() as *const ::std::ffi::c_char,
                version: concat!($version, "\0").as_bytes().as_ptr() as *const ::std::ffi::c_char,
                abi_version: $crate::abi::ABI_VERSION,
                priority: $priority as i8,
                _pad: [0; 3],
                dependencies: $crate::abi::pad_dependencies(&[
                    $(
                        $crate::abi::RawDependency {
                            name: concat!($dep_name, "\0").as_bytes().as_ptr()
                                as *const ::std::ffi::c_char,
                            kind: $dep_kind as u8,
                        }
                    ),*
                ]),
            };

        /// Metadata entry point resolved by the host.
        #[unsafe(no_mangle)]
        pub extern "C" fn plugin_get_info() -> *const $crate::abi::RawPluginDescriptor {
            &PLUGIN_DESCRIPTOR
        }

        /// Init entry point resolved by the host.
        #[unsafe(no_mangle)]
        pub extern "C" fn plugin_init(host: *const $crate::abi::HostVTable) -> bool {
            // SAFETY: The host passes a table that outlives this module.
            match unsafe { $crate::abi::HostClient::from_raw(host) } {
                Some(client) => ($init)(client),
                None => false,
            }
        }

        /// Shutdown entry point resolved by the host.
        #[unsafe(no_mangle)]
        pub extern "C" fn plugin_shutdown() {
            ($shutdown)()
        }
    };
}
