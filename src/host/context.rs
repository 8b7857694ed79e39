//! Per-module host context.
//!
//! Each module receives its own [`ModuleHost`] at init: an explicit context
//! object implementing the capability traits, with its lifecycle tied to
//! init/shutdown. The context records which callback identities and timer
//! handles the module created so the host can tear them down after the
//! module's shutdown returns. (Modules calling through the raw FFI table
//! share one anonymous path and clean up cooperatively instead.)

use super::capabilities::{
    ControlApi, DataApi, EventApi, LogApi, LogLevel, TimerApi, emit_plugin_log,
};
use super::core::HostCore;
use super::ffi;
use crate::abi::HostVTable;
use crate::bus::{CallbackId, EventHandler};
use crate::timer::TimerHandle;
use std::sync::{Arc, Mutex, Weak};

/// The capability context handed to one module for its lifetime.
///
/// Holds the host weakly: a context that outlives its host degrades to
/// failure sentinels instead of dangling.
pub struct ModuleHost {
    core: Weak<HostCore>,
    module: String,
    owned_callbacks: Mutex<Vec<CallbackId>>,
    owned_timers: Mutex<Vec<TimerHandle>>,
}

impl ModuleHost {
    pub(crate) fn new(core: Weak<HostCore>, module: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            core,
            module: module.into(),
            owned_callbacks: Mutex::new(Vec::new()),
            owned_timers: Mutex::new(Vec::new()),
        })
    }

    /// Name of the module this context belongs to.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// The raw capability table, for handing across the C boundary.
    ///
    /// The table is static; its operations route to the currently installed
    /// host and stay valid until the module's shutdown returns.
    pub fn raw_vtable(&self) -> *const HostVTable {
        ffi::vtable_ptr()
    }

    /// Remove everything this module registered: bus subscriptions first,
    /// then live timers. Called by the host after shutdown returns.
    pub(crate) fn teardown(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        for id in self.owned_callbacks.lock().unwrap().drain(..) {
            core.bus.unregister(id);
        }
        for handle in self.owned_timers.lock().unwrap().drain(..) {
            core.timers.cancel(handle);
        }
    }
}

impl EventApi for ModuleHost {
    fn send_event(&self, event: &str, payload: &str) {
        if let Some(core) = self.core.upgrade() {
            core.bus.send(event, payload);
        }
    }

    fn register_event(&self, event: &str, id: CallbackId, handler: EventHandler) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        core.bus.register(event, id, handler);
        let mut owned = self.owned_callbacks.lock().unwrap();
        if !owned.contains(&id) {
            owned.push(id);
        }
    }

    fn unregister_event(&self, id: CallbackId) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        self.owned_callbacks.lock().unwrap().retain(|o| *o != id);
        core.bus.unregister(id)
    }
}

impl DataApi for ModuleHost {
    fn set_data(&self, key: &str, value: &str) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.store.set(key, value))
    }

    fn get_data(&self, key: &str) -> Option<String> {
        self.core.upgrade().and_then(|core| core.store.get(key))
    }

    fn has_data(&self, key: &str) -> bool {
        self.core.upgrade().is_some_and(|core| core.store.has(key))
    }

    fn delete_data(&self, key: &str) -> bool {
        self.core
            .upgrade()
            .is_some_and(|core| core.store.delete(key))
    }
}

impl TimerApi for ModuleHost {
    fn set_timer(&self, interval_ms: u32, callback: EventHandler, repeat: bool) -> TimerHandle {
        let Some(core) = self.core.upgrade() else {
            return TimerHandle::INVALID;
        };
        let handle = core.timers.set_timer(interval_ms, callback, repeat);
        if handle.is_valid() {
            self.owned_timers.lock().unwrap().push(handle);
        }
        handle
    }

    fn cancel_timer(&self, handle: TimerHandle) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        self.owned_timers.lock().unwrap().retain(|o| *o != handle);
        core.timers.cancel(handle)
    }
}

impl LogApi for ModuleHost {
    fn log(&self, level: LogLevel, message: &str) {
        emit_plugin_log(level, &self.module, message);
    }
}

impl ControlApi for ModuleHost {
    fn load_plugin(&self, name: &str) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        core.load_and_init_by_name(name)
    }

    fn unload_plugin(&self, name: &str) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        core.unload_by_name(name)
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("module", &self.module)
            .field("host_alive", &(self.core.strong_count() > 0))
            .finish()
    }
}
