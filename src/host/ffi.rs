//! The raw capability table and its trampolines.
//!
//! The `extern "C"` entries of [`HostVTable`] carry no context argument, so
//! they route through a process-wide slot holding the currently installed
//! host. The slot is weak: a dropped host degrades every table operation to
//! its failure sentinel instead of dangling. One host drives FFI modules at
//! a time; installing another replaces the routing.

use super::capabilities::{LogLevel, emit_plugin_log};
use super::core::HostCore;
use crate::abi::{HostVTable, RawEventCallback};
use crate::bus::{CallbackId, EventHandler};
use std::ffi::{CStr, CString, c_char};
use std::sync::{Arc, RwLock, Weak};

static ACTIVE_HOST: RwLock<Option<Weak<HostCore>>> = RwLock::new(None);

/// Route the table at this host.
pub(crate) fn install(core: &Arc<HostCore>) {
    *ACTIVE_HOST.write().unwrap() = Some(Arc::downgrade(core));
}

/// Clear the routing if it still points at this host.
pub(crate) fn uninstall(core: &Arc<HostCore>) {
    let mut active = ACTIVE_HOST.write().unwrap();
    if let Some(installed) = active.as_ref() {
        if Weak::ptr_eq(installed, &Arc::downgrade(core)) {
            *active = None;
        }
    }
}

/// The one capability table handed to every FFI module.
pub(crate) fn vtable_ptr() -> *const HostVTable {
    &raw const VTABLE
}

static VTABLE: HostVTable = HostVTable {
    send_event: vt_send_event,
    register_event: vt_register_event,
    unregister_event: vt_unregister_event,
    load_plugin: vt_load_plugin,
    unload_plugin: vt_unload_plugin,
    log: vt_log,
    set_data: vt_set_data,
    get_data: vt_get_data,
    has_data: vt_has_data,
    delete_data: vt_delete_data,
    set_timer: vt_set_timer,
    cancel_timer: vt_cancel_timer,
};

fn with_core<R>(default: R, f: impl FnOnce(&Arc<HostCore>) -> R) -> R {
    let core = {
        let active = ACTIVE_HOST.read().unwrap();
        active.as_ref().and_then(Weak::upgrade)
    };
    match core {
        Some(core) => f(&core),
        None => default,
    }
}

/// Borrow a C string for the duration of a trampoline.
///
/// Null and non-UTF-8 inputs come back as `None`; trampolines treat them as
/// the operation's failure case rather than aborting across the boundary.
fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: The ABI requires non-null arguments to be valid
    // null-terminated strings owned by the caller for the call's duration.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Adapt a raw callback into the bus/timer handler shape.
fn wrap_callback(callback: RawEventCallback) -> EventHandler {
    Arc::new(move |event: &str, payload: &str| {
        let (Ok(event), Ok(payload)) = (CString::new(event), CString::new(payload)) else {
            return;
        };
        callback(event.as_ptr(), payload.as_ptr());
    })
}

extern "C" fn vt_send_event(name: *const c_char, payload: *const c_char) {
    let Some(name) = cstr(name) else { return };
    let payload = cstr(payload).unwrap_or("");
    with_core((), |core| {
        core.bus.send(name, payload);
    });
}

extern "C" fn vt_register_event(name: *const c_char, callback: RawEventCallback) {
    let Some(name) = cstr(name) else { return };
    with_core((), |core| {
        core.bus.register(
            name,
            CallbackId::from_raw_callback(callback),
            wrap_callback(callback),
        );
    });
}

extern "C" fn vt_unregister_event(callback: RawEventCallback) {
    with_core((), |core| {
        core.bus.unregister(CallbackId::from_raw_callback(callback));
    });
}

extern "C" fn vt_load_plugin(name: *const c_char) -> bool {
    let Some(name) = cstr(name) else {
        return false;
    };
    with_core(false, |core| core.load_and_init_by_name(name))
}

extern "C" fn vt_unload_plugin(name: *const c_char) -> bool {
    let Some(name) = cstr(name) else {
        return false;
    };
    with_core(false, |core| core.unload_by_name(name))
}

extern "C" fn vt_log(level: *const c_char, message: *const c_char) {
    let Some(message) = cstr(message) else { return };
    let level = cstr(level).map_or(LogLevel::Info, LogLevel::parse);
    emit_plugin_log(level, "<ffi>", message);
}

extern "C" fn vt_set_data(key: *const c_char, value: *const c_char) -> bool {
    let (Some(key), Some(value)) = (cstr(key), cstr(value)) else {
        return false;
    };
    with_core(false, |core| core.store.set(key, value))
}

extern "C" fn vt_get_data(key: *const c_char) -> *const c_char {
    let Some(key) = cstr(key) else {
        return std::ptr::null();
    };
    with_core(std::ptr::null(), |core| core.store.get_raw(key))
}

extern "C" fn vt_has_data(key: *const c_char) -> bool {
    let Some(key) = cstr(key) else {
        return false;
    };
    with_core(false, |core| core.store.has(key))
}

extern "C" fn vt_delete_data(key: *const c_char) -> bool {
    let Some(key) = cstr(key) else {
        return false;
    };
    with_core(false, |core| core.store.delete(key))
}

extern "C" fn vt_set_timer(interval_ms: u32, callback: RawEventCallback, repeat: bool) -> u64 {
    with_core(0, |core| {
        core.timers
            .set_timer(interval_ms, wrap_callback(callback), repeat)
            .0
    })
}

extern "C" fn vt_cancel_timer(handle: u64) -> bool {
    with_core(false, |core| {
        core.timers.cancel(crate::timer::TimerHandle(handle))
    })
}
