//! Tests for the binary contract: the descriptor a `declare_plugin!` module
//! exports, and the entry-point behavior at the boundary.

use armature::abi::{
    ABI_VERSION, DependencyKind, HostClient, PluginDescriptor, Priority,
};
use armature::declare_plugin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

static INIT_CALLS: AtomicU32 = AtomicU32::new(0);
static SHUTDOWN_CALLED: AtomicBool = AtomicBool::new(false);

fn start(_host: HostClient) -> bool {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    true
}

fn stop() {
    SHUTDOWN_CALLED.store(true, Ordering::SeqCst);
}

declare_plugin! {
    name: "fixture",
    version: "2.3.4",
    priority: Priority::Later,
    dependencies: [
        ("logger", DependencyKind::Required),
        ("console", DependencyKind::Optional),
    ],
    init: start,
    shutdown: stop,
}

#[test]
fn get_info_returns_stable_valid_descriptor() {
    let first = plugin_get_info();
    let second = plugin_get_info();
    assert!(!first.is_null());
    // Static metadata: the same pointer every call, no per-call allocation.
    assert_eq!(first, second);

    let descriptor = unsafe { PluginDescriptor::from_raw(&*first) }.unwrap();
    assert_eq!(descriptor.name, "fixture");
    assert_eq!(descriptor.version, "2.3.4");
    assert_eq!(descriptor.abi_version, ABI_VERSION);
    assert_eq!(descriptor.priority, Priority::Later);
    assert_eq!(descriptor.dependencies.len(), 2);
    assert_eq!(descriptor.dependencies[0].name, "logger");
    assert_eq!(descriptor.dependencies[0].kind, DependencyKind::Required);
    assert_eq!(descriptor.dependencies[1].name, "console");
    assert_eq!(descriptor.dependencies[1].kind, DependencyKind::Optional);
    descriptor.validate().unwrap();
}

#[test]
fn init_rejects_null_capability_table() {
    assert!(!plugin_init(std::ptr::null()));
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 0);
}

#[test]
fn shutdown_entry_point_is_callable() {
    plugin_shutdown();
    assert!(SHUTDOWN_CALLED.load(Ordering::SeqCst));
}
