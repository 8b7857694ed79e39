//! # Armature
//!
//! An in-process plugin host runtime with a versioned C ABI.
//!
//! Armature lets a host process load independently-compiled plugin modules
//! across language and compilation-unit boundaries and exchange events,
//! persisted key/value state, and timers with them. The contract is a fixed
//! set of `#[repr(C)]` layouts plus a function-pointer capability table; the
//! host implements the subsystems behind that table and drives a
//! dependency-and-priority-ordered load sequence.
//!
//! ## Host side
//!
//! ```rust,ignore
//! use armature::host::Host;
//! use armature::runtime::Runtime;
//!
//! let host = Host::new();
//! host.add_search_path("./plugins");
//! unsafe { host.load_manifest("plugins.ini")? };
//! host.initialize_all()?;
//!
//! Runtime::new(host).run();
//! ```
//!
//! ## Plugin side
//!
//! ```rust,ignore
//! use armature::abi::{HostClient, Priority};
//! use armature::declare_plugin;
//!
//! fn start(host: HostClient) -> bool {
//!     host.info("hello from a module");
//!     true
//! }
//!
//! declare_plugin! {
//!     name: "hello",
//!     version: "1.0.0",
//!     priority: Priority::Default,
//!     dependencies: [],
//!     init: start,
//!     shutdown: || {},
//! }
//! ```
//!
//! Plugins run in the host's address space; there is no isolation boundary.
//! A misbehaving module can corrupt the host, exactly as with any
//! `dlopen`-style plugin system.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod abi;
pub mod bus;
pub mod clock;
pub mod error;
pub mod host;
pub mod manifest;
pub mod observability;
pub mod plugin;
pub mod runtime;
pub mod store;
pub mod timer;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::abi::{ABI_VERSION, Dependency, DependencyKind, PluginDescriptor, Priority};
    pub use crate::bus::{CallbackId, EventBus, EventHandler};
    pub use crate::clock::{Clock, ClockTime};
    pub use crate::error::{Error, Result};
    pub use crate::host::{Host, HostApi, LoadReport, ModuleHost};
    pub use crate::plugin::{PluginModule, PluginState};
    pub use crate::runtime::{Runtime, RuntimeConfig};
    pub use crate::store::DataStore;
    pub use crate::timer::{TimerHandle, TimerScheduler};
}

pub use error::{Error, Result};
