//! Versioned binary contract between the host and plugin modules.
//!
//! Everything a module and a host must agree on lives here: the ABI version
//! constant, the `#[repr(C)]` layout of plugin metadata, the host capability
//! table handed to every module at init, and the entry points a loadable
//! module exports. The layouts are data, not behavior; any module built
//! against ABI version `V` is loadable by any host built against the same
//! `V`.
//!
//! Plugin authors normally interact with this module through
//! [`declare_plugin!`](crate::declare_plugin) and [`HostClient`] rather than
//! the raw types.

mod client;
mod descriptor;
mod vtable;

pub use client::HostClient;
pub use descriptor::{
    Dependency, PluginDescriptor, RawDependency, RawPluginDescriptor, pad_dependencies,
};
pub use vtable::{
    HostVTable, PLUGIN_GET_INFO_SYMBOL, PLUGIN_INIT_SYMBOL, PLUGIN_SHUTDOWN_SYMBOL,
    PluginGetInfoFn, PluginInitFn, PluginShutdownFn, RawEventCallback,
};

/// Current ABI version. Modules must match this version to be loaded.
pub const ABI_VERSION: u32 = 1;

/// Fixed capacity of the embedded dependency array.
///
/// Declaring more dependencies than this is a load-time error, never a
/// silent truncation.
pub const MAX_DEPENDENCIES: usize = 128;

/// Coarse load-order tier, independent of dependency edges.
///
/// All `First` modules are ordered before any `Default`, all `Default`
/// before any `Later`; dependency edges override the tier where they must.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i8)]
pub enum Priority {
    /// Load before the default bucket.
    First = 0,
    /// The default bucket.
    #[default]
    Default = 1,
    /// Load after the default bucket.
    Later = 2,
}

impl Priority {
    /// Decode from the raw ABI byte.
    pub const fn from_raw(raw: i8) -> Option<Self> {
        match raw {
            0 => Some(Priority::First),
            1 => Some(Priority::Default),
            2 => Some(Priority::Later),
            _ => None,
        }
    }
}

/// Whether a dependency's absence or failure blocks the dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DependencyKind {
    /// Absence or failure of the dependency fails the dependent.
    #[default]
    Required = 0,
    /// The dependency is ordered before the dependent when present, but
    /// never blocks loading.
    Optional = 1,
}

impl DependencyKind {
    /// Decode from the raw ABI byte.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(DependencyKind::Required),
            1 => Some(DependencyKind::Optional),
            _ => None,
        }
    }
}
