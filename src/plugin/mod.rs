//! Module lifecycle: discovery, validation, ordering, and the dynamic
//! loading boundary.
//!
//! A module moves through a fixed state machine:
//!
//! ```text
//! Discovered → ValidatedAbi → DependenciesResolved → Initialized → Active
//!                                                  → ShuttingDown → Unloaded
//! ```
//!
//! with a terminal `Failed` state reachable from any pre-`Active` state. A
//! failed module never receives `init` or `shutdown`.

pub mod loader;
pub mod resolver;

pub use loader::{LoadedModule, ModuleLoader};
pub use resolver::{Resolution, resolve_load_order};

use crate::abi::PluginDescriptor;
use crate::host::ModuleHost;
use std::sync::Arc;

/// Lifecycle state of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PluginState {
    /// Metadata has been read; nothing validated yet.
    #[default]
    Discovered,
    /// ABI version matches the host.
    ValidatedAbi,
    /// Dependency constraints are satisfied and a load slot is assigned.
    DependenciesResolved,
    /// `init` returned success.
    Initialized,
    /// Fully loaded and receiving dispatch.
    Active,
    /// `shutdown` is in progress.
    ShuttingDown,
    /// Torn down; the module will not be called again.
    Unloaded,
    /// Rejected or failed before becoming active. Terminal.
    Failed,
}

impl PluginState {
    /// Whether the module may still transition to `Failed`.
    pub fn can_fail(self) -> bool {
        matches!(
            self,
            PluginState::Discovered
                | PluginState::ValidatedAbi
                | PluginState::DependenciesResolved
                | PluginState::Initialized
        )
    }

    /// Whether the module is live and dispatchable.
    pub fn is_active(self) -> bool {
        self == PluginState::Active
    }
}

/// The boundary every loadable module presents to the lifecycle driver.
///
/// Dynamically loaded libraries implement this through their exported entry
/// points (see [`LoadedModule`]); in-process modules (tests, built-ins)
/// implement it directly.
pub trait PluginModule: Send {
    /// The module's static metadata.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Initialize against the host. Returning false marks the module
    /// `Failed` without affecting independent siblings.
    fn init(&mut self, host: &Arc<ModuleHost>) -> bool;

    /// Release everything init acquired. Called exactly once, and only
    /// after a successful init.
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reachable_only_before_active() {
        assert!(PluginState::Discovered.can_fail());
        assert!(PluginState::Initialized.can_fail());
        assert!(!PluginState::Active.can_fail());
        assert!(!PluginState::Unloaded.can_fail());
    }
}
