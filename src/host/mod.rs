//! The plugin host: owns the event bus, data store, timer scheduler, and
//! module registry, and drives the load/init/shutdown sequence.

mod capabilities;
mod context;
mod core;
mod ffi;

pub use capabilities::{ControlApi, DataApi, EventApi, HostApi, LogApi, LogLevel, TimerApi};
pub use context::ModuleHost;
pub use self::core::LoadReport;

use crate::bus::EventBus;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::plugin::{PluginModule, PluginState};
use crate::store::DataStore;
use crate::timer::TimerScheduler;
use self::core::HostCore;
use std::path::Path;
use std::sync::Arc;

/// An in-process plugin host.
///
/// Modules are registered (in-process) or discovered (shared libraries),
/// then [`initialize_all`](Host::initialize_all) validates, orders, and
/// initializes them; [`shutdown`](Host::shutdown) tears them down in exact
/// reverse of the achieved load order. Between the two, the host's
/// subsystems dispatch events and timers to whatever the modules registered.
pub struct Host {
    core: Arc<HostCore>,
}

impl Host {
    /// Create a host on the monotonic system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a host on an explicit clock (tests drive a
    /// [`ManualClock`](crate::clock::ManualClock)).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            core: Arc::new(HostCore::new(clock)),
        }
    }

    /// Add a search path for module libraries.
    pub fn add_search_path(&self, path: impl Into<std::path::PathBuf>) {
        self.core.loader.write().unwrap().add_search_path(path);
    }

    /// Register an in-process module.
    ///
    /// The descriptor is read once and validated; a module failing ABI
    /// validation is tracked as `Failed` and surfaces in the next load
    /// report. Errors only for a nameless descriptor or a duplicate name.
    pub fn register_module(&self, module: Box<dyn PluginModule>) -> Result<()> {
        self.core.register(module)
    }

    /// Discover and register every module library in a directory.
    ///
    /// Returns the number of modules registered; unloadable libraries are
    /// logged and skipped.
    ///
    /// # Safety
    ///
    /// Loading executes arbitrary code from every library in the directory;
    /// all of them must be trusted.
    pub unsafe fn discover_dir(&self, dir: impl AsRef<Path>) -> usize {
        let results = {
            let loader = self.core.loader.read().unwrap();
            // SAFETY: Caller guarantees the directory's libraries are
            // trusted.
            unsafe { loader.load_all_from_dir(dir) }
        };

        let mut registered = 0;
        for result in results {
            match result {
                Ok(module) => match self.core.register(Box::new(module)) {
                    Ok(()) => registered += 1,
                    Err(err) => tracing::warn!(error = %err, "skipping module"),
                },
                Err(err) => {
                    tracing::warn!(error = %err, "failed to load module library");
                    crate::observability::record_module_failed();
                }
            }
        }
        registered
    }

    /// Register every module named by a manifest file.
    ///
    /// Returns the number of modules registered; entries that fail to load
    /// are logged and skipped.
    ///
    /// # Safety
    ///
    /// As [`discover_dir`](Host::discover_dir): every module the manifest
    /// names must be trusted.
    pub unsafe fn load_manifest(&self, path: impl AsRef<Path>) -> Result<usize> {
        let manifest = crate::manifest::Manifest::from_file(path)?;
        let mut registered = 0;
        for entry in &manifest.modules {
            let loaded = {
                let loader = self.core.loader.read().unwrap();
                // SAFETY: Caller vouches for everything the manifest names.
                unsafe { loader.load_by_name(&entry.module) }
            };
            match loaded {
                Ok(module) => match self.core.register(Box::new(module)) {
                    Ok(()) => registered += 1,
                    Err(err) => tracing::warn!(error = %err, "skipping module"),
                },
                Err(err) => {
                    tracing::warn!(
                        module = %entry.module,
                        error = %err,
                        "failed to load manifest module"
                    );
                    crate::observability::record_module_failed();
                }
            }
        }
        Ok(registered)
    }

    /// Validate, order, and initialize every pending module.
    ///
    /// See [`LoadReport`] for the outcome. Errors only when modules were
    /// discovered and none loaded.
    pub fn initialize_all(&self) -> Result<LoadReport> {
        self.core.initialize_all()
    }

    /// Fire due timers. The dispatch loop calls this.
    pub fn tick(&self) -> usize {
        self.core.timers.tick()
    }

    /// The host's event bus.
    pub fn events(&self) -> &EventBus {
        &self.core.bus
    }

    /// An owned sender for feeding events from other threads.
    ///
    /// Useful for input readers and module worker threads that outlive a
    /// borrow of the host.
    pub fn event_sender(&self) -> impl Fn(&str, &str) + Send + Sync + 'static {
        let core = Arc::clone(&self.core);
        move |event: &str, payload: &str| {
            core.bus.send(event, payload);
        }
    }

    /// The host's data store.
    pub fn store(&self) -> &DataStore {
        &self.core.store
    }

    /// The host's timer scheduler.
    pub fn timers(&self) -> &TimerScheduler {
        &self.core.timers
    }

    /// Lifecycle state of a module, if it is known to the registry.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.core.state(name)
    }

    /// The achieved load order of currently active modules.
    pub fn load_order(&self) -> Vec<String> {
        self.core.order.lock().unwrap().clone()
    }

    /// Load and initialize a module by name at runtime.
    ///
    /// This is the same operation the `load_plugin` capability exposes to
    /// modules; the library is resolved against the host's search paths and
    /// is part of the host's trust domain.
    pub fn load_plugin(&self, name: &str) -> bool {
        self.core.load_and_init_by_name(name)
    }

    /// Shut down and unload a single module by name.
    pub fn unload_plugin(&self, name: &str) -> bool {
        self.core.unload_by_name(name)
    }

    /// Shut down every active module, in exact reverse load order.
    pub fn shutdown(&self) {
        self.core.shutdown_all();
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.core.shutdown_all();
        ffi::uninstall(&self.core);
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("active_modules", &self.load_order().len())
            .field("bus", &self.core.bus)
            .field("timers", &self.core.timers)
            .finish()
    }
}
