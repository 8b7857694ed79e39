//! Shared host state and the lifecycle engine.

use super::context::ModuleHost;
use super::ffi;
use crate::abi::{DependencyKind, PluginDescriptor};
use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::observability::{record_module_failed, record_module_loaded};
use crate::plugin::{ModuleLoader, PluginModule, PluginState, resolve_load_order};
use crate::store::DataStore;
use crate::timer::TimerScheduler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// What happened when the host drove its load sequence.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Modules that reached `Active`, in load order.
    pub loaded: Vec<String>,
    /// Modules that failed, with the reason.
    pub failed: Vec<(String, Error)>,
}

pub(crate) struct ModuleRecord {
    pub(crate) descriptor: PluginDescriptor,
    pub(crate) state: PluginState,
    pub(crate) discovery: usize,
    pub(crate) module: Option<Box<dyn PluginModule>>,
    pub(crate) context: Option<Arc<ModuleHost>>,
    pub(crate) failure: Option<String>,
    /// Whether the failure already appeared in a LoadReport.
    pub(crate) reported: bool,
}

/// The host's shared subsystems and module registry.
///
/// Everything is interior-locked; no lock is held across a call into module
/// code, so modules may re-enter any capability from inside init, shutdown,
/// or a callback.
pub(crate) struct HostCore {
    pub(crate) bus: EventBus,
    pub(crate) store: DataStore,
    pub(crate) timers: TimerScheduler,
    pub(crate) loader: RwLock<ModuleLoader>,
    pub(crate) records: Mutex<HashMap<String, ModuleRecord>>,
    pub(crate) order: Mutex<Vec<String>>,
    discovery: AtomicUsize,
}

impl HostCore {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            bus: EventBus::new(),
            store: DataStore::new(),
            timers: TimerScheduler::with_clock(clock),
            loader: RwLock::new(ModuleLoader::new()),
            records: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            discovery: AtomicUsize::new(0),
        }
    }

    /// Track a discovered module.
    ///
    /// The descriptor is read once here and validated against the ABI; a
    /// module that fails validation is recorded as `Failed` (and surfaces in
    /// the next load report) rather than erroring the host. Only a
    /// nameless descriptor or a name collision is rejected outright.
    pub(crate) fn register(&self, module: Box<dyn PluginModule>) -> Result<()> {
        let descriptor = module.descriptor().clone();
        if descriptor.name.is_empty() {
            return Err(Error::InvalidDescriptor("module name is empty"));
        }

        let discovery = self.discovery.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&descriptor.name) {
            return Err(Error::DuplicateModule(descriptor.name));
        }

        let record = match descriptor.validate() {
            Ok(()) => {
                tracing::debug!(
                    module = %descriptor.name,
                    version = %descriptor.version,
                    "module discovered"
                );
                ModuleRecord {
                    descriptor,
                    state: PluginState::ValidatedAbi,
                    discovery,
                    module: Some(module),
                    context: None,
                    failure: None,
                    reported: false,
                }
            }
            Err(err) => {
                tracing::warn!(module = %descriptor.name, error = %err, "module rejected");
                record_module_failed();
                ModuleRecord {
                    descriptor,
                    state: PluginState::Failed,
                    discovery,
                    module: None,
                    context: None,
                    failure: Some(err.to_string()),
                    reported: false,
                }
            }
        };
        records.insert(record.descriptor.name.clone(), record);
        Ok(())
    }

    /// Resolve load order and drive `init` for every pending module.
    ///
    /// Failures are isolated: a failed module (and everything that requires
    /// it) is skipped while independent modules keep loading. Returns an
    /// error only when modules were discovered and none of them loaded.
    pub(crate) fn initialize_all(self: &Arc<Self>) -> Result<LoadReport> {
        ffi::install(self);
        let mut report = LoadReport::default();

        // Snapshot the pending descriptors in discovery order. Dependencies
        // already satisfied by active modules are pruned from the working
        // copies so a later batch resolves only against its open edges.
        let descriptors: Vec<PluginDescriptor> = {
            let records = self.records.lock().unwrap();
            let mut pending: Vec<&ModuleRecord> = records
                .values()
                .filter(|r| r.state == PluginState::ValidatedAbi)
                .collect();
            pending.sort_by_key(|r| r.discovery);
            pending
                .iter()
                .map(|r| {
                    let mut descriptor = r.descriptor.clone();
                    descriptor.dependencies.retain(|dep| {
                        records
                            .get(&dep.name)
                            .is_none_or(|d| d.state != PluginState::Active)
                    });
                    descriptor
                })
                .collect()
        };

        let resolution = resolve_load_order(&descriptors);
        for (idx, err) in resolution.failed {
            let name = descriptors[idx].name.clone();
            self.mark_failed(&name, &err);
            report.failed.push((name, err));
        }

        for idx in resolution.order {
            let name = descriptors[idx].name.clone();

            // Required dependencies sit earlier in the order; one that is
            // not Active by now failed init, and the failure cascades.
            let unmet = {
                let records = self.records.lock().unwrap();
                descriptors[idx]
                    .dependencies
                    .iter()
                    .filter(|d| d.kind == DependencyKind::Required)
                    .find(|d| {
                        records
                            .get(&d.name)
                            .is_none_or(|r| r.state != PluginState::Active)
                    })
                    .map(|d| d.name.clone())
            };
            if let Some(dependency) = unmet {
                let err = Error::DependencyFailed {
                    module: name.clone(),
                    dependency,
                };
                self.mark_failed(&name, &err);
                report.failed.push((name, err));
                continue;
            }

            match self.init_module(&name) {
                Ok(()) => report.loaded.push(name),
                Err(err) => report.failed.push((name, err)),
            }
        }

        // Registration-time rejections (ABI mismatch, capacity) that have
        // not surfaced in a report yet.
        let mut prefailed = 0;
        {
            let mut records = self.records.lock().unwrap();
            let mut unreported: Vec<&mut ModuleRecord> = records
                .values_mut()
                .filter(|r| r.state == PluginState::Failed && !r.reported)
                .collect();
            unreported.sort_by_key(|r| r.discovery);
            for record in unreported {
                record.reported = true;
                prefailed += 1;
                let err = record
                    .descriptor
                    .validate()
                    .err()
                    .unwrap_or(Error::InvalidDescriptor("module rejected"));
                report.failed.push((record.descriptor.name.clone(), err));
            }
        }

        let attempted = descriptors.len() + prefailed;
        let nothing_active = self.order.lock().unwrap().is_empty();
        if report.loaded.is_empty() && attempted > 0 && nothing_active {
            tracing::error!("no modules loaded");
            return Err(Error::NoModulesLoaded);
        }
        Ok(report)
    }

    /// Run one module's init and transition it to `Active`.
    fn init_module(self: &Arc<Self>, name: &str) -> Result<()> {
        let mut module = {
            let mut records = self.records.lock().unwrap();
            let record = records
                .get_mut(name)
                .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
            record.state = PluginState::DependenciesResolved;
            record
                .module
                .take()
                .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?
        };

        let context = ModuleHost::new(Arc::downgrade(self), name);
        let ok = module.init(&context);

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        record.module = Some(module);

        if ok {
            record.state = PluginState::Initialized;
            record.state = PluginState::Active;
            record.context = Some(context);
            self.order.lock().unwrap().push(name.to_string());
            record_module_loaded();
            tracing::info!(
                module = %name,
                version = %record.descriptor.version,
                "module active"
            );
            Ok(())
        } else {
            record.state = PluginState::Failed;
            record.failure = Some("init returned failure".to_string());
            record.reported = true;
            record_module_failed();
            tracing::warn!(module = %name, "module init failed");
            Err(Error::InitFailed(name.to_string()))
        }
    }

    fn mark_failed(&self, name: &str, err: &Error) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(name) {
            if record.state.can_fail() {
                record.state = PluginState::Failed;
            }
            record.failure = Some(err.to_string());
            record.reported = true;
        }
        record_module_failed();
        tracing::warn!(module = %name, error = %err, "module failed");
    }

    /// Load, validate, and initialize a module by name at runtime.
    ///
    /// Used by the `load_plugin` capability. Returns true when the module
    /// ends up `Active`; already-active modules are treated as success.
    pub(crate) fn load_and_init_by_name(self: &Arc<Self>, name: &str) -> bool {
        ffi::install(self);

        // Idempotent for live modules. A registered-but-pending module is
        // initialized in place; spent records may be replaced by a reload.
        let already_registered = {
            let mut records = self.records.lock().unwrap();
            match records.get(name).map(|r| r.state) {
                Some(PluginState::Active) => return true,
                Some(PluginState::ValidatedAbi) => true,
                Some(PluginState::Failed | PluginState::Unloaded) => {
                    records.remove(name);
                    false
                }
                Some(_) => return false,
                None => false,
            }
        };

        let module_name = if already_registered {
            name.to_string()
        } else {
            // SAFETY: Modules on the host's search paths are in the host's
            // trust domain; loading them is the point of this capability.
            let loaded = unsafe { self.loader.read().unwrap().load_by_name(name) };
            let module = match loaded {
                Ok(module) => module,
                Err(err) => {
                    tracing::warn!(module = %name, error = %err, "runtime load failed");
                    record_module_failed();
                    return false;
                }
            };
            let module_name = module.descriptor().name.clone();
            if self.register(Box::new(module)).is_err() {
                record_module_failed();
                return false;
            }
            module_name
        };
        {
            let records = self.records.lock().unwrap();
            let Some(record) = records.get(&module_name) else {
                return false;
            };
            if record.state != PluginState::ValidatedAbi {
                return false;
            }
            // Runtime loads resolve against the live registry: required
            // dependencies must already be active.
            let unmet = record
                .descriptor
                .dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Required)
                .find(|d| {
                    records
                        .get(&d.name)
                        .is_none_or(|r| r.state != PluginState::Active)
                });
            if let Some(dep) = unmet {
                let err = Error::MissingDependency {
                    module: module_name.clone(),
                    dependency: dep.name.clone(),
                };
                drop(records);
                self.mark_failed(&module_name, &err);
                return false;
            }
        }

        self.init_module(&module_name).is_ok()
    }

    /// Shut down and unload one active module.
    pub(crate) fn unload_by_name(&self, name: &str) -> bool {
        if !self.teardown_module(name) {
            return false;
        }
        self.order.lock().unwrap().retain(|n| n != name);
        true
    }

    /// Shut down every active module in exact reverse of the achieved load
    /// order.
    pub(crate) fn shutdown_all(&self) {
        let order: Vec<String> = {
            let mut order = self.order.lock().unwrap();
            std::mem::take(&mut *order)
        };
        for name in order.iter().rev() {
            self.teardown_module(name);
        }
    }

    /// Drive one module through ShuttingDown → Unloaded.
    ///
    /// The module's context-owned subscriptions and timers are removed after
    /// its shutdown returns. The module object itself is retained so any
    /// callbacks it failed to unregister through the raw table keep pointing
    /// at mapped code.
    fn teardown_module(&self, name: &str) -> bool {
        let (mut module, context) = {
            let mut records = self.records.lock().unwrap();
            let Some(record) = records.get_mut(name) else {
                return false;
            };
            if record.state != PluginState::Active {
                return false;
            }
            record.state = PluginState::ShuttingDown;
            let Some(module) = record.module.take() else {
                return false;
            };
            (module, record.context.take())
        };

        module.shutdown();
        if let Some(context) = context {
            context.teardown();
        }

        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(name) {
            record.module = Some(module);
            record.state = PluginState::Unloaded;
        }
        tracing::info!(module = %name, "module unloaded");
        true
    }

    /// Current lifecycle state of a module.
    pub(crate) fn state(&self, name: &str) -> Option<PluginState> {
        self.records.lock().unwrap().get(name).map(|r| r.state)
    }
}
