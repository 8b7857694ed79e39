//! Tests for the load sequence: ABI gating, ordering, failure propagation,
//! and reverse-order unload.

use armature::abi::{ABI_VERSION, Dependency, PluginDescriptor, Priority};
use armature::error::Error;
use armature::host::{Host, ModuleHost};
use armature::plugin::{PluginModule, PluginState};
use std::sync::{Arc, Mutex};

/// In-process module that records its lifecycle calls in a shared journal.
struct FakeModule {
    descriptor: PluginDescriptor,
    journal: Arc<Mutex<Vec<String>>>,
    init_ok: bool,
}

impl FakeModule {
    fn new(descriptor: PluginDescriptor, journal: Arc<Mutex<Vec<String>>>) -> Box<Self> {
        Box::new(Self {
            descriptor,
            journal,
            init_ok: true,
        })
    }

    fn failing(descriptor: PluginDescriptor, journal: Arc<Mutex<Vec<String>>>) -> Box<Self> {
        Box::new(Self {
            descriptor,
            journal,
            init_ok: false,
        })
    }
}

impl PluginModule for FakeModule {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&mut self, _host: &Arc<ModuleHost>) -> bool {
        self.journal
            .lock()
            .unwrap()
            .push(format!("init:{}", self.descriptor.name));
        self.init_ok
    }

    fn shutdown(&mut self) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("shutdown:{}", self.descriptor.name));
    }
}

fn journal() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn desc(name: &str) -> PluginDescriptor {
    PluginDescriptor::new(name, "1.0.0")
}

#[test]
fn abi_mismatch_never_receives_init() {
    let host = Host::new();
    let log = journal();

    let mut stale = desc("stale");
    stale.abi_version = ABI_VERSION + 1;
    host.register_module(FakeModule::new(stale, log.clone())).unwrap();
    host.register_module(FakeModule::new(desc("fresh"), log.clone()))
        .unwrap();

    let report = host.initialize_all().unwrap();

    assert_eq!(report.loaded, vec!["fresh"]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0], (ref n, Error::AbiMismatch { .. }) if n == "stale"));
    assert_eq!(host.state("stale"), Some(PluginState::Failed));
    assert_eq!(*log.lock().unwrap(), vec!["init:fresh"]);
}

#[test]
fn load_order_honors_buckets_and_dependencies() {
    let host = Host::new();
    let log = journal();

    // Discovery order deliberately scrambled. "early" is First; "base" is
    // Later but required by "early", so it must still precede it; "mid"
    // keeps its Default slot.
    host.register_module(FakeModule::new(
        desc("early")
            .with_priority(Priority::First)
            .with_dependency(Dependency::required("base")),
        log.clone(),
    ))
    .unwrap();
    host.register_module(FakeModule::new(desc("mid"), log.clone()))
        .unwrap();
    host.register_module(FakeModule::new(
        desc("base").with_priority(Priority::Later),
        log.clone(),
    ))
    .unwrap();

    let report = host.initialize_all().unwrap();
    assert_eq!(report.loaded, vec!["base", "early", "mid"]);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["init:base", "init:early", "init:mid"]
    );
    assert_eq!(host.load_order(), vec!["base", "early", "mid"]);
}

#[test]
fn stable_discovery_order_within_bucket() {
    let host = Host::new();
    let log = journal();
    for name in ["a", "b", "c"] {
        host.register_module(FakeModule::new(desc(name), log.clone()))
            .unwrap();
    }

    let report = host.initialize_all().unwrap();
    assert_eq!(report.loaded, vec!["a", "b", "c"]);
}

#[test]
fn unmet_required_dependency_blocks_init() {
    let host = Host::new();
    let log = journal();

    host.register_module(FakeModule::new(
        desc("strict").with_dependency(Dependency::required("ghost")),
        log.clone(),
    ))
    .unwrap();
    host.register_module(FakeModule::new(
        desc("relaxed").with_dependency(Dependency::optional("ghost")),
        log.clone(),
    ))
    .unwrap();

    let report = host.initialize_all().unwrap();
    assert_eq!(report.loaded, vec!["relaxed"]);
    assert!(matches!(
        report.failed.as_slice(),
        [(n, Error::MissingDependency { .. })] if n == "strict"
    ));
    assert_eq!(*log.lock().unwrap(), vec!["init:relaxed"]);
}

#[test]
fn init_failure_cascades_to_dependents_only() {
    let host = Host::new();
    let log = journal();

    host.register_module(FakeModule::failing(desc("flaky"), log.clone()))
        .unwrap();
    host.register_module(FakeModule::new(
        desc("dependent").with_dependency(Dependency::required("flaky")),
        log.clone(),
    ))
    .unwrap();
    host.register_module(FakeModule::new(desc("bystander"), log.clone()))
        .unwrap();

    let report = host.initialize_all().unwrap();

    assert_eq!(report.loaded, vec!["bystander"]);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(host.state("flaky"), Some(PluginState::Failed));
    assert_eq!(host.state("dependent"), Some(PluginState::Failed));
    assert_eq!(host.state("bystander"), Some(PluginState::Active));

    // The dependent never initialized; the flaky module never shut down.
    let journal = log.lock().unwrap();
    assert!(journal.contains(&"init:flaky".to_string()));
    assert!(!journal.contains(&"init:dependent".to_string()));
    assert!(!journal.iter().any(|e| e.starts_with("shutdown:flaky")));
}

#[test]
fn unload_is_exact_reverse_of_load_order() {
    let host = Host::new();
    let log = journal();

    host.register_module(FakeModule::new(desc("one"), log.clone()))
        .unwrap();
    host.register_module(FakeModule::new(
        desc("two").with_dependency(Dependency::required("one")),
        log.clone(),
    ))
    .unwrap();
    host.register_module(FakeModule::new(desc("three"), log.clone()))
        .unwrap();

    host.initialize_all().unwrap();
    host.shutdown();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "init:one",
            "init:two",
            "init:three",
            "shutdown:three",
            "shutdown:two",
            "shutdown:one",
        ]
    );
    assert_eq!(host.state("one"), Some(PluginState::Unloaded));
    assert!(host.load_order().is_empty());
}

#[test]
fn shutdown_only_after_successful_init() {
    let host = Host::new();
    let log = journal();

    host.register_module(FakeModule::failing(desc("broken"), log.clone()))
        .unwrap();
    host.register_module(FakeModule::new(desc("fine"), log.clone()))
        .unwrap();

    let _ = host.initialize_all();
    host.shutdown();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["init:broken", "init:fine", "shutdown:fine"]
    );
}

#[test]
fn total_failure_is_fatal() {
    let host = Host::new();
    let log = journal();
    host.register_module(FakeModule::failing(desc("a"), log.clone()))
        .unwrap();
    host.register_module(FakeModule::failing(desc("b"), log.clone()))
        .unwrap();

    assert!(matches!(
        host.initialize_all(),
        Err(Error::NoModulesLoaded)
    ));
}

#[test]
fn empty_host_initializes_cleanly() {
    let host = Host::new();
    let report = host.initialize_all().unwrap();
    assert!(report.loaded.is_empty());
    assert!(report.failed.is_empty());
}

#[test]
fn duplicate_registration_is_rejected() {
    let host = Host::new();
    let log = journal();
    host.register_module(FakeModule::new(desc("twin"), log.clone()))
        .unwrap();
    let err = host
        .register_module(FakeModule::new(desc("twin"), log.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateModule(_)));
}

#[test]
fn runtime_unload_removes_from_order() {
    let host = Host::new();
    let log = journal();
    for name in ["a", "b", "c"] {
        host.register_module(FakeModule::new(desc(name), log.clone()))
            .unwrap();
    }
    host.initialize_all().unwrap();

    assert!(host.unload_plugin("b"));
    assert_eq!(host.load_order(), vec!["a", "c"]);
    assert_eq!(host.state("b"), Some(PluginState::Unloaded));

    // Unloading twice reports failure, and the module saw one shutdown.
    assert!(!host.unload_plugin("b"));
    let shutdowns = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| *e == "shutdown:b")
        .count();
    assert_eq!(shutdowns, 1);
}

#[test]
fn manifest_with_unresolvable_modules_registers_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugins.ini");
    std::fs::write(&path, "[PLUGINS]\nghost=no_such_module\n").unwrap();

    let host = Host::new();
    let registered = unsafe { host.load_manifest(&path) }.unwrap();
    assert_eq!(registered, 0);
    let report = host.initialize_all().unwrap();
    assert!(report.loaded.is_empty());
}

#[test]
fn discovery_of_empty_directory_finds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let host = Host::new();
    assert_eq!(unsafe { host.discover_dir(dir.path()) }, 0);
}

#[test]
fn dependency_capacity_overflow_is_a_load_error() {
    let host = Host::new();
    let log = journal();

    let mut greedy = desc("greedy");
    for i in 0..=armature::abi::MAX_DEPENDENCIES {
        greedy
            .dependencies
            .push(Dependency::optional(format!("d{i}")));
    }
    host.register_module(FakeModule::new(greedy, log.clone()))
        .unwrap();
    host.register_module(FakeModule::new(desc("modest"), log.clone()))
        .unwrap();

    let report = host.initialize_all().unwrap();
    assert_eq!(report.loaded, vec!["modest"]);
    assert!(matches!(
        report.failed.as_slice(),
        [(n, Error::TooManyDependencies { .. })] if n == "greedy"
    ));
    assert!(!log.lock().unwrap().contains(&"init:greedy".to_string()));
}
