//! Error types for Armature.

use thiserror::Error;

/// Result type alias using Armature's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for host and loader operations.
///
/// Every failure here is local to the offending module; only
/// [`Error::NoModulesLoaded`] is treated as fatal by the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load the shared library.
    #[error("failed to load module: {0}")]
    LoadFailed(String),

    /// The module doesn't export a required entry point.
    #[error("missing module entry point: {0}")]
    MissingEntryPoint(&'static str),

    /// The module returned a null descriptor pointer.
    #[error("module returned null descriptor")]
    NullDescriptor,

    /// ABI version mismatch.
    #[error("ABI version mismatch: expected {expected}, got {actual}")]
    AbiMismatch {
        /// ABI version the host was built against.
        expected: u32,
        /// ABI version the module declared.
        actual: u32,
    },

    /// Descriptor validation failed.
    #[error("invalid module descriptor: {0}")]
    InvalidDescriptor(&'static str),

    /// Dependency list exceeds the fixed ABI capacity.
    #[error("too many dependencies: {count} (limit {limit})")]
    TooManyDependencies {
        /// Number of dependencies the module declared.
        count: usize,
        /// The ABI capacity bound.
        limit: usize,
    },

    /// A required dependency was never discovered.
    #[error("module '{module}' requires '{dependency}' which is not present")]
    MissingDependency {
        /// The dependent module.
        module: String,
        /// The missing dependency name.
        dependency: String,
    },

    /// A required dependency failed to load or initialize.
    #[error("module '{module}' requires '{dependency}' which failed to load")]
    DependencyFailed {
        /// The dependent module.
        module: String,
        /// The failed dependency name.
        dependency: String,
    },

    /// The required-dependency graph contains a cycle through this module.
    #[error("cyclic required dependency involving module '{0}'")]
    CyclicDependency(String),

    /// The module's init entry point returned failure.
    #[error("module '{0}' failed to initialize")]
    InitFailed(String),

    /// A module with this name is already registered.
    #[error("module '{0}' is already registered")]
    DuplicateModule(String),

    /// No module with this name is registered.
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// Every discovered module failed to load.
    #[error("no modules loaded")]
    NoModulesLoaded,

    /// Manifest parse error.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
