//! Dynamic module loading using libloading.

use super::PluginModule;
use crate::abi::{
    ABI_VERSION, PLUGIN_GET_INFO_SYMBOL, PLUGIN_INIT_SYMBOL, PLUGIN_SHUTDOWN_SYMBOL,
    PluginDescriptor, PluginGetInfoFn, PluginInitFn, PluginShutdownFn,
};
use crate::error::{Error, Result};
use crate::host::ModuleHost;
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A module loaded from a shared library.
///
/// Holds the library to keep its code mapped; dropping a `LoadedModule`
/// unloads the library, so it must outlive any callback the module has left
/// registered.
pub struct LoadedModule {
    /// The loaded library (kept alive).
    _library: Library,
    /// Owned copy of the module's metadata, validated at load time.
    descriptor: PluginDescriptor,
    init_fn: PluginInitFn,
    shutdown_fn: PluginShutdownFn,
    path: PathBuf,
}

// SAFETY: The raw entry points are plain function pointers into the mapped
// library, which lives as long as this struct; nothing here aliases mutably.
unsafe impl Send for LoadedModule {}

impl LoadedModule {
    /// Filesystem path the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PluginModule for LoadedModule {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&mut self, host: &Arc<ModuleHost>) -> bool {
        // SAFETY: The entry point was resolved from a successfully loaded
        // library, and the vtable pointer is valid for the host's lifetime.
        unsafe { (self.init_fn)(host.raw_vtable()) }
    }

    fn shutdown(&mut self) {
        // SAFETY: As above; the driver calls this once, after a successful
        // init.
        unsafe { (self.shutdown_fn)() }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.descriptor.name)
            .field("version", &self.descriptor.version)
            .field("path", &self.path)
            .finish()
    }
}

/// Loader for module shared libraries.
pub struct ModuleLoader {
    /// Search paths for modules, in lookup order.
    search_paths: Vec<PathBuf>,
}

impl ModuleLoader {
    /// Create a loader with the default search paths.
    pub fn new() -> Self {
        Self {
            search_paths: vec![PathBuf::from("./plugins"), PathBuf::from(".")],
        }
    }

    /// Add a search path for modules.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Load a module from a specific path.
    ///
    /// Resolves the three required entry points, reads the descriptor, and
    /// gates on the ABI version. `init` is *not* called; the lifecycle
    /// driver does that once load order is resolved.
    ///
    /// # Safety
    ///
    /// Loading executes arbitrary code from the shared library. The module
    /// must export the documented entry points with the documented
    /// signatures, and `plugin_get_info` must return a stable pointer to
    /// valid static metadata.
    pub unsafe fn load_from_path(&self, path: impl AsRef<Path>) -> Result<LoadedModule> {
        let path = path.as_ref();

        // SAFETY: Loading a dynamic library; caller ensures it is trusted.
        let library =
            unsafe { Library::new(path) }.map_err(|e| Error::LoadFailed(e.to_string()))?;

        // SAFETY: Resolving symbols from the library just loaded. The raw
        // function pointers are copied out and stay valid while `library`
        // is held by the returned module.
        let (get_info, init_fn, shutdown_fn) = unsafe {
            let get_info: Symbol<PluginGetInfoFn> = library
                .get(PLUGIN_GET_INFO_SYMBOL)
                .map_err(|_| Error::MissingEntryPoint("plugin_get_info"))?;
            let init: Symbol<PluginInitFn> = library
                .get(PLUGIN_INIT_SYMBOL)
                .map_err(|_| Error::MissingEntryPoint("plugin_init"))?;
            let shutdown: Symbol<PluginShutdownFn> = library
                .get(PLUGIN_SHUTDOWN_SYMBOL)
                .map_err(|_| Error::MissingEntryPoint("plugin_shutdown"))?;
            (*get_info, *init, *shutdown)
        };

        // SAFETY: Calling the metadata entry point; caller guarantees it
        // returns null or a valid static descriptor.
        let raw = unsafe { get_info() };
        if raw.is_null() {
            return Err(Error::NullDescriptor);
        }

        // SAFETY: Non-null descriptor from a trusted module; read once.
        let descriptor = unsafe { PluginDescriptor::from_raw(&*raw) }?;
        if descriptor.abi_version != ABI_VERSION {
            return Err(Error::AbiMismatch {
                expected: ABI_VERSION,
                actual: descriptor.abi_version,
            });
        }
        descriptor.validate()?;

        tracing::debug!(
            module = %descriptor.name,
            version = %descriptor.version,
            path = %path.display(),
            "loaded module library"
        );

        Ok(LoadedModule {
            _library: library,
            descriptor,
            init_fn,
            shutdown_fn,
            path: path.to_path_buf(),
        })
    }

    /// Load a module by name, searching all search paths.
    ///
    /// The name is tried verbatim, then with the platform's shared-library
    /// prefix and suffix (`libNAME.so`, `NAME.dll`, ...).
    ///
    /// # Safety
    ///
    /// See [`load_from_path`](ModuleLoader::load_from_path).
    pub unsafe fn load_by_name(&self, name: &str) -> Result<LoadedModule> {
        let decorated = format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            name,
            std::env::consts::DLL_SUFFIX
        );

        for search_path in &self.search_paths {
            for candidate in [name, decorated.as_str()] {
                let path = search_path.join(candidate);
                if path.exists() {
                    // SAFETY: Caller guarantees modules on the search path
                    // are trusted.
                    return unsafe { self.load_from_path(&path) };
                }
            }
        }

        Err(Error::LoadFailed(format!(
            "module '{name}' not found in search paths"
        )))
    }

    /// Load every shared library in a directory.
    ///
    /// Returns one result per candidate file, in directory order.
    ///
    /// # Safety
    ///
    /// See [`load_from_path`](ModuleLoader::load_from_path).
    pub unsafe fn load_all_from_dir(&self, dir: impl AsRef<Path>) -> Vec<Result<LoadedModule>> {
        let dir = dir.as_ref();
        let mut modules = Vec::new();

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_library = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e, "so" | "dll" | "dylib"));
                if is_library {
                    // SAFETY: Caller guarantees everything in the directory
                    // is trusted.
                    modules.push(unsafe { self.load_from_path(&path) });
                }
            }
        }

        modules
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("search_paths", &self.search_paths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_default_search_paths() {
        let loader = ModuleLoader::new();
        assert!(!loader.search_paths.is_empty());
    }

    #[test]
    fn test_load_nonexistent_module() {
        let loader = ModuleLoader::new();
        let result = unsafe { loader.load_by_name("no_such_module_xyz") };
        assert!(matches!(result, Err(Error::LoadFailed(_))));
    }

    #[test]
    fn test_load_non_library_path() {
        let loader = ModuleLoader::new();
        let result = unsafe { loader.load_from_path("Cargo.toml") };
        assert!(matches!(result, Err(Error::LoadFailed(_))));
    }
}
