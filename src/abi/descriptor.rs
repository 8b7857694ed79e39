//! Plugin metadata layouts for the C-compatible ABI.
//!
//! [`RawPluginDescriptor`] is the exact wire shape a module's
//! `plugin_get_info` returns; [`PluginDescriptor`] is the owned host-side
//! mirror used by the resolver and registry once the raw form has been
//! validated and copied out.

use super::{ABI_VERSION, DependencyKind, MAX_DEPENDENCIES, Priority};
use crate::error::{Error, Result};
use std::ffi::{CStr, c_char};

// ============================================================================
// Raw layouts
// ============================================================================

/// One dependency slot in the embedded descriptor array.
///
/// A slot with a null (or empty) `name` terminates the list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawDependency {
    /// Null-terminated dependency name, or null for an empty slot.
    pub name: *const c_char,
    /// Dependency kind: 0 = required, 1 = optional.
    pub kind: u8,
}

// SAFETY: RawDependency only ever points at static, immutable module
// metadata; the pointers are never written through.
unsafe impl Send for RawDependency {}
unsafe impl Sync for RawDependency {}

impl RawDependency {
    /// An empty (terminator) slot.
    pub const EMPTY: Self = Self {
        name: std::ptr::null(),
        kind: 0,
    };

    /// Whether this slot terminates the dependency list.
    ///
    /// # Safety
    ///
    /// A non-null `name` must point to a valid null-terminated string.
    pub unsafe fn is_terminator(&self) -> bool {
        if self.name.is_null() {
            return true;
        }
        // SAFETY: Caller guarantees non-null names are valid C strings.
        unsafe { *self.name == 0 }
    }
}

/// Identity and requirements of one module, in its fixed binary shape.
///
/// Returned by a module's `plugin_get_info` entry point as a pointer to
/// static data; the host reads it once at discovery and never writes it.
#[repr(C)]
pub struct RawPluginDescriptor {
    /// Null-terminated module name.
    pub name: *const c_char,
    /// Null-terminated module version string.
    pub version: *const c_char,
    /// ABI version the module was built against; must equal
    /// [`ABI_VERSION`](super::ABI_VERSION).
    pub abi_version: u32,
    /// Load priority tier: 0 = first, 1 = default, 2 = later.
    pub priority: i8,
    /// Explicit padding; keeps `dependencies` at a stable offset.
    pub _pad: [u8; 3],
    /// Embedded dependency list, terminated by the first empty slot.
    pub dependencies: [RawDependency; MAX_DEPENDENCIES],
}

// SAFETY: RawPluginDescriptor contains only raw pointers to static module
// metadata, which the host treats as read-only.
unsafe impl Send for RawPluginDescriptor {}
unsafe impl Sync for RawPluginDescriptor {}

/// Copy a short dependency slice into the fixed-capacity embedded array.
///
/// Intended for static descriptor construction (see
/// [`declare_plugin!`](crate::declare_plugin)); fails the build when the
/// slice exceeds the ABI capacity.
pub const fn pad_dependencies(deps: &[RawDependency]) -> [RawDependency; MAX_DEPENDENCIES] {
    assert!(deps.len() <= MAX_DEPENDENCIES, "too many dependencies");
    let mut out = [RawDependency::EMPTY; MAX_DEPENDENCIES];
    let mut i = 0;
    while i < deps.len() {
        out[i] = deps[i];
        i += 1;
    }
    out
}

// ============================================================================
// Owned mirror
// ============================================================================

/// A reference by name to another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the module depended on.
    pub name: String,
    /// Whether its absence or failure blocks the dependent.
    pub kind: DependencyKind,
}

impl Dependency {
    /// Create a required dependency.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Required,
        }
    }

    /// Create an optional dependency.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Optional,
        }
    }
}

/// Owned host-side plugin metadata.
///
/// Read once at discovery and immutable thereafter.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Module name; the identity used by dependencies and the registry.
    pub name: String,
    /// Module version string (informational).
    pub version: String,
    /// ABI version the module was built against.
    pub abi_version: u32,
    /// Load priority tier.
    pub priority: Priority,
    /// Declared dependencies, in declaration order.
    pub dependencies: Vec<Dependency>,
}

impl PluginDescriptor {
    /// Create a descriptor for the current ABI version with no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            abi_version: ABI_VERSION,
            priority: Priority::Default,
            dependencies: Vec::new(),
        }
    }

    /// Set the priority tier.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Append a dependency.
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Validate the descriptor against the host's ABI expectations.
    ///
    /// Checks the ABI version, a non-empty name, and the dependency
    /// capacity bound.
    pub fn validate(&self) -> Result<()> {
        if self.abi_version != ABI_VERSION {
            return Err(Error::AbiMismatch {
                expected: ABI_VERSION,
                actual: self.abi_version,
            });
        }
        if self.name.is_empty() {
            return Err(Error::InvalidDescriptor("module name is empty"));
        }
        if self.dependencies.len() > MAX_DEPENDENCIES {
            return Err(Error::TooManyDependencies {
                count: self.dependencies.len(),
                limit: MAX_DEPENDENCIES,
            });
        }
        Ok(())
    }

    /// Copy a raw descriptor into its owned form.
    ///
    /// Dependency slots are read up to the first terminator. This performs
    /// structural checks (null/non-UTF-8 strings, unknown enum bytes) but
    /// not the ABI version gate; callers combine it with [`validate`].
    ///
    /// [`validate`]: PluginDescriptor::validate
    ///
    /// # Safety
    ///
    /// All non-null pointers in `raw` must reference valid null-terminated
    /// strings that outlive the call.
    pub unsafe fn from_raw(raw: &RawPluginDescriptor) -> Result<Self> {
        // SAFETY: Caller guarantees the string pointers are valid.
        let name = unsafe { read_str(raw.name) }?
            .ok_or(Error::InvalidDescriptor("module name is null"))?;
        // SAFETY: As above.
        let version = unsafe { read_str(raw.version) }?
            .ok_or(Error::InvalidDescriptor("module version is null"))?;

        let priority = Priority::from_raw(raw.priority)
            .ok_or(Error::InvalidDescriptor("unknown priority value"))?;

        let mut dependencies = Vec::new();
        for slot in &raw.dependencies {
            // SAFETY: As above.
            if unsafe { slot.is_terminator() } {
                break;
            }
            // SAFETY: As above; terminator check rules out null.
            let dep_name = unsafe { read_str(slot.name) }?
                .ok_or(Error::InvalidDescriptor("dependency name is null"))?;
            let kind = DependencyKind::from_raw(slot.kind)
                .ok_or(Error::InvalidDescriptor("unknown dependency kind"))?;
            dependencies.push(Dependency {
                name: dep_name,
                kind,
            });
        }

        Ok(Self {
            name,
            version,
            abi_version: raw.abi_version,
            priority,
            dependencies,
        })
    }
}

/// Read an optional C string into an owned `String`.
///
/// # Safety
///
/// A non-null `ptr` must reference a valid null-terminated string.
unsafe fn read_str(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    // SAFETY: Caller guarantees validity of non-null pointers.
    let cstr = unsafe { CStr::from_ptr(ptr) };
    cstr.to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| Error::InvalidDescriptor("string is not valid UTF-8"))
}
