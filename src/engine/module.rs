//! Loaded modules: the code a package ships and the table of unit types it exports.
//!
//! A plugin crate is built as a `cdylib` against this library and exports its
//! units with [`export_units!`](crate::export_units). The host opens the
//! library through a [`ModuleOpener`] and reads the exported table; nothing is
//! discovered by reflection.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::engine::error::{panic_message, LauncherError, Result};
use crate::engine::plugin::{PluggableUnit, SharedUnit};

/// Bumped whenever `PluggableUnit` or `UnitDeclaration` change shape.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Contract id carried by declarations of pluggable units.
pub const UNIT_CONTRACT: &str = "minigame_launcher::PluggableUnit";

pub const ABI_VERSION_SYMBOL: &str = "minigame_plugin_abi_version";
pub const CATALOG_SYMBOL: &str = "minigame_plugin_catalog";

type AbiVersionFn = unsafe extern "C" fn() -> u32;
pub type CatalogFn = fn() -> Vec<UnitDeclaration>;

/// One exported type, as seen by the discovery loader.
#[derive(Debug, Clone)]
pub struct UnitDeclaration {
    /// Type name, `Outer::Inner` for nested types.
    pub type_name: &'static str,
    /// Contract the type implements; only `UNIT_CONTRACT` types are admitted.
    pub contract: &'static str,
    pub is_abstract: bool,
    /// Accessor returning the type's shared singleton. Preferred over `constructor`.
    pub shared_accessor: Option<fn() -> SharedUnit>,
    pub constructor: Option<fn() -> Box<dyn PluggableUnit>>,
}

fn default_constructor<U: PluggableUnit + Default + 'static>() -> Box<dyn PluggableUnit> {
    Box::new(U::default())
}

impl UnitDeclaration {
    /// A conforming unit type with no way to build it yet.
    pub const fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            contract: UNIT_CONTRACT,
            is_abstract: false,
            shared_accessor: None,
            constructor: None,
        }
    }

    /// A conforming unit type built through `Default`.
    pub fn unit<U: PluggableUnit + Default + 'static>(type_name: &'static str) -> Self {
        Self::new(type_name).with_constructor(default_constructor::<U>)
    }

    pub const fn abstract_unit(type_name: &'static str) -> Self {
        let mut decl = Self::new(type_name);
        decl.is_abstract = true;
        decl
    }

    /// A type the module exports for some other contract.
    pub const fn foreign(type_name: &'static str, contract: &'static str) -> Self {
        let mut decl = Self::new(type_name);
        decl.contract = contract;
        decl
    }

    pub fn with_shared_accessor(mut self, accessor: fn() -> SharedUnit) -> Self {
        self.shared_accessor = Some(accessor);
        self
    }

    pub fn with_constructor(mut self, constructor: fn() -> Box<dyn PluggableUnit>) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn is_nested(&self) -> bool {
        self.type_name.contains("::")
    }

    /// Last path segment of the type name.
    pub fn simple_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }

    pub fn conforms(&self) -> bool {
        self.contract == UNIT_CONTRACT
    }
}

/// Export the given unit declarations from a plugin `cdylib`.
///
/// ```ignore
/// minigame_launcher::export_units![
///     UnitDeclaration::unit::<PongGame>("PongGame"),
///     UnitDeclaration::abstract_unit("BallGame"),
/// ];
/// ```
#[macro_export]
macro_rules! export_units {
    ($($decl:expr),* $(,)?) => {
        #[no_mangle]
        pub extern "C" fn minigame_plugin_abi_version() -> u32 {
            $crate::engine::module::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        pub fn minigame_plugin_catalog() -> ::std::vec::Vec<$crate::engine::module::UnitDeclaration> {
            ::std::vec![$($decl),*]
        }
    };
}

/// Code opened from a package. Must stay alive while any unit it produced is reachable.
pub trait LoadedModule: Send {
    fn location(&self) -> &Path;

    fn abi_version(&self) -> u32;

    /// Every type the module exports, nested ones included.
    fn catalog(&self) -> Result<Vec<UnitDeclaration>>;
}

/// Opens a package's library into a [`LoadedModule`].
pub trait ModuleOpener: Send + Sync {
    fn open(&self, library: &Path) -> Result<Box<dyn LoadedModule>>;
}

fn read_catalog(location: &Path, catalog: CatalogFn) -> Result<Vec<UnitDeclaration>> {
    catch_unwind(AssertUnwindSafe(catalog)).map_err(|payload| {
        LauncherError::invalid_package(
            location,
            format!("export table panicked: {}", panic_message(payload)),
        )
    })
}

// ---------------------------------------------------------------------------
// Native dynamic libraries
// ---------------------------------------------------------------------------

/// Opens packages as native dynamic libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleOpener;

pub struct NativeModule {
    location: PathBuf,
    abi_version: u32,
    catalog: CatalogFn,
    // Dropped last; `catalog` points into it.
    _library: Library,
}

impl ModuleOpener for NativeModuleOpener {
    fn open(&self, library: &Path) -> Result<Box<dyn LoadedModule>> {
        if !library.is_file() {
            return Err(LauncherError::invalid_package(
                library,
                "library file not found",
            ));
        }

        // SAFETY: Loading a package runs its initializers; packages are trusted.
        let lib = unsafe { Library::new(library) }.map_err(|e| {
            LauncherError::invalid_package(library, format!("failed to open library: {e}"))
        })?;

        // SAFETY: Symbol type matches the signature emitted by `export_units!`.
        let abi_version = unsafe {
            let symbol: Symbol<AbiVersionFn> =
                lib.get(ABI_VERSION_SYMBOL.as_bytes()).map_err(|e| {
                    LauncherError::invalid_package(
                        library,
                        format!("missing `{ABI_VERSION_SYMBOL}`: {e}"),
                    )
                })?;
            symbol()
        };

        // Only read the Rust-ABI table once the versions agree.
        if abi_version != PLUGIN_ABI_VERSION {
            return Err(LauncherError::incompatible_binary(
                library,
                abi_version,
                PLUGIN_ABI_VERSION,
            ));
        }

        // SAFETY: ABI version checked above; the table signature is part of that ABI.
        let catalog = unsafe {
            let symbol: Symbol<CatalogFn> = lib.get(CATALOG_SYMBOL.as_bytes()).map_err(|e| {
                LauncherError::invalid_package(library, format!("missing `{CATALOG_SYMBOL}`: {e}"))
            })?;
            *symbol
        };

        tracing::debug!(library = %library.display(), abi_version, "opened native module");
        Ok(Box::new(NativeModule {
            location: library.to_path_buf(),
            abi_version,
            catalog,
            _library: lib,
        }))
    }
}

impl LoadedModule for NativeModule {
    fn location(&self) -> &Path {
        &self.location
    }

    fn abi_version(&self) -> u32 {
        self.abi_version
    }

    fn catalog(&self) -> Result<Vec<UnitDeclaration>> {
        read_catalog(&self.location, self.catalog)
    }
}

// ---------------------------------------------------------------------------
// Statically linked modules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct StaticEntry {
    abi_version: u32,
    catalog: CatalogFn,
}

/// Resolves packages against export tables linked into the host at build time,
/// keyed by library file name.
#[derive(Debug, Default, Clone)]
pub struct StaticModuleOpener {
    modules: HashMap<String, StaticEntry>,
}

struct StaticModule {
    location: PathBuf,
    entry: StaticEntry,
}

impl StaticModuleOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, library: &str, catalog: CatalogFn) -> Self {
        self.with_versioned_module(library, PLUGIN_ABI_VERSION, catalog)
    }

    pub fn with_versioned_module(mut self, library: &str, abi_version: u32, catalog: CatalogFn) -> Self {
        self.modules
            .insert(library.to_string(), StaticEntry { abi_version, catalog });
        self
    }
}

impl ModuleOpener for StaticModuleOpener {
    fn open(&self, library: &Path) -> Result<Box<dyn LoadedModule>> {
        let name = library
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = self.modules.get(&name).copied().ok_or_else(|| {
            LauncherError::invalid_package(library, format!("no linked module named `{name}`"))
        })?;
        if entry.abi_version != PLUGIN_ABI_VERSION {
            return Err(LauncherError::incompatible_binary(
                library,
                entry.abi_version,
                PLUGIN_ABI_VERSION,
            ));
        }
        Ok(Box::new(StaticModule {
            location: library.to_path_buf(),
            entry,
        }))
    }
}

impl LoadedModule for StaticModule {
    fn location(&self) -> &Path {
        &self.location
    }

    fn abi_version(&self) -> u32 {
        self.entry.abi_version
    }

    fn catalog(&self) -> Result<Vec<UnitDeclaration>> {
        read_catalog(&self.location, self.entry.catalog)
    }
}
