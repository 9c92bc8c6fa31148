//! Discovery loader: admits the games shipped in an external package.
//!
//! For each package the loader opens its library, gathers candidate types from
//! the manifest (entry point, then service listing) and from the module's
//! export table, instantiates every conforming concrete candidate and
//! registers it under a derived, collision-free id. A package that yields no
//! games is released and reported as `NoCompatibleUnits`.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::error::{panic_message, LauncherError, Result};
use crate::engine::module::{
    LoadedModule, ModuleOpener, NativeModuleOpener, UnitDeclaration, PLUGIN_ABI_VERSION,
};
use crate::engine::package::PackageSource;
use crate::engine::plugin::SharedUnit;
use crate::engine::registry::GameRegistry;

const GAME_SUFFIX: &str = "game";

/// Summary of a package that stayed loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub location: PathBuf,
    /// Ids registered from this package.
    pub units: Vec<String>,
}

/// Exclusive owner of a package's loaded module.
struct LoadedPackageHandle {
    info: PackageInfo,
    _module: Box<dyn LoadedModule>,
}

/// Why a single candidate was passed over. Never fatal to the load.
#[derive(Debug)]
enum Skip {
    Missing,
    Abstract,
    NonConforming(&'static str),
    NotConstructible,
    Failed(LauncherError),
}

pub struct DiscoveryLoader {
    registry: Arc<GameRegistry>,
    opener: Box<dyn ModuleOpener>,
    packages: Mutex<Vec<LoadedPackageHandle>>,
}

impl DiscoveryLoader {
    /// Loader that opens packages as native dynamic libraries.
    pub fn new(registry: Arc<GameRegistry>) -> Self {
        Self::with_opener(registry, NativeModuleOpener)
    }

    pub fn with_opener(registry: Arc<GameRegistry>, opener: impl ModuleOpener + 'static) -> Self {
        Self {
            registry,
            opener: Box::new(opener),
            packages: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<GameRegistry> {
        &self.registry
    }

    /// Load every compatible game in the package at `path`.
    /// Returns the display names of the games that were registered.
    pub fn load_from_package(&self, path: &Path) -> Result<Vec<String>> {
        let source = PackageSource::resolve(path)?;
        if let Some(declared) = source.declared_abi_version() {
            if declared != PLUGIN_ABI_VERSION {
                return Err(LauncherError::incompatible_binary(
                    path,
                    declared,
                    PLUGIN_ABI_VERSION,
                ));
            }
        }

        let module = self.opener.open(&source.library)?;
        let catalog = module.catalog()?;
        let candidates = collect_candidates(&source.declared_types(), &catalog);
        tracing::debug!(
            package = %source.name,
            exported = catalog.len(),
            candidates = candidates.len(),
            "scanning package"
        );

        let mut ids = Vec::new();
        let mut display_names = Vec::new();
        for (type_name, decl) in candidates {
            let admitted = decl
                .ok_or(Skip::Missing)
                .and_then(|decl| instantiate(decl).map(|unit| (decl, unit)))
                .and_then(|(decl, unit)| self.admit(decl.simple_name(), unit).map_err(Skip::Failed));
            match admitted {
                Ok((id, display_name)) => {
                    tracing::info!(package = %source.name, id = %id, unit = %type_name, "registered external game");
                    ids.push(id);
                    display_names.push(display_name);
                }
                Err(Skip::Failed(e)) => {
                    tracing::warn!(package = %source.name, unit = %type_name, error = %e, "skipping candidate");
                }
                Err(Skip::NonConforming(contract)) => {
                    tracing::debug!(package = %source.name, unit = %type_name, contract, "ignoring candidate for another contract");
                }
                Err(reason) => {
                    tracing::debug!(package = %source.name, unit = %type_name, ?reason, "ignoring candidate");
                }
            }
        }

        if display_names.is_empty() {
            // Dropping `module` here releases the library; nothing it produced was kept.
            return Err(LauncherError::NoCompatibleUnits {
                path: path.to_path_buf(),
            });
        }

        self.packages.lock().push(LoadedPackageHandle {
            info: PackageInfo {
                name: source.name,
                location: module.location().to_path_buf(),
                units: ids,
            },
            _module: module,
        });
        Ok(display_names)
    }

    /// Derive an id and register `unit`, retrying if a concurrent registration takes the id.
    fn admit(&self, simple_name: &str, unit: SharedUnit) -> Result<(String, String)> {
        let base = strip_game_suffix(simple_name);
        let display_name = display_name_for(base);
        loop {
            let id = self.registry.available_id(base)?;
            match self.registry.register_external(&id, &display_name, unit.clone()) {
                Ok(()) => return Ok((id, display_name)),
                Err(LauncherError::DuplicateIdentifier { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Packages kept loaded, in load order.
    pub fn loaded_packages(&self) -> Vec<PackageInfo> {
        self.packages.lock().iter().map(|h| h.info.clone()).collect()
    }
}

impl Drop for DiscoveryLoader {
    fn drop(&mut self) {
        // Units from these modules may still be held by the registry or a caller,
        // so their code must stay mapped for the rest of the process.
        for handle in self.packages.get_mut().drain(..) {
            std::mem::forget(handle);
        }
    }
}

/// Candidate type names in discovery order, each paired with its declaration if the module
/// exports it. Manifest names come first; the scan adds top-level exports. Names are unique.
fn collect_candidates<'a>(
    declared: &[String],
    catalog: &'a [UnitDeclaration],
) -> Vec<(String, Option<&'a UnitDeclaration>)> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for name in declared {
        if seen.insert(name.clone()) {
            let decl = catalog.iter().find(|d| d.type_name == name.as_str());
            candidates.push((name.clone(), decl));
        }
    }
    for decl in catalog.iter().filter(|d| !d.is_nested()) {
        if seen.insert(decl.type_name.to_string()) {
            candidates.push((decl.type_name.to_string(), Some(decl)));
        }
    }
    candidates
}

/// Build one instance, preferring the shared accessor over the constructor.
fn instantiate(decl: &UnitDeclaration) -> std::result::Result<SharedUnit, Skip> {
    if decl.is_abstract {
        return Err(Skip::Abstract);
    }
    if !decl.conforms() {
        return Err(Skip::NonConforming(decl.contract));
    }
    let built = if let Some(accessor) = decl.shared_accessor {
        catch_unwind(accessor)
    } else if let Some(constructor) = decl.constructor {
        catch_unwind(AssertUnwindSafe(|| Arc::new(Mutex::new(constructor()))))
    } else {
        return Err(Skip::NotConstructible);
    };
    built.map_err(|payload| {
        Skip::Failed(LauncherError::instantiation(
            decl.type_name,
            panic_message(payload),
        ))
    })
}

/// `PongGame` -> `Pong`. Names that are only the suffix are kept as is.
pub fn strip_game_suffix(simple_name: &str) -> &str {
    let name = simple_name.trim();
    let cut = name.len().saturating_sub(GAME_SUFFIX.len());
    if name.len() > GAME_SUFFIX.len()
        && name.is_char_boundary(cut)
        && name[cut..].eq_ignore_ascii_case(GAME_SUFFIX)
    {
        &name[..cut]
    } else {
        name
    }
}

/// Split at lowercase-to-uppercase boundaries: `SpaceInvaders` -> `Space Invaders`.
pub fn display_name_for(base: &str) -> String {
    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if prev_lower && c.is_uppercase() {
            out.push(' ');
        }
        out.push(c);
        prev_lower = c.is_lowercase();
    }
    out.trim().to_string()
}
