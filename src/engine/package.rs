//! Package layout on disk: where the manifest lives and which library it names.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::error::{LauncherError, Result};

pub const MANIFEST_FILE_NAME: &str = "minigame.toml";

const LIBRARY_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];

#[derive(Debug, Clone, Deserialize)]
pub struct PackageSection {
    pub name: String,
    /// Library path relative to the manifest; defaults to the platform file name for `name`.
    #[serde(default)]
    pub library: Option<String>,
    /// ABI the package claims to be built for, checked before the library is opened.
    #[serde(default)]
    pub abi_version: Option<u32>,
    /// Primary entry-point type.
    #[serde(default)]
    pub entry: Option<String>,
    /// Service listing of concrete unit type names.
    #[serde(default)]
    pub units: Vec<String>,
}

/// Top-level manifest file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageManifest {
    pub package: PackageSection,
}

impl PackageManifest {
    /// Type names the manifest declares, entry point first.
    pub fn declared_types(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(entry) = self.package.entry.as_deref().map(str::trim) {
            if !entry.is_empty() {
                names.push(entry.to_string());
            }
        }
        names.extend(
            self.package
                .units
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        );
        names
    }
}

/// A package path resolved to its library and optional manifest.
#[derive(Debug, Clone)]
pub struct PackageSource {
    /// Path as given by the caller.
    pub path: PathBuf,
    pub name: String,
    pub library: PathBuf,
    pub manifest: Option<PackageManifest>,
}

impl PackageSource {
    /// Validate `path` and resolve it to a package.
    ///
    /// Accepts a directory holding `minigame.toml`, a manifest file, or a bare
    /// dynamic library.
    pub fn resolve(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            LauncherError::invalid_package(path, format!("cannot access package: {e}"))
        })?;

        if metadata.is_dir() {
            let manifest_path = path.join(MANIFEST_FILE_NAME);
            if !manifest_path.is_file() {
                return Err(LauncherError::invalid_package(
                    path,
                    format!("directory has no {MANIFEST_FILE_NAME}"),
                ));
            }
            return Self::from_manifest(path, &manifest_path);
        }

        match extension(path).as_deref() {
            Some("toml") => Self::from_manifest(path, path),
            Some(ext) if LIBRARY_EXTENSIONS.contains(&ext) => {
                // Surface unreadable files here rather than at dlopen time.
                std::fs::File::open(path).map_err(|e| {
                    LauncherError::invalid_package(path, format!("cannot read library: {e}"))
                })?;
                Ok(Self {
                    path: path.to_path_buf(),
                    name: library_stem(path),
                    library: path.to_path_buf(),
                    manifest: None,
                })
            }
            _ => Err(LauncherError::invalid_package(
                path,
                "expected a package directory, a manifest or a dynamic library",
            )),
        }
    }

    fn from_manifest(path: &Path, manifest_path: &Path) -> Result<Self> {
        let manifest = read_manifest(manifest_path)?;
        let root = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let library = match manifest.package.library.as_deref() {
            Some(rel) => root.join(rel),
            None => root.join(libloading::library_filename(&manifest.package.name)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            name: manifest.package.name.clone(),
            library,
            manifest: Some(manifest),
        })
    }

    pub fn declared_types(&self) -> Vec<String> {
        self.manifest
            .as_ref()
            .map(PackageManifest::declared_types)
            .unwrap_or_default()
    }

    pub fn declared_abi_version(&self) -> Option<u32> {
        self.manifest.as_ref().and_then(|m| m.package.abi_version)
    }
}

/// Parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LauncherError::invalid_package(path, format!("failed to read manifest: {e}"))
    })?;
    let manifest: PackageManifest = toml::from_str(&content).map_err(|e| {
        LauncherError::invalid_package(path, format!("failed to parse manifest: {e}"))
    })?;
    if manifest.package.name.trim().is_empty() {
        return Err(LauncherError::invalid_package(path, "package name is empty"));
    }
    Ok(manifest)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// `libretro_pack.so` -> `retro_pack`.
fn library_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_prefix("lib") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => stem,
    }
}
