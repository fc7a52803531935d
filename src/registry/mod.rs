//! Capability registry.
//!
//! The scrape directory holds one TOML manifest per module to expose
//! (`nakanime.toml` exposes the `nakanime` module). Scanning resolves each
//! manifest against the compiled [`ModuleCatalog`], classifies every exported
//! capability into an HTTP method and records its route. The registry is
//! built once at startup and never changes afterwards.

pub mod method;


pub use method::HttpMethod;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::scraper::{Capability, ModuleCatalog, ScrapeModule};

/// Extension of module manifests in the scrape directory.
pub const MODULE_EXTENSION: &str = "toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub route: String,
    pub module: String,
    pub function: String,
}

impl RouteDescriptor {
    pub fn new(module: &str, function: &str) -> Self {
        Self {
            method: HttpMethod::classify(function),
            route: route_path(module, function),
            module: module.to_string(),
            function: function.to_string(),
        }
    }
}

pub fn route_path(module: &str, function: &str) -> String {
    format!("/api/{}/{}", module, function)
}

/// A descriptor together with the capability it routes to.
#[derive(Clone)]
pub struct RegisteredRoute {
    pub descriptor: RouteDescriptor,
    pub capability: Arc<dyn Capability>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleManifest {
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    exports: Option<Vec<String>>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    routes: Vec<RegisteredRoute>,
}

impl CapabilityRegistry {
    /// Scans `dir` for module manifests.
    ///
    /// A missing directory is created and yields an empty registry. Modules
    /// that fail to load are logged and skipped. Only failing to create or
    /// list the directory itself is an error.
    pub fn scan(dir: &Path, catalog: &ModuleCatalog) -> Result<Self> {
        if !dir.exists() {
            info!("Scrape directory {:?} not found, creating it", dir);
            fs::create_dir_all(dir).map_err(|e| {
                ScrapeError::Registry(format!("Failed to create scrape directory {:?}: {}", dir, e))
            })?;
            return Ok(Self::default());
        }

        let manifests = Self::manifest_files(dir)?;
        info!("Found {} module manifests in {:?}", manifests.len(), dir);

        let mut registry = Self::default();
        for path in manifests {
            let Some(module_name) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping {:?}: file name is not valid UTF-8", path);
                continue;
            };

            match Self::load_module(&path, module_name, catalog) {
                Ok(Some(exports)) => {
                    info!("Loading {}: {:?}", module_name, exports.iter().map(|c| c.name()).collect::<Vec<_>>());
                    for capability in exports {
                        registry.register(module_name, capability);
                    }
                }
                Ok(None) => info!("Module {} is disabled, skipping", module_name),
                Err(e) => warn!("Error loading {:?}: {}", path, e),
            }
        }

        Ok(registry)
    }

    /// Builds a registry from modules directly, bypassing the directory scan.
    pub fn from_modules<'a>(modules: impl IntoIterator<Item = &'a ScrapeModule>) -> Self {
        let mut registry = Self::default();
        for module in modules {
            for capability in module.exports() {
                registry.register(module.name(), capability.clone());
            }
        }
        registry
    }

    /// Registering the same route twice keeps the later capability.
    fn register(&mut self, module: &str, capability: Arc<dyn Capability>) {
        let descriptor = RouteDescriptor::new(module, capability.name());
        info!("Registering {} {}", descriptor.method, descriptor.route);

        let route = RegisteredRoute {
            descriptor,
            capability,
        };
        match self.routes.iter_mut().find(|r| r.descriptor == route.descriptor) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    /// Regular files with the manifest extension, sorted by file name.
    fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| {
            ScrapeError::Registry(format!("Failed to read scrape directory {:?}: {}", dir, e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(ScrapeError::from)?.path();
            let is_manifest = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(MODULE_EXTENSION);
            if is_manifest {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parses a manifest and resolves its exports. `Ok(None)` for a disabled module.
    fn load_module(
        path: &Path,
        module_name: &str,
        catalog: &ModuleCatalog,
    ) -> Result<Option<Vec<Arc<dyn Capability>>>> {
        let content = fs::read_to_string(path)
            .map_err(|e| ScrapeError::Registry(format!("Failed to read manifest: {}", e)))?;
        let manifest: ModuleManifest = toml::from_str(&content)
            .map_err(|e| ScrapeError::Registry(format!("Failed to parse manifest: {}", e)))?;

        if !manifest.enabled {
            return Ok(None);
        }

        let module = catalog
            .get(module_name)
            .ok_or_else(|| ScrapeError::Registry(format!("no module named '{}'", module_name)))?;

        let Some(names) = manifest.exports else {
            return Ok(Some(module.exports().to_vec()));
        };

        let mut exports: Vec<Arc<dyn Capability>> = Vec::new();
        for name in &names {
            let capability = module.find(name).ok_or_else(|| {
                ScrapeError::Registry(format!("module '{}' does not export '{}'", module_name, name))
            })?;
            if !exports.iter().any(|c| c.name() == name.as_str()) {
                exports.push(capability.clone());
            }
        }

        Ok(Some(exports))
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    pub fn descriptors(&self) -> Vec<RouteDescriptor> {
        self.routes.iter().map(|r| r.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
