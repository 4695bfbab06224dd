use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::{FileCache, SharedCache};

/// Top-level configuration from `gauge.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub coupling: CouplingOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Analyzer kinds or capability tags to run.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
}

fn default_metrics() -> Vec<String> {
    vec![
        "loc".to_string(),
        "class-level".to_string(),
        "cohesion".to_string(),
        "coupling".to_string(),
    ]
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".gauge/cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_cache_dir(),
        }
    }
}

/// Options of the package coupling analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingOptions {
    /// Package names left out of coupling analysis.
    #[serde(default)]
    pub exclude_packages: Vec<String>,
}

/// Typed options handed to analyzer constructors.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    pub cache: Option<SharedCache>,
    pub coupling: CouplingOptions,
}

impl AnalyzerOptions {
    /// Build options from loosely typed `key -> value` pairs, as collected
    /// from command-line flags. Keys nobody understands are ignored.
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        Self::default().with_options(options)
    }

    /// Layer `key -> value` pairs over these options.
    ///
    /// `cache-dir` replaces the cache with a file cache, `no-cache` drops any
    /// cache and wins over `cache-dir`, and `coupling-exclude` adds a comma
    /// separated list of packages to the exclusions.
    pub fn with_options(mut self, options: &HashMap<String, String>) -> Self {
        let cache_disabled = options
            .get("no-cache")
            .is_some_and(|v| v.is_empty() || v == "true" || v == "1");
        if cache_disabled {
            self.cache = None;
        } else if let Some(dir) = options.get("cache-dir") {
            let cache: SharedCache = Rc::new(RefCell::new(FileCache::new(dir)));
            self.cache = Some(cache);
        }
        if let Some(excluded) = options.get("coupling-exclude") {
            for name in excluded.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.coupling.exclude_packages.iter().any(|p| p == name) {
                    self.coupling.exclude_packages.push(name.to_string());
                }
            }
        }
        self
    }

    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl Config {
    /// Load configuration from a `gauge.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `gauge init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `gauge.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        Self::discover(dir).0
    }

    /// Like [`Config::load_or_default`], also returning the file that was
    /// loaded. A file that fails to parse is reported and yields defaults.
    pub fn discover(dir: &Path) -> (Self, Option<PathBuf>) {
        let Some(config_path) = Self::find(dir) else {
            return (Self::default(), None);
        };
        match Self::load(&config_path) {
            Ok(config) => (config, Some(config_path)),
            Err(e) => {
                tracing::warn!(
                    path = %config_path.display(),
                    "failed to load config: {e:#}; using defaults"
                );
                (Self::default(), None)
            }
        }
    }

    /// The nearest `gauge.toml` in `dir` or one of its ancestors.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        start
            .ancestors()
            .map(|ancestor| ancestor.join("gauge.toml"))
            .find(|candidate| candidate.is_file())
    }

    /// Analyzer options for this configuration. A relative cache directory
    /// is resolved against `base`.
    pub fn analyzer_options(&self, base: &Path) -> AnalyzerOptions {
        let cache = self.cache.enabled.then(|| {
            let dir = if self.cache.directory.is_absolute() {
                self.cache.directory.clone()
            } else {
                base.join(&self.cache.directory)
            };
            let cache: SharedCache = Rc::new(RefCell::new(FileCache::new(dir)));
            cache
        });
        AnalyzerOptions {
            cache,
            coupling: self.coupling.clone(),
        }
    }

    /// Generate default TOML content for `gauge init`.
    pub fn default_toml() -> String {
        r#"# gauge - object-oriented metrics configuration

[analysis]
# Analyzer kinds (loc, cyclomatic, node-count, class-level, cohesion, coupling)
# or capability tags (node-metrics, project-metrics, aggregate, cycles)
metrics = ["loc", "class-level", "cohesion", "coupling"]

[cache]
# Persist per-node results between runs, invalidated by content hash
enabled = false
directory = ".gauge/cache"

[coupling]
# Packages left out of afferent/efferent coupling
exclude_packages = []
"#
        .to_string()
    }
}
