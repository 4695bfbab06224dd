//! Metric analyzers.
//!
//! | analyzer | depends on | node metrics |
//! |---|---|---|
//! | [`LocAnalyzer`] | - | `loc`, `cloc`, `eloc`, `ncloc` (+ project totals) |
//! | [`CyclomaticAnalyzer`] | - | `ccn`, `ccn2` |
//! | [`NodeCountAnalyzer`] | - | `nom` (types), `noc`, `noi`, `nom`, `nof` (packages) |
//! | [`ClassLevelAnalyzer`] | cyclomatic | `dit`, `impl`, `wmc`, `wmci`, `wmcnp`, `cis`, `csz`, `vars`, `varsi`, `varsnp`, `nomnp`, `bovr`, `bur`, `nas`, `pnas` |
//! | [`CohesionAnalyzer`] | class-level, node-count | `nma`, `lcomCK`, `lcomHS`, `lcomCG`, `tcc` |
//! | [`CouplingAnalyzer`] | - | `cc`, `ac`, `ca`, `ce`, `a`, `i`, `d` |

mod class_level;
mod cohesion;
mod coupling;
mod cyclomatic;
mod loc;
mod node_count;

pub use class_level::ClassLevelAnalyzer;
pub use cohesion::CohesionAnalyzer;
pub use coupling::{CouplingAnalyzer, PackageStats};
pub use cyclomatic::CyclomaticAnalyzer;
pub use loc::LocAnalyzer;
pub use node_count::NodeCountAnalyzer;

use tracing::{debug, warn};

use crate::analyzer::Metrics;
use crate::cache::{compute_hash, CacheScope, SharedCache};
use crate::types::{NodeId, SourceSpan, Token};

pub(crate) fn to_metrics<const N: usize>(pairs: [(&str, f64); N]) -> Metrics {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Hash of everything a per-node computation reads.
pub(crate) fn content_hash(span: SourceSpan, tokens: &[Token]) -> String {
    let mut content = format!("{span}\n");
    for token in tokens {
        content.push_str(&format!("{:?}@{}:{}\n", token.kind, token.start_line, token.text));
    }
    compute_hash(&content)
}

/// Best-effort wrapper around an optional result cache. Driver failures are
/// logged and treated as misses so a broken cache never aborts a run.
pub(crate) struct NodeCache<'a> {
    cache: Option<&'a SharedCache>,
    namespace: &'static str,
}

impl<'a> NodeCache<'a> {
    pub(crate) fn new(cache: Option<&'a SharedCache>, namespace: &'static str) -> Self {
        Self { cache, namespace }
    }

    pub(crate) fn restore(&self, id: NodeId, hash: &str) -> Option<Metrics> {
        let cache = self.cache?;
        let mut driver = cache.borrow_mut();
        let scope = CacheScope::new(&mut *driver, self.namespace);
        match scope.restore(&id.to_string(), Some(hash)) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(metrics) => {
                    debug!(namespace = self.namespace, node = %id, "cache hit");
                    Some(metrics)
                }
                Err(e) => {
                    warn!(namespace = self.namespace, node = %id, "discarding cache entry: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(namespace = self.namespace, node = %id, "cache restore failed: {e}");
                None
            }
        }
    }

    pub(crate) fn store(&self, id: NodeId, hash: &str, metrics: &Metrics) {
        let Some(cache) = self.cache else {
            return;
        };
        let value = match serde_json::to_value(metrics) {
            Ok(value) => value,
            Err(e) => {
                warn!(namespace = self.namespace, node = %id, "cannot encode metrics: {e}");
                return;
            }
        };
        let mut driver = cache.borrow_mut();
        let mut scope = CacheScope::new(&mut *driver, self.namespace);
        if let Err(e) = scope.store(&id.to_string(), value, Some(hash)) {
            warn!(namespace = self.namespace, node = %id, "cache store failed: {e}");
        }
    }

    /// Restore `id` or compute and store it.
    pub(crate) fn get_or_compute(
        &self,
        id: NodeId,
        hash: impl FnOnce() -> String,
        compute: impl FnOnce() -> Metrics,
    ) -> Metrics {
        if self.cache.is_none() {
            return compute();
        }
        let hash = hash();
        if let Some(metrics) = self.restore(id, &hash) {
            return metrics;
        }
        let metrics = compute();
        self.store(id, &hash, &metrics);
        metrics
    }
}

/// Ratio that reports 0 for an empty denominator.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
