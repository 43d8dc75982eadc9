//! Versioned function catalogs and subset sampling.
//!
//! A [`FunctionCatalog`] is a static, read-only list of callable-function
//! descriptors with unique names. Built-in versions ship embedded in the
//! crate ([`FunctionCatalog::builtin`]); callers can also load their own
//! descriptor sets from JSON.
//!
//! For each generation request a subset of the catalog is drawn to build
//! the "available functions" context: [`FunctionCatalog::sampler`] draws a
//! count from a configurable probability distribution (Beta(α=1.4, β=5) by
//! default, rescaled to `[min, max]` and rounded) and then samples that
//! many descriptors without replacement. No order is guaranteed; callers
//! typically [`shuffle`] for presentation before rendering.
//!
//! Nothing here holds global state: catalogs are explicit values and every
//! sampling call takes the RNG as an argument.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// Embedded catalog documents, keyed by version tag.
const BUILTIN_CATALOGS: [(&str, &str); 2] = [
    ("v1", include_str!("../data/functions_v1.json")),
    ("v2", include_str!("../data/functions_v2.json")),
];

/// An immutable callable-function descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Unique function name within a catalog.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON-schema-like parameter specification, kept as raw JSON.
    pub parameters: serde_json::Value,
}

/// A versioned, read-only set of function descriptors with unique names.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCatalog {
    version: String,
    functions: Vec<FunctionDescriptor>,
}

impl FunctionCatalog {
    /// Loads an embedded catalog by version tag.
    ///
    /// # Errors
    ///
    /// [`TraceError::UnknownCatalogVersion`] for unrecognized tags.
    pub fn builtin(version: &str) -> Result<Self, TraceError> {
        let (_, document) = BUILTIN_CATALOGS
            .iter()
            .find(|(tag, _)| *tag == version)
            .ok_or_else(|| TraceError::UnknownCatalogVersion {
                version: version.to_owned(),
            })?;
        Self::from_json(version, document)
    }

    /// Parses a catalog from a JSON array of descriptors.
    ///
    /// # Errors
    ///
    /// [`TraceError::InvalidCatalog`] if the document does not parse or
    /// contains duplicate function names.
    pub fn from_json(version: &str, document: &str) -> Result<Self, TraceError> {
        let functions: Vec<FunctionDescriptor> = serde_json::from_str(document)
            .map_err(|e| TraceError::InvalidCatalog(format!("catalog {version}: {e}")))?;
        Self::from_descriptors(version, functions)
    }

    /// Builds a catalog from already-parsed descriptors.
    ///
    /// # Errors
    ///
    /// [`TraceError::InvalidCatalog`] on duplicate function names.
    pub fn from_descriptors(
        version: &str,
        functions: Vec<FunctionDescriptor>,
    ) -> Result<Self, TraceError> {
        let mut seen = HashSet::new();
        for f in &functions {
            if !seen.insert(f.name.as_str()) {
                return Err(TraceError::InvalidCatalog(format!(
                    "catalog {version}: duplicate function name {:?}",
                    f.name
                )));
            }
        }
        Ok(Self {
            version: version.to_owned(),
            functions,
        })
    }

    /// The catalog's version tag.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The descriptors, in catalog order.
    pub fn descriptors(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if the catalog holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Builds a subset sampler over this catalog.
    ///
    /// Bounds and distribution parameters are validated here, at
    /// construction, not at sampling time.
    ///
    /// # Errors
    ///
    /// [`TraceError::Configuration`] if `min_count < 1`,
    /// `min_count > max_count`, `max_count > self.len()`, or the
    /// distribution parameters are invalid.
    pub fn sampler(
        &self,
        min_count: usize,
        max_count: usize,
        distribution: CountDistribution,
    ) -> Result<SubsetSampler<'_>, TraceError> {
        if min_count < 1 {
            return Err(TraceError::Configuration(
                "min_count must be at least 1".into(),
            ));
        }
        if min_count > max_count {
            return Err(TraceError::Configuration(format!(
                "min_count ({min_count}) exceeds max_count ({max_count})"
            )));
        }
        if max_count > self.len() {
            return Err(TraceError::Configuration(format!(
                "max_count ({max_count}) exceeds catalog size ({})",
                self.len()
            )));
        }
        let dist = match distribution {
            CountDistribution::Uniform => DistKind::Uniform,
            CountDistribution::Beta { alpha, beta } => {
                let beta = rand_distr::Beta::new(alpha, beta).map_err(|e| {
                    TraceError::Configuration(format!(
                        "invalid Beta parameters (alpha={alpha}, beta={beta}): {e}"
                    ))
                })?;
                DistKind::Beta(beta)
            }
        };
        Ok(SubsetSampler {
            catalog: self,
            min_count,
            max_count,
            dist,
        })
    }
}

/// Probability distribution for the subset size draw.
///
/// The raw draw lands in `[0, 1]` and is rescaled to the sampler's
/// `[min_count, max_count]` interval, then rounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountDistribution {
    /// Uniform over `[0, 1]`.
    Uniform,
    /// Beta distribution; the default skews toward small subsets.
    Beta {
        /// Alpha shape parameter.
        alpha: f64,
        /// Beta shape parameter.
        beta: f64,
    },
}

impl Default for CountDistribution {
    fn default() -> Self {
        Self::Beta {
            alpha: 1.4,
            beta: 5.0,
        }
    }
}

/// Validated distribution, ready to draw from.
#[derive(Debug, Clone, Copy)]
enum DistKind {
    Uniform,
    Beta(rand_distr::Beta<f64>),
}

/// Draws catalog subsets: a distribution-driven count, then that many
/// descriptors without replacement.
///
/// Built by [`FunctionCatalog::sampler`]; borrows the catalog it samples
/// from.
#[derive(Debug, Clone)]
pub struct SubsetSampler<'a> {
    catalog: &'a FunctionCatalog,
    min_count: usize,
    max_count: usize,
    dist: DistKind,
}

impl SubsetSampler<'_> {
    /// Draws one subset. The result has between `min_count` and
    /// `max_count` descriptors, all distinct, in no guaranteed order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<FunctionDescriptor> {
        let raw = match self.dist {
            DistKind::Uniform => rng.random::<f64>(),
            DistKind::Beta(beta) => beta.sample(rng),
        };
        // Rescale [0, 1] to [min, max] and round to the nearest count.
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (raw * (self.max_count - self.min_count) as f64 + self.min_count as f64)
            .round() as usize;
        let count = count.clamp(self.min_count, self.max_count);

        rand::seq::index::sample(rng, self.catalog.len(), count)
            .into_iter()
            .map(|i| self.catalog.functions[i].clone())
            .collect()
    }
}

/// Shuffles descriptors in place for presentation.
///
/// Subset sampling guarantees no order; callers shuffle independently so
/// the rendered "available functions" list carries no positional signal.
pub fn shuffle<R: Rng + ?Sized>(descriptors: &mut [FunctionDescriptor], rng: &mut R) {
    descriptors.shuffle(rng);
}

/// Encodes descriptors as the single-line compact JSON array the prompt
/// template expects.
///
/// # Errors
///
/// [`TraceError::InvalidCatalog`] if serialization fails (descriptors with
/// plain JSON parameter values never do).
pub fn to_compact_json(descriptors: &[FunctionDescriptor]) -> Result<String, TraceError> {
    serde_json::to_string(descriptors).map_err(|e| TraceError::InvalidCatalog(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_versions_load() {
        let v1 = FunctionCatalog::builtin("v1").expect("v1 is embedded");
        assert_eq!(v1.version(), "v1");
        assert!(v1.len() >= 4);
        assert!(v1.descriptors().iter().any(|f| f.name == "get_local_weather"));

        let v2 = FunctionCatalog::builtin("v2").expect("v2 is embedded");
        assert!(v2.descriptors().iter().any(|f| f.name == "get_random_joke"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = FunctionCatalog::builtin("v99").unwrap_err();
        match err {
            TraceError::UnknownCatalogVersion { version } => assert_eq!(version, "v99"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let document = r#"[
            {"name": "a", "description": "", "parameters": {}},
            {"name": "a", "description": "", "parameters": {}}
        ]"#;
        let err = FunctionCatalog::from_json("dup", document).unwrap_err();
        assert!(matches!(err, TraceError::InvalidCatalog(_)));
    }

    #[test]
    fn test_sampler_validates_at_construction() {
        let catalog = FunctionCatalog::builtin("v1").expect("embedded");
        let too_many = catalog.len() + 1;

        assert!(matches!(
            catalog.sampler(1, too_many, CountDistribution::default()),
            Err(TraceError::Configuration(_))
        ));
        assert!(matches!(
            catalog.sampler(0, 3, CountDistribution::default()),
            Err(TraceError::Configuration(_))
        ));
        assert!(matches!(
            catalog.sampler(4, 2, CountDistribution::default()),
            Err(TraceError::Configuration(_))
        ));
        assert!(matches!(
            catalog.sampler(1, 3, CountDistribution::Beta { alpha: -1.0, beta: 5.0 }),
            Err(TraceError::Configuration(_))
        ));
    }

    #[test]
    fn test_sample_bounds_and_uniqueness() {
        let catalog = FunctionCatalog::builtin("v1").expect("embedded");
        let mut rng = rand::rng();

        for distribution in [
            CountDistribution::Uniform,
            CountDistribution::default(),
            CountDistribution::Beta { alpha: 5.0, beta: 1.2 },
        ] {
            let sampler = catalog
                .sampler(1, catalog.len(), distribution)
                .expect("valid sampler");
            for _ in 0..1000 {
                let subset = sampler.sample(&mut rng);
                assert!((1..=catalog.len()).contains(&subset.len()));
                let names: HashSet<_> = subset.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names.len(), subset.len(), "duplicate names in subset");
            }
        }
    }

    #[test]
    fn test_sample_degenerate_interval() {
        let catalog = FunctionCatalog::builtin("v1").expect("embedded");
        let sampler = catalog
            .sampler(3, 3, CountDistribution::default())
            .expect("valid sampler");
        let mut rng = rand::rng();
        for _ in 0..10 {
            assert_eq!(sampler.sample(&mut rng).len(), 3);
        }
    }

    #[test]
    fn test_shuffle_preserves_set() {
        let catalog = FunctionCatalog::builtin("v1").expect("embedded");
        let mut shuffled = catalog.descriptors().to_vec();
        let mut rng = rand::rng();
        shuffle(&mut shuffled, &mut rng);

        let before: HashSet<_> = catalog.descriptors().iter().map(|f| &f.name).collect();
        let after: HashSet<_> = shuffled.iter().map(|f| &f.name).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_compact_json_is_single_line() {
        let catalog = FunctionCatalog::builtin("v1").expect("embedded");
        let json = to_compact_json(catalog.descriptors()).expect("serializable");
        assert!(!json.contains('\n'));

        let back: Vec<FunctionDescriptor> = serde_json::from_str(&json).expect("round trip");
        assert_eq!(back.len(), catalog.len());
    }
}
