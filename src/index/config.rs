//! HNSW index configuration.

use crate::error::IndexError;

/// Configuration parameters for an HNSW index.
///
/// # Parameters
///
/// * `m` - Maximum number of connections per node in layers above 0.
///   Typical values: 16-64. Higher values give better recall but use more
///   memory.
///
/// * `m_max0` - Maximum number of connections in layer 0 (the densest
///   layer). Typically `2 * m`.
///
/// * `ef_construction` - Beam width during index construction. Higher values
///   give better index quality but slower construction. Typical: 100-500.
///
/// * `ef_search` - Default beam width during search, overridable per query.
///   Typical values: 10-500.
///
/// * `ml` - Level multiplier for the exponential layer distribution.
///   Typically `1 / ln(m)`.
///
/// * `seed` - Optional seed for the layer-assignment RNG. Two builds with the
///   same seed and insertion order produce identical graphs; unseeded
///   configurations draw a seed from the clock.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HnswConfig {
    /// Maximum number of connections per node above layer 0 (M parameter).
    pub m: usize,
    /// Maximum connections in layer 0 (typically 2 * M).
    pub m_max0: usize,
    /// Beam width for construction.
    pub ef_construction: usize,
    /// Default beam width for search.
    pub ef_search: usize,
    /// Level multiplier (1 / ln(M)).
    pub ml: f64,
    /// Optional RNG seed for reproducible layer assignment.
    pub seed: Option<u64>,
}

impl HnswConfig {
    /// Create a new HNSW configuration with the specified M parameter.
    ///
    /// Other parameters are set to sensible defaults:
    /// - `m_max0` = 2 * m
    /// - `ef_construction` = 200
    /// - `ef_search` = 50
    /// - `ml` = 1 / ln(m)
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // m is small (16-64), no precision loss
    pub fn new(m: usize) -> Self {
        let ml = if m > 1 { 1.0 / (m as f64).ln() } else { 1.0 };
        Self { m, m_max0: m * 2, ef_construction: 200, ef_search: 50, ml, seed: None }
    }

    /// Set the beam width for construction.
    #[must_use]
    pub const fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Set the default beam width for search.
    #[must_use]
    pub const fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    /// Set the maximum connections in layer 0.
    #[must_use]
    pub const fn with_m_max0(mut self, m_max0: usize) -> Self {
        self.m_max0 = m_max0;
        self
    }

    /// Fix the layer-assignment RNG seed for reproducible builds.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The neighbor cap for a given layer.
    #[inline]
    #[must_use]
    pub fn cap_at(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when any parameter is outside its legal range. Bad
    /// configuration is fatal at creation time and never recovered.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.m < 1 {
            return Err(IndexError::InvalidConfig("m must be at least 1".into()));
        }
        if self.m_max0 < self.m {
            return Err(IndexError::InvalidConfig("m_max0 must be at least m".into()));
        }
        if self.ef_construction < 1 {
            return Err(IndexError::InvalidConfig("ef_construction must be at least 1".into()));
        }
        if self.ef_search < 1 {
            return Err(IndexError::InvalidConfig("ef_search must be at least 1".into()));
        }
        if !self.ml.is_finite() || self.ml <= 0.0 {
            return Err(IndexError::InvalidConfig("ml must be positive and finite".into()));
        }
        Ok(())
    }
}

impl Default for HnswConfig {
    /// M=16 is a good balance between recall and speed.
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.m_max0, 32);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert!((config.ml - 1.0 / 16_f64.ln()).abs() < 1e-10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = HnswConfig::new(32)
            .with_ef_construction(400)
            .with_ef_search(100)
            .with_m_max0(48)
            .with_seed(7);

        assert_eq!(config.m, 32);
        assert_eq!(config.m_max0, 48);
        assert_eq!(config.ef_construction, 400);
        assert_eq!(config.ef_search, 100);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn layer_caps() {
        let config = HnswConfig::new(8);
        assert_eq!(config.cap_at(0), 16);
        assert_eq!(config.cap_at(1), 8);
        assert_eq!(config.cap_at(5), 8);
    }

    #[test]
    fn zero_m_is_rejected() {
        let config = HnswConfig { m: 0, ..HnswConfig::default() };
        assert!(matches!(config.validate(), Err(IndexError::InvalidConfig(_))));
    }
}
