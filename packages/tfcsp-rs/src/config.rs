use crate::error::{DecodingError, Result};
use crate::types::Datatype;
use serde::{Deserialize, Serialize};

/// Covariance regularization used by CSP
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regularization {
    /// Empirical covariance
    #[default]
    None,
    /// Fixed shrinkage towards a scaled identity, in [0, 1]
    Shrinkage(f64),
    /// Ledoit-Wolf optimal shrinkage
    LedoitWolf,
}

/// Where the PCA basis is fitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaBasis {
    /// Once per subject on the broadband, full-time trials
    #[default]
    Subject,
    /// Once per frequency window on the band-passed, full-time trials
    Band,
    /// No dimensionality reduction
    Off,
}

/// Decoding and statistics parameters shared by every task of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingConfig {
    #[serde(default)]
    pub datatype: Datatype,

    /// Decimate before the grid loop when the sampling rate allows it
    #[serde(default)]
    pub csp_quick: bool,

    #[serde(default = "default_n_components")]
    pub csp_n_components: usize,

    #[serde(default)]
    pub csp_reg: Regularization,

    #[serde(default)]
    pub csp_pca: PcaBasis,

    #[serde(default = "default_n_splits")]
    pub decoding_n_splits: usize,

    #[serde(default = "default_true")]
    pub csp_shuffle_cv: bool,

    /// Seed for CV shuffling, bootstrap and permutations (None = OS entropy)
    #[serde(default = "default_random_state")]
    pub random_state: Option<u64>,

    #[serde(default = "default_n_boot")]
    pub n_boot: usize,

    #[serde(default = "default_n_permutations")]
    pub n_permutations: usize,

    /// Alpha of the t-distribution threshold forming clusters
    #[serde(default = "default_alpha")]
    pub cluster_t_dist_alpha_thres: f64,

    /// Alpha at which a cluster p-value counts as significant
    #[serde(default = "default_alpha")]
    pub cluster_stats_alpha: f64,

    /// Butterworth order of each band edge
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    #[serde(default)]
    pub parallel_permutations: bool,
}

fn default_n_components() -> usize {
    4
}
fn default_n_splits() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_random_state() -> Option<u64> {
    Some(42)
}
fn default_n_boot() -> usize {
    5000
}
fn default_n_permutations() -> usize {
    10000
}
fn default_alpha() -> f64 {
    0.05
}
fn default_filter_order() -> usize {
    4
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            datatype: Datatype::default(),
            csp_quick: false,
            csp_n_components: default_n_components(),
            csp_reg: Regularization::default(),
            csp_pca: PcaBasis::default(),
            decoding_n_splits: default_n_splits(),
            csp_shuffle_cv: true,
            random_state: default_random_state(),
            n_boot: default_n_boot(),
            n_permutations: default_n_permutations(),
            cluster_t_dist_alpha_thres: default_alpha(),
            cluster_stats_alpha: default_alpha(),
            filter_order: default_filter_order(),
            parallel_permutations: false,
        }
    }
}

impl DecodingConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DecodingError::InvalidParameter(msg));

        if self.csp_n_components == 0 {
            return invalid("csp_n_components must be at least 1".to_string());
        }
        if self.decoding_n_splits < 2 {
            return invalid(format!(
                "decoding_n_splits must be at least 2, got {}",
                self.decoding_n_splits
            ));
        }
        if let Regularization::Shrinkage(a) = self.csp_reg {
            if !(0.0..=1.0).contains(&a) {
                return invalid(format!("csp_reg shrinkage must be in [0, 1], got {}", a));
            }
        }
        if self.n_boot == 0 {
            return invalid("n_boot must be at least 1".to_string());
        }
        if self.n_permutations == 0 {
            return invalid("n_permutations must be at least 1".to_string());
        }
        for (name, alpha) in [
            ("cluster_t_dist_alpha_thres", self.cluster_t_dist_alpha_thres),
            ("cluster_stats_alpha", self.cluster_stats_alpha),
        ] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return invalid(format!("{} must be in (0, 1), got {}", name, alpha));
            }
        }
        if self.filter_order == 0 || self.filter_order > 10 {
            return invalid(format!(
                "filter_order must be between 1 and 10, got {}",
                self.filter_order
            ));
        }
        Ok(())
    }

    /// Seed for CV splits; `None` when shuffling is off or no seed is set
    pub fn cv_seed(&self) -> Option<u64> {
        if self.csp_shuffle_cv {
            self.random_state
        } else {
            None
        }
    }
}
