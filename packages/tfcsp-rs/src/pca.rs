//! Rank selection and PCA basis
//!
//! The basis is fitted on full-length trials and then applied unchanged to
//! every time-window crop, assuming the leading-variance directions are
//! stable across sub-windows.

use crate::error::{DecodingError, Result};
use crate::linalg::{concat_covariance, sorted_eigen};
use crate::types::{ChannelType, EpochSet};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Upper bound on the PCA rank, reached mostly by single-modality EEG
pub const MAX_RANK: usize = 100;

/// Relative eigenvalue tolerance for the numerical rank
const RANK_TOL: f64 = 1e-10;

/// Numerical rank of a channel covariance matrix, at least 1
pub fn covariance_rank(cov: &DMatrix<f64>) -> Result<usize> {
    let (values, _) = sorted_eigen(cov.clone())?;
    let max = values.first().copied().unwrap_or(0.0);
    if max <= 0.0 {
        return Ok(1);
    }
    Ok(values.iter().filter(|&&v| v > max * RANK_TOL).count().max(1))
}

/// Numerical rank of the channel covariance of trials concatenated along time
pub fn estimate_rank(trials: &[&DMatrix<f64>]) -> Result<usize> {
    let (cov, _, _) = concat_covariance(trials)?;
    covariance_rank(&cov)
}

/// Rank of each channel-type group present in `epochs`
pub fn rank_per_channel_type(epochs: &EpochSet) -> Result<BTreeMap<ChannelType, usize>> {
    let data = epochs.data();
    let (cov, _, _) = concat_covariance(&data)?;

    let mut ranks = BTreeMap::new();
    for kind in epochs.channel_types() {
        let idx: Vec<usize> = epochs
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect();
        let sub = DMatrix::from_fn(idx.len(), idx.len(), |r, c| cov[(idx[r], idx[c])]);
        ranks.insert(kind, covariance_rank(&sub)?);
    }
    Ok(ranks)
}

/// Smallest per-type rank, capped at [`MAX_RANK`]
pub fn select_rank(epochs: &EpochSet) -> Result<usize> {
    let ranks = rank_per_channel_type(epochs)?;
    let rank = ranks.values().copied().min().unwrap_or(1);
    Ok(rank.clamp(1, MAX_RANK))
}

/// Linear projection onto the leading principal components of the channels
#[derive(Debug, Clone)]
pub struct Pca {
    mean: DVector<f64>,
    /// rank x n_channels
    components: DMatrix<f64>,
    explained_variance: Vec<f64>,
}

impl Pca {
    /// Fit on trials concatenated along time
    pub fn fit(trials: &[&DMatrix<f64>], rank: usize) -> Result<Self> {
        let (cov, mean, _) = concat_covariance(trials)?;
        let n_channels = cov.nrows();
        if rank == 0 {
            return Err(DecodingError::InvalidParameter(
                "PCA rank must be at least 1".to_string(),
            ));
        }
        let rank = rank.min(n_channels);
        let (values, vectors) = sorted_eigen(cov)?;
        let components = DMatrix::from_fn(rank, n_channels, |r, c| vectors[(c, r)]);
        Ok(Self {
            mean,
            components,
            explained_variance: values[..rank].to_vec(),
        })
    }

    pub fn rank(&self) -> usize {
        self.components.nrows()
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Project one channels x times trial to rank x times
    pub fn transform(&self, trial: &DMatrix<f64>) -> DMatrix<f64> {
        let mut centered = trial.clone();
        for mut col in centered.column_iter_mut() {
            col -= &self.mean;
        }
        &self.components * centered
    }

    /// Project every trial of a set, keeping event codes and time axis
    pub fn transform_all(&self, trials: &[&DMatrix<f64>]) -> Vec<DMatrix<f64>> {
        trials.iter().map(|t| self.transform(t)).collect()
    }

    /// Rotate without removing the fitted mean.
    ///
    /// Used for band-passed data projected on a broadband basis: the
    /// high-pass already removed the offset the broadband mean describes.
    pub fn project(&self, trial: &DMatrix<f64>) -> DMatrix<f64> {
        &self.components * trial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelInfo, Epoch};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// `n_sources` independent ramps mixed into `n_channels` channels
    fn low_rank_set(kind: ChannelType, n_channels: usize, n_sources: usize) -> EpochSet {
        let channels = (0..n_channels)
            .map(|i| ChannelInfo::new(format!("CH{:03}", i), kind))
            .collect();
        let epochs = (0..4)
            .map(|e| {
                let data = DMatrix::from_fn(n_channels, 64, |r, t| {
                    (0..n_sources)
                        .map(|s| {
                            let source = ((t * (s + 2) + e * 5 + s * s) % 11) as f64 - 5.0;
                            source * ((r + 1) * (s + 1) % 7 + 1) as f64
                        })
                        .sum()
                });
                Epoch::new(1, data)
            })
            .collect();
        EpochSet::new(100.0, 0.0, channels, epochs).unwrap()
    }

    #[test]
    fn test_rank_of_mixed_sources() {
        let set = low_rank_set(ChannelType::Eeg, 8, 3);
        assert_eq!(estimate_rank(&set.data()).unwrap(), 3);
        assert_eq!(select_rank(&set).unwrap(), 3);
    }

    #[test]
    fn test_rank_takes_minimum_over_channel_types() {
        let mut set = low_rank_set(ChannelType::Mag, 6, 5);
        // Channels 0 and 1 become gradiometers: their pair has rank at most 2
        set.channels[0].kind = ChannelType::Grad;
        set.channels[1].kind = ChannelType::Grad;
        let ranks = rank_per_channel_type(&set).unwrap();
        assert!(ranks[&ChannelType::Grad] <= 2);
        assert_eq!(select_rank(&set).unwrap(), ranks.values().copied().min().unwrap());
    }

    #[test]
    fn test_rank_is_capped_and_positive() {
        let n = 120;
        let channels = (0..n)
            .map(|i| ChannelInfo::new(format!("EEG{:03}", i), ChannelType::Eeg))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let epochs = (0..3)
            .map(|_| Epoch::new(1, DMatrix::from_fn(n, 200, |_, _| rng.random_range(-1.0..1.0))))
            .collect();
        let set = EpochSet::new(100.0, 0.0, channels, epochs).unwrap();
        assert_eq!(select_rank(&set).unwrap(), MAX_RANK);

        let silent = EpochSet::new(
            100.0,
            0.0,
            vec![ChannelInfo::new("EEG001", ChannelType::Eeg)],
            vec![Epoch::new(1, DMatrix::zeros(1, 10))],
        )
        .unwrap();
        assert_eq!(select_rank(&silent).unwrap(), 1);
    }

    #[test]
    fn test_pca_projects_onto_leading_components() {
        let set = low_rank_set(ChannelType::Eeg, 8, 2);
        let data = set.data();
        let pca = Pca::fit(&data, 2).unwrap();
        assert_eq!(pca.rank(), 2);
        let projected = pca.transform(data[0]);
        assert_eq!(projected.shape(), (2, 64));
        assert!(pca.explained_variance()[0] >= pca.explained_variance()[1]);

        // Two components capture all the variance of a rank-2 signal
        let recon_energy: f64 = pca
            .transform_all(&data)
            .iter()
            .map(|p| p.norm_squared())
            .sum();
        let (_, mean, _) = concat_covariance(&data).unwrap();
        let total_energy: f64 = data
            .iter()
            .map(|t| {
                let mut c = (*t).clone();
                for mut col in c.column_iter_mut() {
                    col -= &mean;
                }
                c.norm_squared()
            })
            .sum();
        assert!((recon_energy - total_energy).abs() / total_energy < 1e-8);
    }

    #[test]
    fn test_basis_is_reused_on_crops() {
        let set = low_rank_set(ChannelType::Eeg, 6, 3);
        let pca = Pca::fit(&set.data(), 3).unwrap();
        let cropped = set.crop(0.1, 0.3).unwrap();
        let projected = pca.transform(&cropped.epochs[0].data);
        assert_eq!(projected.shape(), (3, cropped.n_times()));
    }
}
