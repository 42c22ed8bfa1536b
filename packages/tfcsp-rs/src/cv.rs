//! Stratified k-fold splitting

use crate::error::{DecodingError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Train/test indices of one fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold splitter preserving the class proportions in every fold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    /// Shuffle seed; OS entropy when `None`
    pub seed: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: Option<u64>) -> Self {
        Self {
            n_splits,
            shuffle,
            seed,
        }
    }

    /// Assign every sample to one test fold.
    ///
    /// Samples are sorted by class and dealt round-robin to obtain the
    /// per-fold class counts; within a class, fold slots are then assigned
    /// in sample order, or in shuffled order when `shuffle` is set.
    pub fn split(&self, labels: &[u8]) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(DecodingError::Stratification(format!(
                "at least 2 folds are needed, got {}",
                self.n_splits
            )));
        }
        let mut classes: Vec<u8> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(DecodingError::Stratification(format!(
                "labels contain a single class ({} samples)",
                labels.len()
            )));
        }
        for &class in &classes {
            let count = labels.iter().filter(|&&l| l == class).count();
            if count < self.n_splits {
                return Err(DecodingError::Stratification(format!(
                    "class {} has {} samples, fewer than n_splits={}",
                    class, count, self.n_splits
                )));
            }
        }

        let mut sorted: Vec<u8> = labels.to_vec();
        sorted.sort_unstable();

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut test_fold = vec![0usize; labels.len()];
        for &class in &classes {
            // How many samples of this class each fold receives
            let mut slots = Vec::new();
            for fold in 0..self.n_splits {
                let n = sorted
                    .iter()
                    .skip(fold)
                    .step_by(self.n_splits)
                    .filter(|&&l| l == class)
                    .count();
                slots.extend(std::iter::repeat(fold).take(n));
            }
            if self.shuffle {
                slots.shuffle(&mut rng);
            }
            let members = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == class)
                .map(|(i, _)| i);
            for (i, fold) in members.zip(slots) {
                test_fold[i] = fold;
            }
        }

        Ok((0..self.n_splits)
            .map(|k| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| test_fold[i] == k);
                Fold { train, test }
            })
            .collect())
    }
}
