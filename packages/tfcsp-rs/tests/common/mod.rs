#![allow(dead_code)]

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::Mutex;
use tfcsp_rs::{
    ChannelInfo, ChannelType, ConditionGroup, Contrast, DecodingConfig, Epoch, EpochSet,
    FrequencyTimeGrid, GroupResult, LogContext, ReportSink, ScoreArtifact,
};

pub const SFREQ: f64 = 100.0;
pub const N_TIMES: usize = 200;

/// Event code 1 trials carry a 10 Hz oscillation on channel 0, event code 2
/// trials on channel 1; every channel has uniform noise in [-1, 1].
pub fn synthetic_epochs(seed: u64, n_trials: usize) -> EpochSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let channels = (0..4)
        .map(|i| ChannelInfo::new(format!("EEG{:03}", i + 1), ChannelType::Eeg))
        .collect();
    let epochs = (0..n_trials)
        .map(|i| {
            let code = if i % 2 == 0 { 1 } else { 2 };
            let loud = (code - 1) as usize;
            let phase = rng.random_range(0.0..2.0 * PI);
            let data = DMatrix::from_fn(4, N_TIMES, |r, t| {
                let noise = rng.random_range(-1.0..1.0);
                if r == loud {
                    let time = t as f64 / SFREQ;
                    noise + 3.0 * (2.0 * PI * 10.0 * time + phase).sin()
                } else {
                    noise
                }
            });
            Epoch::new(code, data)
        })
        .collect();
    EpochSet::new(SFREQ, 0.0, channels, epochs).unwrap()
}

pub fn contrast() -> Contrast {
    Contrast::new(
        ConditionGroup::new("Famous", [1]),
        ConditionGroup::new("Scrambled", [2]),
    )
}

/// 8-12, 12-30 and 30-45 Hz by two 0.9 s windows
pub fn grid() -> FrequencyTimeGrid {
    FrequencyTimeGrid::new(vec![8.0, 12.0, 30.0, 45.0], vec![0.0, 0.9, 1.8]).unwrap()
}

pub fn fast_config() -> DecodingConfig {
    DecodingConfig {
        csp_n_components: 2,
        n_boot: 200,
        n_permutations: 200,
        ..DecodingConfig::default()
    }
}

/// Records which products reached the report
#[derive(Default)]
pub struct RecordingReport {
    pub subjects: Mutex<Vec<String>>,
    pub groups: Mutex<Vec<String>>,
}

impl ReportSink for RecordingReport {
    fn subject_scores(&self, ctx: &LogContext, _grid: &FrequencyTimeGrid, _a: &ScoreArtifact) {
        self.subjects.lock().unwrap().push(ctx.to_string());
    }

    fn group_results(&self, ctx: &LogContext, _grid: &FrequencyTimeGrid, _r: &GroupResult) {
        self.groups.lock().unwrap().push(ctx.to_string());
    }
}
