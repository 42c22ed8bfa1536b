//! Channel selection, contrast restriction, band-pass and decimation policy.

use crate::error::{DecodingError, Result};
use crate::filters::ButterworthFilter;
use crate::labels::derive_labels;
use crate::types::{ChannelType, Contrast, Datatype, EpochSet, LogContext};

/// Trials of one frequency window with their binary labels
#[derive(Debug, Clone)]
pub struct PreparedEpochs {
    pub epochs: EpochSet,
    pub labels: Vec<u8>,
}

fn good_data_indices(epochs: &EpochSet) -> Vec<usize> {
    epochs
        .channels
        .iter()
        .enumerate()
        .filter(|(_, ch)| !ch.bad && ch.kind.is_data())
        .map(|(i, _)| i)
        .collect()
}

/// Every good MEG/EEG channel, whatever its type
pub fn good_data_channels(epochs: &EpochSet) -> Result<EpochSet> {
    let good = good_data_indices(epochs);
    if good.is_empty() {
        return Err(DecodingError::InvalidParameter(
            "no good MEG/EEG channel in the epochs".to_string(),
        ));
    }
    Ok(epochs.pick(&good))
}

/// Keep the good data channels.
///
/// For MEG data only the magnetometers are kept: gradiometers carry largely
/// redundant information at several times the channel count.
pub fn pick_channels(epochs: &EpochSet, datatype: Datatype) -> Result<EpochSet> {
    let good = good_data_indices(epochs);

    let picked = if datatype == Datatype::Meg {
        let mags: Vec<usize> = good
            .iter()
            .copied()
            .filter(|&i| epochs.channels[i].kind == ChannelType::Mag)
            .collect();
        if mags.is_empty() {
            good
        } else {
            mags
        }
    } else {
        good
    };

    if picked.is_empty() {
        return Err(DecodingError::InvalidParameter(
            "no good MEG/EEG channel left after channel selection".to_string(),
        ));
    }
    Ok(epochs.pick(&picked))
}

/// Drop the trials whose event code belongs to neither condition
pub fn select_contrast(epochs: &EpochSet, contrast: &Contrast) -> EpochSet {
    epochs.select_events(|code| contrast.contains(code))
}

/// Zero-phase Butterworth band-pass of every channel of every trial
pub fn band_pass(epochs: &EpochSet, fmin: f64, fmax: f64, order: usize) -> Result<EpochSet> {
    let filter = ButterworthFilter::bandpass(fmin, fmax, epochs.sfreq, order)?;
    Ok(epochs.map_data(|data| filter.filtfilt_rows(data)))
}

/// Band-limit and label the trials of `contrast` for one frequency window.
///
/// Channels are pruned before filtering since the filter cost scales with
/// the channel count.
pub fn prepare(
    epochs: &EpochSet,
    contrast: &Contrast,
    fmin: f64,
    fmax: f64,
    datatype: Datatype,
    filter_order: usize,
) -> Result<PreparedEpochs> {
    let picked = pick_channels(epochs, datatype)?;
    let selected = select_contrast(&picked, contrast);
    if selected.is_empty() {
        return Err(DecodingError::InvalidParameter(format!(
            "no trial matches contrast {}",
            contrast
        )));
    }
    let filtered = band_pass(&selected, fmin, fmax, filter_order)?;
    let labels = derive_labels(&filtered, contrast)?;
    Ok(PreparedEpochs {
        epochs: filtered,
        labels,
    })
}

/// Largest decimation factor keeping a 3x margin above `max_freq`
pub fn decimation_factor(sfreq: f64, max_freq: f64) -> usize {
    if max_freq <= 0.0 {
        return 1;
    }
    (sfreq / (3.0 * max_freq)).floor().max(1.0) as usize
}

/// Decimate once per subject when quick mode is on and the factor exceeds 2.
///
/// Returns the (possibly) decimated epochs and the factor actually applied.
pub fn maybe_decimate(
    epochs: &EpochSet,
    quick: bool,
    max_freq: f64,
    ctx: &LogContext,
) -> (EpochSet, usize) {
    let factor = decimation_factor(epochs.sfreq, max_freq);
    if quick && factor > 2 {
        log::info!("{} Decimating by a factor {}", ctx, factor);
        (epochs.decimate(factor), factor)
    } else {
        (epochs.clone(), 1)
    }
}
