use crate::error::{PartitionError, Result};
use crate::types::{Contrast, EpochSet};
use std::collections::BTreeSet;

/// Project each trial's event code onto a binary label for `contrast`.
///
/// Group codes are restricted to the codes actually present in `epochs`, so a
/// contrast only fails for overlaps that would mislabel a real trial.
/// Returns 0 for the first group and 1 for the second, in trial order.
pub fn derive_labels(epochs: &EpochSet, contrast: &Contrast) -> Result<Vec<u8>> {
    let present: BTreeSet<i32> = epochs.epochs.iter().map(|e| e.event_code).collect();
    let first: BTreeSet<i32> = present
        .iter()
        .copied()
        .filter(|&c| contrast.first.contains(c))
        .collect();
    let second: BTreeSet<i32> = present
        .iter()
        .copied()
        .filter(|&c| contrast.second.contains(c))
        .collect();

    let error_fields = |code: i32| {
        (
            code,
            contrast.first.name.clone(),
            first.iter().copied().collect::<Vec<_>>(),
            contrast.second.name.clone(),
            second.iter().copied().collect::<Vec<_>>(),
        )
    };

    let mut labels = Vec::with_capacity(epochs.len());
    for epoch in &epochs.epochs {
        let code = epoch.event_code;
        match (first.contains(&code), second.contains(&code)) {
            (true, true) => {
                let (code, first, first_codes, second, second_codes) = error_fields(code);
                return Err(PartitionError::Overlap {
                    code,
                    first,
                    first_codes,
                    second,
                    second_codes,
                }
                .into());
            }
            (true, false) => labels.push(0),
            (false, true) => labels.push(1),
            (false, false) => {
                let (code, first, first_codes, second, second_codes) = error_fields(code);
                return Err(PartitionError::Unmatched {
                    code,
                    first,
                    first_codes,
                    second,
                    second_codes,
                }
                .into());
            }
        }
    }
    Ok(labels)
}
