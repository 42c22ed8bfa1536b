//! Run configuration file: decoding parameters, grid edges, contrasts and
//! the subjects/sessions to process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tfcsp_rs::{Contrast, DecodingConfig, FrequencyTimeGrid};

/// A contrast given either explicitly or as two condition names resolved
/// against the `event_id` map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContrastSpec {
    Named(String, String),
    Explicit(Contrast),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub decoding: DecodingConfig,

    /// Frequency bin edges in Hz
    pub freqs: Vec<f64>,

    /// Time bin edges in seconds
    pub times: Vec<f64>,

    #[serde(default)]
    pub contrasts: Vec<ContrastSpec>,

    /// Event name (with `/`-separated tags) to event code
    #[serde(default)]
    pub event_id: Option<BTreeMap<String, i32>>,

    #[serde(default)]
    pub subjects: Vec<String>,

    #[serde(default)]
    pub sessions: Vec<String>,
}

impl RunConfig {
    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.is_file() {
            return Err(format!("Config file not found: {}", path.display()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
        Self::from_json(&text)
            .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        cfg.decoding.validate().map_err(|e| e.to_string())?;
        Ok(cfg)
    }

    pub fn grid(&self) -> Result<FrequencyTimeGrid, String> {
        FrequencyTimeGrid::new(self.freqs.clone(), self.times.clone()).map_err(|e| e.to_string())
    }

    pub fn contrasts(&self) -> Result<Vec<Contrast>, String> {
        self.contrasts
            .iter()
            .map(|spec| match spec {
                ContrastSpec::Explicit(contrast) => Ok(contrast.clone()),
                ContrastSpec::Named(first, second) => {
                    let event_id = self.event_id.as_ref().ok_or_else(|| {
                        format!(
                            "contrast [{}, {}] names conditions but no event_id map is given",
                            first, second
                        )
                    })?;
                    Contrast::from_event_id(event_id, first, second).map_err(|e| e.to_string())
                }
            })
            .collect()
    }

    /// Command-line sessions win over the configured ones; none means a
    /// single session-less slot per subject
    pub fn sessions(&self, cli: Option<&[String]>) -> Vec<Option<String>> {
        cli.unwrap_or(self.sessions.as_slice())
            .iter()
            .map(|s| Some(s.clone()))
            .collect()
    }
}
