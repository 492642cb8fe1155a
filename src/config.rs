//! Bridge options loaded from YAML.
//!
//! ```yaml
//! tracking_frame: imu4
//! lookup_transform_timeout_sec: 0.2
//! cache_duration_sec: 10.0
//! ```
//!
//! Missing keys fall back to the defaults below.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::common::duration_from_secs_saturating;

const DEFAULT_TRACKING_FRAME: &str = "base_link";
const DEFAULT_LOOKUP_TRANSFORM_TIMEOUT_SEC: f64 = 0.2;
const DEFAULT_CACHE_DURATION_SEC: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeOptions {
    /// Frame every sensor frame is related to.
    pub tracking_frame: String,
    /// Upper bound on how long a lookup may wait for missing data.
    pub lookup_transform_timeout_sec: f64,
    /// History kept per frame in the transform buffer.
    pub cache_duration_sec: f64,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            tracking_frame: DEFAULT_TRACKING_FRAME.to_string(),
            lookup_transform_timeout_sec: DEFAULT_LOOKUP_TRANSFORM_TIMEOUT_SEC,
            cache_duration_sec: DEFAULT_CACHE_DURATION_SEC,
        }
    }
}

impl BridgeOptions {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(yaml).context("Failed to parse bridge options")?;
        options.validate()?;
        Ok(options)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let options: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse bridge options from {:?}", path))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracking_frame.is_empty() {
            bail!("tracking_frame must not be empty");
        }
        if self.tracking_frame.starts_with('/') {
            bail!(
                "tracking_frame \"{}\" must not start with '/'",
                self.tracking_frame
            );
        }
        if Duration::try_from_secs_f64(self.lookup_transform_timeout_sec).is_err() {
            bail!(
                "lookup_transform_timeout_sec must be a non-negative number of seconds \
                 a Duration can hold, got {}",
                self.lookup_transform_timeout_sec
            );
        }
        let cache_duration = Duration::try_from_secs_f64(self.cache_duration_sec);
        if !cache_duration.is_ok_and(|d| !d.is_zero()) {
            bail!(
                "cache_duration_sec must be a positive number of seconds \
                 a Duration can hold, got {}",
                self.cache_duration_sec
            );
        }
        Ok(())
    }

    /// Saturates instead of panicking when the fields were changed after
    /// validation.
    pub fn lookup_transform_timeout(&self) -> Duration {
        duration_from_secs_saturating(self.lookup_transform_timeout_sec)
    }

    pub fn cache_duration(&self) -> Duration {
        duration_from_secs_saturating(self.cache_duration_sec)
    }
}
