use serde::{Deserialize, Serialize};

use crate::error::AimError;

/// All tunable numeric knobs for a simulation run. Read once at `Simulator::new` and frozen;
/// there's deliberately no setter on `Simulator` for any of these fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub steps_per_second: f64,
    pub speed_limit: f64,
    pub max_braking: f64,
    pub min_acceleration: f64,
    pub max_vehicle_length: f64,
    pub length_buffer_factor: f64,
    /// Threshold below 1.0 a tile's summed confirmed probability must stay under. Zero for the
    /// deterministic grid used in every test scenario in this crate.
    #[serde(default)]
    pub rejection_threshold: f64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            steps_per_second: 60.0,
            speed_limit: 15.0,
            max_braking: -2.5,
            min_acceleration: 3.0,
            max_vehicle_length: 5.5,
            length_buffer_factor: 0.1,
            rejection_threshold: 0.0,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let text = read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&text)?;
        cfg.validate().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AimError> {
        if self.steps_per_second <= 0.0 {
            return Err(AimError::configuration("steps_per_second must be positive"));
        }
        if self.speed_limit <= 0.0 {
            return Err(AimError::configuration("speed_limit must be positive"));
        }
        if self.max_braking >= 0.0 {
            return Err(AimError::configuration("max_braking must be negative"));
        }
        if self.min_acceleration <= 0.0 {
            return Err(AimError::configuration("min_acceleration must be positive"));
        }
        if self.max_vehicle_length <= 0.0 {
            return Err(AimError::configuration("max_vehicle_length must be positive"));
        }
        if self.length_buffer_factor < 0.0 {
            return Err(AimError::configuration("length_buffer_factor cannot be negative"));
        }
        if !(0.0..1.0).contains(&self.rejection_threshold) {
            return Err(AimError::configuration("rejection_threshold must be in [0, 1)"));
        }
        Ok(())
    }

    pub fn dt_seconds(&self) -> f64 {
        1.0 / self.steps_per_second
    }

    /// `min_entrance_length = speed_limit^2 / (2*|max_braking|) + max_vehicle_length`.
    pub fn min_entrance_length(&self) -> f64 {
        self.speed_limit.powi(2) / (2.0 * self.max_braking.abs()) + self.max_vehicle_length
    }
}

fn read_to_string(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))
}
