use confident_learning::EngineConfig;
use label_core::{LabelError, LabelResult};
use serde::{Deserialize, Serialize};

/// Settings for cross-validated issue search and filtered retraining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanLearningConfig {
    /// Number of cross-validation folds.
    pub cv_folds: usize,
    /// Seed for the fold shuffle.
    pub seed: u64,
    /// Weight kept examples by the inverse retention rate of their label.
    pub reweight_by_noise: bool,
    pub engine: EngineConfig,
}

impl Default for CleanLearningConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            seed: 0,
            reweight_by_noise: false,
            engine: EngineConfig::default(),
        }
    }
}

impl CleanLearningConfig {
    /// Engine settings come from [`EngineConfig::from_env`]; on top of those:
    /// - `LABEL_CV_FOLDS` (default: `5`)
    /// - `LABEL_SEED` (default: `0`)
    /// - `LABEL_REWEIGHT` (`true`/`false`, default: `false`)
    pub fn from_env() -> LabelResult<Self> {
        let mut config = Self {
            engine: EngineConfig::from_env()?,
            ..Self::default()
        };

        if let Ok(v) = std::env::var("LABEL_CV_FOLDS") {
            config.cv_folds = v.trim().parse().map_err(|_| {
                LabelError::InvalidConfig(format!("LABEL_CV_FOLDS is not an integer: '{}'", v))
            })?;
        }
        if let Ok(v) = std::env::var("LABEL_SEED") {
            config.seed = v.trim().parse().map_err(|_| {
                LabelError::InvalidConfig(format!("LABEL_SEED is not an integer: '{}'", v))
            })?;
        }
        if let Ok(v) = std::env::var("LABEL_REWEIGHT") {
            config.reweight_by_noise = v.trim().parse().map_err(|_| {
                LabelError::InvalidConfig(format!("LABEL_REWEIGHT is not a boolean: '{}'", v))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LabelResult<()> {
        if self.cv_folds < 2 {
            return Err(LabelError::InvalidConfig(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        self.engine.validate()
    }
}
