//! Confident Learning Module
//!
//! Finds examples whose given label is probably wrong, using only the noisy
//! labels and out-of-sample predicted probabilities. Estimates the joint
//! distribution of noisy and true labels, calibrates it to the observed label
//! counts, scores every example, and selects the likely label errors.

pub mod calibration;
pub mod config;
pub mod engine;
pub mod joint;
pub mod noise;
pub mod quality;
pub mod selector;
pub mod threshold;
pub mod validation;

pub use calibration::{CalibratedJoint, CalibrationStats};
pub use config::{
    ClassTieBreak, EngineConfig, Rounding, ScoreMethod, ScoreTieBreak, SelectionPolicy,
};
pub use engine::{find_label_issues, LabelIssueEngine, LabelIssueReport};
pub use joint::ConfidentJoint;
pub use noise::LatentEstimate;
pub use selector::{ErrorSelector, SelectionInput};
pub use threshold::ClassThresholds;
