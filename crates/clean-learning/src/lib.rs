pub mod clean;
pub mod config;
pub mod cross_validation;
pub mod folds;

pub use clean::{CleanLearning, CleanModel};
pub use config::CleanLearningConfig;
pub use cross_validation::{cross_val_pred_probs, out_of_sample_pred_probs};
pub use folds::{stratified_folds, Fold};

#[cfg(test)]
mod tests;
