// src/core/mod.rs — Response validation and self-correction pipeline

pub mod controller;
pub mod prompt;
pub mod types;

pub use controller::CorrectionController;
pub use types::{Attempt, ControllerError, ControllerSettings, Exchange, Outcome, Phase};
