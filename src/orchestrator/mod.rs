pub mod runner;
pub mod steps;

pub use runner::{Collaborators, InstallationOrchestrator, RunReport};
pub use steps::{Step, StepSequence, StepState, TransactionFlow};
