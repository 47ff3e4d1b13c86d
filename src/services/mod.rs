pub mod analyzer;
pub mod lifecycle_driver;

pub use analyzer::{decide, Action, AnalyzerPolicy};
pub use lifecycle_driver::{DriveOutcome, DriveReport, DriverOptions, LifecycleDriver};
