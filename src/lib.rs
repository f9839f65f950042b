pub mod config;
pub mod error;
pub mod models;
pub mod update;

pub use config::Config;
pub use error::UpdateError;
pub use models::{AssetRef, ReleaseInfo, UpdateEvent, UpdateOutcome, UpdatePlan, UpdateState};
pub use update::UpdateOrchestrator;
