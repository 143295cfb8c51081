pub mod config;
pub mod eligibility;
pub mod error;
pub mod ingest;
pub mod plan;
pub mod store;
pub mod utils;

pub use config::Config;
pub use eligibility::EligibilityEngine;
pub use error::{PlanError, Result};
pub use plan::{Course, Plan, RawCourse, RawPlan};
pub use store::DocumentStore;
