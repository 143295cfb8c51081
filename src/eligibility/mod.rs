pub mod batch;
pub mod engine;
pub mod rules;

pub use batch::{BatchSummary, BatchToggler};
pub use engine::EligibilityEngine;
pub use rules::{
    classify, compute_eligible, compute_passed_set, dangling_prerequisites, eligibility_reason, CourseState,
    DanglingPrerequisite, ProgressSummary,
};
