pub mod coerce;
pub mod course;
pub mod snapshot;

pub use course::{normalize, Course, RawCourse};
pub use snapshot::{Plan, RawPlan};
