use serde::Serialize;
use std::collections::HashSet;

use crate::plan::Course;

/// Display state of a course relative to the current passed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CourseState {
    Passed,
    Eligible,
    /// Not passed and at least one prerequisite is outstanding
    Blocked,
}

impl std::fmt::Display for CourseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseState::Passed => write!(f, "Passed"),
            CourseState::Eligible => write!(f, "Eligible"),
            CourseState::Blocked => write!(f, "Blocked"),
        }
    }
}

/// A prerequisite code that names no course in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingPrerequisite {
    pub course: String,
    pub missing: Vec<String>,
}

pub fn compute_passed_set(courses: &[Course]) -> HashSet<&str> {
    courses
        .iter()
        .filter(|c| c.passed)
        .map(|c| c.code.as_str())
        .collect()
}

/// A course is eligible when it is not passed and every prerequisite is in
/// the passed set. An empty prerequisite list is trivially satisfied.
pub fn is_eligible(course: &Course, passed: &HashSet<&str>) -> bool {
    !course.passed
        && course
            .prerequisites
            .iter()
            .all(|code| passed.contains(code.as_str()))
}

/// Eligible course codes in plan order.
pub fn compute_eligible<'a>(courses: &'a [Course], passed: &HashSet<&str>) -> Vec<&'a str> {
    courses
        .iter()
        .filter(|c| is_eligible(c, passed))
        .map(|c| c.code.as_str())
        .collect()
}

pub fn classify(course: &Course, passed: &HashSet<&str>) -> CourseState {
    if course.passed {
        CourseState::Passed
    } else if is_eligible(course, passed) {
        CourseState::Eligible
    } else {
        CourseState::Blocked
    }
}

/// Courses that can never become eligible because a prerequisite is not in
/// the plan at all.
pub fn dangling_prerequisites(courses: &[Course]) -> Vec<DanglingPrerequisite> {
    let known: HashSet<&str> = courses.iter().map(|c| c.code.as_str()).collect();

    courses
        .iter()
        .filter_map(|c| {
            let missing: Vec<String> = c
                .prerequisites
                .iter()
                .filter(|code| !known.contains(code.as_str()))
                .cloned()
                .collect();
            (!missing.is_empty()).then(|| DanglingPrerequisite {
                course: c.code.clone(),
                missing,
            })
        })
        .collect()
}

/// Human-readable explanation of a course's state
pub fn eligibility_reason(course: &Course, courses: &[Course], passed: &HashSet<&str>) -> String {
    if course.passed {
        return "Already passed".to_string();
    }

    let known: HashSet<&str> = courses.iter().map(|c| c.code.as_str()).collect();
    let dangling: Vec<&str> = course
        .prerequisites
        .iter()
        .map(String::as_str)
        .filter(|code| !known.contains(code))
        .collect();
    if !dangling.is_empty() {
        return format!("Requires {} which is not part of the plan", dangling.join(", "));
    }

    let pending: Vec<&str> = course
        .prerequisites
        .iter()
        .map(String::as_str)
        .filter(|code| !passed.contains(code))
        .collect();
    if pending.is_empty() {
        "Eligible".to_string()
    } else {
        format!("Waiting on {}", pending.join(", "))
    }
}

/// Totals over a plan for reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub passed: usize,
    pub eligible: usize,
    pub blocked: usize,
    pub fundamental_total: usize,
    pub fundamental_passed: usize,
    pub dangling: usize,
}

impl ProgressSummary {
    pub fn from_courses(courses: &[Course]) -> Self {
        let passed = compute_passed_set(courses);
        let mut summary = ProgressSummary {
            total: courses.len(),
            dangling: dangling_prerequisites(courses).len(),
            ..Default::default()
        };

        for course in courses {
            match classify(course, &passed) {
                CourseState::Passed => summary.passed += 1,
                CourseState::Eligible => summary.eligible += 1,
                CourseState::Blocked => summary.blocked += 1,
            }
            if course.is_fundamental {
                summary.fundamental_total += 1;
                if course.passed {
                    summary.fundamental_passed += 1;
                }
            }
        }

        summary
    }

    /// Share of passed courses as a percentage
    pub fn completion(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(code: &str, prereqs: &[&str], passed: bool) -> Course {
        Course::new(code, code)
            .with_prerequisites(prereqs.iter().copied())
            .passed(passed)
    }

    #[test]
    fn test_empty_prerequisites_eligible_unless_passed() {
        let courses = vec![course("A", &[], false), course("B", &[], true)];
        let passed = compute_passed_set(&courses);
        assert_eq!(compute_eligible(&courses, &passed), vec!["A"]);
    }

    #[test]
    fn test_satisfied_course_listed_once_in_plan_order() {
        let courses = vec![
            course("C", &["A", "B"], false),
            course("A", &[], true),
            course("B", &[], true),
            course("D", &["A"], false),
        ];
        let passed = compute_passed_set(&courses);
        let eligible = compute_eligible(&courses, &passed);
        assert_eq!(eligible, vec!["C", "D"]);
        assert_eq!(eligible.iter().filter(|c| **c == "C").count(), 1);
    }

    #[test]
    fn test_unlock_after_prerequisite_passes() {
        let mut courses = vec![course("A", &[], false), course("B", &["A"], false)];
        let passed = compute_passed_set(&courses);
        assert_eq!(compute_eligible(&courses, &passed), vec!["A"]);

        courses[0].passed = true;
        let passed = compute_passed_set(&courses);
        assert_eq!(compute_eligible(&courses, &passed), vec!["B"]);
    }

    #[test]
    fn test_dangling_prerequisite_never_eligible() {
        let courses = vec![
            course("A", &[], true),
            course("B", &[], true),
            course("C", &["A", "Z"], false),
        ];
        let passed = compute_passed_set(&courses);
        assert!(compute_eligible(&courses, &passed).is_empty());
        assert_eq!(classify(&courses[2], &passed), CourseState::Blocked);

        let dangling = dangling_prerequisites(&courses);
        assert_eq!(
            dangling,
            vec![DanglingPrerequisite {
                course: "C".to_string(),
                missing: vec!["Z".to_string()],
            }]
        );
        assert_eq!(
            eligibility_reason(&courses[2], &courses, &passed),
            "Requires Z which is not part of the plan"
        );
    }

    #[test]
    fn test_classify_and_reason() {
        let courses = vec![
            course("A", &[], true),
            course("B", &["A"], false),
            course("C", &["B"], false),
        ];
        let passed = compute_passed_set(&courses);
        assert_eq!(classify(&courses[0], &passed), CourseState::Passed);
        assert_eq!(classify(&courses[1], &passed), CourseState::Eligible);
        assert_eq!(classify(&courses[2], &passed), CourseState::Blocked);
        assert_eq!(eligibility_reason(&courses[2], &courses, &passed), "Waiting on B");
        assert_eq!(eligibility_reason(&courses[0], &courses, &passed), "Already passed");
    }

    #[test]
    fn test_progress_summary() {
        let mut a = course("A", &[], true);
        a.is_fundamental = true;
        let mut b = course("B", &["A"], false);
        b.is_fundamental = true;
        let courses = vec![a, b, course("C", &["B"], false), course("D", &["X"], false)];

        let summary = ProgressSummary::from_courses(&courses);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.blocked, 2);
        assert_eq!(summary.fundamental_total, 2);
        assert_eq!(summary.fundamental_passed, 1);
        assert_eq!(summary.dangling, 1);
        assert_eq!(summary.completion(), 25.0);
    }
}
