use colored::Colorize;

use crate::eligibility::CourseState;

/// Curricular placement as `year-term`, or a dash when unknown
pub fn format_term(year: &str, term: &str) -> String {
    match (year.is_empty(), term.is_empty()) {
        (true, true) => "—".to_string(),
        (false, true) => year.to_string(),
        (true, false) => term.to_string(),
        (false, false) => format!("{}-{}", year, term),
    }
}

/// Comma-separated codes, or a dash for none
pub fn format_codes<S: AsRef<str>>(codes: &[S]) -> String {
    if codes.is_empty() {
        "—".to_string()
    } else {
        codes.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

/// Truncate to `width` characters with an ellipsis
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Course code coloured by state: green passed, cyan eligible, red blocked
pub fn state_badge(code: &str, state: CourseState) -> String {
    match state {
        CourseState::Passed => code.green().to_string(),
        CourseState::Eligible => code.cyan().to_string(),
        CourseState::Blocked => code.red().to_string(),
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns. Widths count characters, so accented
/// course names line up.
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (col, width) in columns.iter().zip(widths) {
        let pad = width.saturating_sub(visible_len(col));
        row.push_str(col);
        row.push_str(&" ".repeat(pad + 2));
    }
    println!("{}", row.trim_end());
}

/// Character count ignoring ANSI colour escapes
fn visible_len(text: &str) -> usize {
    let mut len = 0;
    let mut in_escape = false;
    for c in text.chars() {
        match (in_escape, c) {
            (false, '\u{1b}') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => len += 1,
        }
    }
    len
}
