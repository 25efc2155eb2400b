//! Grade label comparison.
//!
//! Precondition: grades are letter codes where an alphabetically earlier
//! label is strictly better (`"A"` beats `"B"`). Labels are compared as raw
//! strings, so a scheme such as `"A+"`/`"A"` or a best-last ordering is
//! misclassified. Do not change the ordering rule without confirming the
//! grading scheme used upstream.

use std::cmp::Ordering;

/// Direction of a grade change between two days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeMove {
    Unchanged,
    Improved,
    Worsened,
}

/// Classifies the move from `previous` to `current`.
pub fn grade_move(previous: &str, current: &str) -> GradeMove {
    match current.cmp(previous) {
        Ordering::Equal => GradeMove::Unchanged,
        Ordering::Less => GradeMove::Improved,
        Ordering::Greater => GradeMove::Worsened,
    }
}

/// Whether a label satisfies the single-letter precondition.
pub fn is_single_letter(label: &str) -> bool {
    let mut chars = label.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_move() {
        assert_eq!(grade_move("B", "A"), GradeMove::Improved);
        assert_eq!(grade_move("B", "D"), GradeMove::Worsened);
        assert_eq!(grade_move("C", "C"), GradeMove::Unchanged);
    }

    #[test]
    fn test_single_letter_precondition() {
        assert!(is_single_letter("A"));
        assert!(is_single_letter("f"));
        assert!(!is_single_letter("A+"));
        assert!(!is_single_letter(""));
        assert!(!is_single_letter("1"));
    }
}
