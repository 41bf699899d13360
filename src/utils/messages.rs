use std::collections::HashMap;

use once_cell::sync::Lazy;

/// User-facing message catalog. The core only selects keys and arguments;
/// rendering happens here with "{0}"-style placeholders. Keys mirror the
/// legacy message properties so stored references stay meaningful.
static MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "authorization.invalid",
            "You do not have permission to perform this operation.",
        ),
        (
            "attendance.notWorkDay",
            "Today is not a training day, so attendance cannot be recorded.",
        ),
        (
            "attendance.punchAlreadyExists",
            "Attendance for today has already been recorded. Please use direct edit instead.",
        ),
        (
            "attendance.punchInEmpty",
            "An end time cannot be recorded without a start time.",
        ),
        (
            "attendance.trainingTimeRange",
            "The end time {0} must not be earlier than the start time {1}.",
        ),
        (
            "attendance.blankTimeError",
            "Break time cannot be longer than the recorded working time.",
        ),
        ("attendance.update.notice", "Attendance has been updated."),
        ("input.invalid", "The {0} entry is incomplete."),
        ("maxlength", "{0} must be no longer than {1} characters."),
    ])
});

/// Renders a catalog message, substituting positional arguments. An unknown
/// key falls back to the key itself so a missing entry is visible instead of
/// silent.
pub fn render(key: &str, args: &[&str]) -> String {
    let mut text = match MESSAGES.get(key) {
        Some(template) => (*template).to_string(),
        None => return key.to_string(),
    };
    for (i, arg) in args.iter().enumerate() {
        text = text.replace(&format!("{{{}}}", i), arg);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_positional_args() {
        assert_eq!(
            render("attendance.trainingTimeRange", &["08:30", "09:00"]),
            "The end time 08:30 must not be earlier than the start time 09:00."
        );
        assert_eq!(
            render("maxlength", &["note", "100"]),
            "note must be no longer than 100 characters."
        );
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(render("no.such.key", &[]), "no.such.key");
    }
}
