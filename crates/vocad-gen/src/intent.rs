use regex::Regex;
use std::sync::LazyLock;

static ITERATE_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bre[\s-]?iterate\b|\biterate again\b").expect("intent pattern is valid")
});

/// Detect a spoken request to revise the current model rather than start a
/// new one: "reiterate", "re iterate", "re-iterate", or "iterate again".
pub fn wants_iteration(text: &str) -> bool {
    ITERATE_INTENT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_reiterate_variants() {
        assert!(wants_iteration("please reiterate this"));
        assert!(wants_iteration("re iterate please"));
        assert!(wants_iteration("Re-Iterate the base"));
        assert!(wants_iteration("iterate again on the handle"));
    }

    #[test]
    fn ignores_plain_generation_requests() {
        assert!(!wants_iteration("generate a new mug"));
        assert!(!wants_iteration("make an iteration counter display"));
        assert!(!wants_iteration(""));
    }
}
