/// What the sender asked for. Derived from message text alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CheckIn,
    Query,
    Unknown,
}

/// Maps free text to an intent. Input is trimmed and case-folded first; both
/// the localized tokens and their English aliases are accepted, anything else
/// is `Unknown`.
pub fn interpret(text: &str) -> Intent {
    match text.trim().to_lowercase().as_str() {
        "打卡" | "check-in" => Intent::CheckIn,
        "查詢" | "query" => Intent::Query,
        _ => Intent::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("打卡", Intent::CheckIn; "localized checkin")]
    #[test_case("check-in", Intent::CheckIn; "english checkin")]
    #[test_case("CHECK-IN", Intent::CheckIn; "case folded")]
    #[test_case("  打卡  ", Intent::CheckIn; "surrounding whitespace")]
    #[test_case("查詢", Intent::Query; "localized query")]
    #[test_case("query", Intent::Query; "english query")]
    #[test_case("Query ", Intent::Query; "query trimmed and folded")]
    #[test_case("", Intent::Unknown; "empty")]
    #[test_case("hello", Intent::Unknown; "free text")]
    #[test_case("check in", Intent::Unknown; "missing hyphen")]
    #[test_case("打卡 today", Intent::Unknown; "extra words are not a command")]
    fn interpret_maps_text_to_intent(text: &str, expected: Intent) {
        assert_eq!(interpret(text), expected);
    }
}
