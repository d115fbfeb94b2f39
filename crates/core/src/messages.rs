//! Canned Hebrew texts returned without consulting the completion capability.
//!
//! Every user-facing fallback lives here so the privacy rule can be checked in
//! one place: none of these strings may embed a statement, a subject id, or an
//! internal error name.

/// Exact greeting tokens that short-circuit the whole reasoning loop.
pub const GREETING_TOKENS: &[&str] = &["שלום", "היי", "בוקר טוב", "צהריים טובים", "ערב טוב"];

pub const GREETING_REPLY: &str = "שלום! כיצד אוכל לעזור לך?";

pub const GENERIC_APOLOGY: &str = "אני מתנצל, נתקלתי בשגיאה. איך אני יכול לעזור לך?";

pub const PRIVACY_APOLOGY: &str =
    "אני מתנצל, לא ניתן היה לגשת לנתונים המבוקשים. אנא ודא שאתה מחובר כראוי למערכת.";

pub const NO_DATA_FOUND: &str = "לא מצאתי נתונים מתאימים. אשמח לעזור בשאלה אחרת.";

pub const ITERATION_LIMIT_REACHED: &str =
    "הגעתי למספר המרבי של ניסיונות. אנא נסה לנסח את השאלה מחדש.";

pub const HOW_CAN_I_HELP: &str = "שלום! איך אני יכול לעזור לך היום?";

/// True when the trimmed input is one of the fixed greeting tokens.
///
/// Trailing punctuation is tolerated ("שלום!" greets like "שלום") but anything
/// longer than a bare greeting goes through the router.
pub fn is_greeting(input: &str) -> bool {
    let stripped = input.trim().trim_end_matches(['!', '?', '.']);
    GREETING_TOKENS.iter().any(|token| *token == stripped.trim())
}

#[cfg(test)]
mod tests {
    use super::{is_greeting, GENERIC_APOLOGY, NO_DATA_FOUND, PRIVACY_APOLOGY};

    #[test]
    fn greeting_tokens_match_with_trailing_punctuation() {
        assert!(is_greeting("שלום"));
        assert!(is_greeting("  שלום!  "));
        assert!(is_greeting("בוקר טוב"));
    }

    #[test]
    fn longer_sentences_are_not_greetings() {
        assert!(!is_greeting("שלום, מתי התור הבא שלי?"));
        assert!(!is_greeting("מה התורים שלי"));
        assert!(!is_greeting(""));
    }

    #[test]
    fn canned_texts_do_not_name_internal_error_kinds() {
        for text in [GENERIC_APOLOGY, PRIVACY_APOLOGY, NO_DATA_FOUND] {
            assert!(!text.contains("Timeout"));
            assert!(!text.contains("MissingScopePredicate"));
            assert!(!text.contains("SELECT"));
        }
    }
}
