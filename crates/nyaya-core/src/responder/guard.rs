//! Input guard: filters empty input and keyboard noise before any lookup.
//!
//! Deliberately narrow: anything of two or more characters passes unless it is one to
//! three ASCII letters. That rejects "no" and accepts "xyz123".

/// Outcome of inspecting a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputVerdict<'a> {
    /// Trimmed message, ready for lookup.
    Accepted(&'a str),
    /// Fewer than two characters after trimming.
    TooShort,
    /// One to three ASCII letters and nothing else.
    Junk,
}

pub fn inspect_input(raw: &str) -> InputVerdict<'_> {
    let message = raw.trim();
    let len = message.chars().count();
    if len < 2 {
        return InputVerdict::TooShort;
    }
    if len <= 3 && message.chars().all(|c| c.is_ascii_alphabetic()) {
        return InputVerdict::Junk;
    }
    InputVerdict::Accepted(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short() {
        for raw in ["", " ", "a", "  ?  ", "\n\t"] {
            assert_eq!(inspect_input(raw), InputVerdict::TooShort, "{:?}", raw);
        }
    }

    #[test]
    fn junk_letters() {
        for raw in ["ab", "asd", " NO ", "Hi", "qwe"] {
            assert_eq!(inspect_input(raw), InputVerdict::Junk, "{:?}", raw);
        }
    }

    #[test]
    fn accepted_and_trimmed() {
        assert_eq!(inspect_input("  what is dowry \n"), InputVerdict::Accepted("what is dowry"));
        assert_eq!(inspect_input("xyz123"), InputVerdict::Accepted("xyz123"));
        assert_eq!(inspect_input("abcd"), InputVerdict::Accepted("abcd"));
        assert_eq!(inspect_input("a?"), InputVerdict::Accepted("a?"));
        assert_eq!(inspect_input("a b"), InputVerdict::Accepted("a b"));
        // non-ASCII letters are outside the junk pattern
        assert_eq!(inspect_input("हक"), InputVerdict::Accepted("हक"));
    }

    #[test]
    fn length_counts_chars_not_utf16_units() {
        // one astral-plane scalar is a single character
        assert_eq!(inspect_input("⚖"), InputVerdict::TooShort);
        assert_eq!(inspect_input(" 😀 "), InputVerdict::TooShort);
        assert_eq!(inspect_input("😀😀"), InputVerdict::Accepted("😀😀"));
        assert_eq!(inspect_input("é?"), InputVerdict::Accepted("é?"));
    }
}
