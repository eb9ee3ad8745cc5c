//! Removal of shell-significant characters from untrusted values.
//!
//! This is a denylist, not an escaper: it only strips the characters below
//! and does not make a value safe for arbitrary shell interpretation.

/// Characters removed from request-provided values.
pub const FORBIDDEN_CHARS: [char; 9] = ['#', ';', '%', '$', '"', '\'', '`', '&', '|'];

/// Remove every forbidden character from `value`.
pub fn sanitize(value: &str) -> String {
    value.replace(&FORBIDDEN_CHARS[..], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        let cases = [
            ("$(id)", "(id)"),
            ("$PATH", "PATH"),
            ("$PATH $OTHER", "PATH OTHER"),
            ("${PATH}", "{PATH}"),
            ("# dont execute what comes next", " dont execute what comes next"),
            ("; sudo cat /etc/shadow", " sudo cat /etc/shadow"),
            ("& sudo cat /etc/shadow", " sudo cat /etc/shadow"),
            ("| sudo cat /etc/shadow", " sudo cat /etc/shadow"),
            ("something\"; rm -rf /; export PATH=\"", "something rm -rf / export PATH="),
            ("`whoami`", "whoami"),
            ("100%", "100"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_harmless_values_untouched() {
        assert_eq!(sanitize("hello world-42_ä/ö"), "hello world-42_ä/ö");
        assert_eq!(sanitize(""), "");
    }
}
