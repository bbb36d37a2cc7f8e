//! Whitespace normalization for extracted page text.
//!
//! Both passes are pure and idempotent.

use std::sync::LazyLock;

use regex::Regex;

static BREAKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r\t]").expect("valid regex"));

static MULTI_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// Replace newlines and tabs with spaces, then collapse runs of spaces.
///
/// The output never contains `\n`, `\r`, `\t`, or two consecutive spaces.
pub fn normalize(text: &str) -> String {
    let flattened = BREAKS_RE.replace_all(text, " ");
    MULTI_SPACE_RE.replace_all(&flattened, " ").into_owned()
}

/// Normalize each line on its own, keeping line boundaries.
///
/// Lines are trimmed and blank lines dropped, so the chunker still sees the
/// paragraph structure the fetcher produced.
pub fn normalize_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| normalize(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        " ",
        "Hello\nWorld\t\t  Multiple   Spaces",
        "\n\n\n",
        "a\r\nb\r\n",
        "  leading and trailing  ",
        "tab\tthen\n\tnewline  \t  mix",
        "unicode  café\t\tnaïve\n日本語  テキスト",
    ];

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            normalize("Hello\nWorld\t\t  Multiple   Spaces"),
            "Hello World Multiple Spaces"
        );
    }

    #[test]
    fn output_has_no_breaks_or_double_spaces() {
        for s in SAMPLES {
            let out = normalize(s);
            assert!(!out.contains('\n'), "{s:?}");
            assert!(!out.contains('\t'), "{s:?}");
            assert!(!out.contains('\r'), "{s:?}");
            assert!(!out.contains("  "), "{s:?}");
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in SAMPLES {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "{s:?}");
        }
    }

    #[test]
    fn normalize_lines_keeps_line_structure() {
        let text = "  Line one.  \n\n\tLine   two.\n   \nLine three.";
        assert_eq!(normalize_lines(text), "Line one.\nLine two.\nLine three.");
        assert_eq!(normalize_lines(""), "");
        assert_eq!(normalize_lines("\n \n\t\n"), "");
    }
}
