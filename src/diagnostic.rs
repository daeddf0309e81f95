use std::sync::LazyLock;

use regex::Regex;

use crate::synth::ENTRY_POINT;

static USER_MAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" main\s*\(").unwrap_or_else(|e| unreachable!("invalid pattern: {e}"))
});

/// Whether a message is worth showing for these statements.
///
/// Only statement text that looks finished (last non-whitespace character is
/// `;` or `}`) gets a diagnostic: half-typed input fails for obvious reasons.
pub fn is_eligible(statements: &str) -> bool {
    crate::buffer::is_terminated(statements)
}

/// Pick one human-readable line out of the compiler's diagnostics.
///
/// Returns `None` when the statements are not eligible or no useful line is
/// found. The location prefix (`<stdin>:3:5: error: `-style, up to and
/// including the first `": "`) is stripped; a line without it is returned
/// unchanged.
pub fn extract(diagnostics: &str, statements: &str) -> Option<String> {
    if !is_eligible(statements) {
        return None;
    }
    let line = diagnostics
        .lines()
        .map(str::trim_end)
        .find(|line| !line.trim().is_empty() && !line.contains(ENTRY_POINT))?;
    Some(match line.split_once(": ") {
        Some((_, rest)) => rest.to_string(),
        None => line.to_string(),
    })
}

/// Whether the user wrote their own `main`; such input is never rolled back.
pub fn defines_entry_point(statements: &str) -> bool {
    USER_MAIN.is_match(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCC_OUTPUT: &str = "<stdin>: In function 'int main()':\n\
        <stdin>:5:9: error: 'y' was not declared in this scope\n\
        5 | int z = y;\n\
          |         ^\n";

    #[test]
    fn test_eligibility_depends_on_last_character() {
        assert!(is_eligible("int z = y;"));
        assert!(is_eligible("if (x) { y(); }  \n"));
        assert!(!is_eligible("int"));
        assert!(!is_eligible("x + 2"));
        assert!(!is_eligible(""));
    }

    #[test]
    fn test_skips_entry_point_line_and_strips_location() {
        assert_eq!(
            extract(GCC_OUTPUT, "int z = y;").as_deref(),
            Some("error: 'y' was not declared in this scope")
        );
    }

    #[test]
    fn test_ineligible_statements_are_silent() {
        assert_eq!(extract(GCC_OUTPUT, "int"), None);
    }

    #[test]
    fn test_line_without_delimiter_is_printed_raw() {
        assert_eq!(
            extract("\n\nfatal error, giving up\n", "foo();").as_deref(),
            Some("fatal error, giving up")
        );
    }

    #[test]
    fn test_only_entry_point_lines_yield_nothing() {
        assert_eq!(extract("In function 'int main()':\n", "x;"), None);
        assert_eq!(extract("", "x;"), None);
    }

    #[test]
    fn test_detects_user_main() {
        assert!(defines_entry_point("int main() { return 0; }"));
        assert!(defines_entry_point("int main (int argc, char **argv) {"));
        assert!(!defines_entry_point("int domain(int);"));
        assert!(!defines_entry_point("main();"));
    }
}
