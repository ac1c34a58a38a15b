use regex::{Regex, RegexBuilder};

/// Compile a `*`-wildcard pattern into an anchored, case-insensitive regex.
///
/// Every regex metacharacter in the pattern is escaped first, so only `*`
/// has special meaning.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = regex::escape(pattern).replace(r"\*", ".*");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
}

/// Whether `candidate` matches the wildcard `pattern`.
pub fn glob_matches(pattern: &str, candidate: &str) -> Result<bool, regex::Error> {
    Ok(glob_to_regex(pattern)?.is_match(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_wildcard() {
        assert!(glob_matches("Acme*", "Acme Corp").unwrap());
        assert!(glob_matches("acme*", "ACME corp").unwrap());
        assert!(!glob_matches("Acme*", "Beta Corp").unwrap());
    }

    #[test]
    fn test_anchored() {
        assert!(!glob_matches("Corp", "Acme Corp").unwrap());
        assert!(glob_matches("*Corp", "Acme Corp").unwrap());
        assert!(glob_matches("Warehouse A", "warehouse a").unwrap());
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(glob_matches("A.B (EU)*", "A.B (EU) GmbH").unwrap());
        assert!(!glob_matches("A.B*", "AxB Ltd").unwrap());
        assert!(glob_matches("Rack+1", "Rack+1").unwrap());
        assert!(!glob_matches("Rack+1", "Rackk1").unwrap());
        assert!(glob_matches("[Shelf]", "[shelf]").unwrap());
    }

    #[test]
    fn test_multiple_wildcards() {
        assert!(glob_matches("B*-R*-S1", "B2-R14-S1").unwrap());
        assert!(!glob_matches("B*-R*-S1", "B2-R14-S2").unwrap());
    }
}
