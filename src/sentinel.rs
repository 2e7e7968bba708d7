//! Sentinel token formatting and literal (non-regex) substitution.
//!
//! Every key produced here must occur exactly once in the compiled shell and
//! zero times after substitution (see the sentinel-uniqueness invariant).

pub fn waited_key(name: &str, from: &str, partial: &str) -> String {
    format!("{{fragment|{name}_{from}_{partial}}}")
}

pub fn chunked_key(name: &str, partial: &str) -> String {
    format!("{name}_{partial}")
}

pub fn placeholder_key(name: &str, partial: &str) -> String {
    format!("{name}_{partial}_placeholder")
}

pub fn model_key(name: &str) -> String {
    format!("{{fragment|{name}_pageModel}}")
}

pub const CONTENT_NOT_FOUND_ERROR: &str = "CONTENT_NOT_FOUND_ERROR";

/// Literal substring replacement. Never treat `key` or `value` as a pattern:
/// fragment content containing `$` or backreference-like sequences must not
/// interact with the substitution mechanism.
pub fn substitute(haystack: &str, key: &str, value: &str) -> String {
    haystack.replace(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_have_expected_shapes() {
        assert_eq!(waited_key("f", "g", "main"), "{fragment|f_g_main}");
        assert_eq!(chunked_key("f", "main"), "f_main");
        assert_eq!(placeholder_key("f", "main"), "f_main_placeholder");
        assert_eq!(model_key("f"), "{fragment|f_pageModel}");
    }

    #[test]
    fn substitution_is_literal_not_regex() {
        let haystack = "before {fragment|f_g_main} after";
        let replaced = substitute(haystack, "{fragment|f_g_main}", "$& weird $1 back-ref");
        assert_eq!(replaced, "before $& weird $1 back-ref after");
    }
}
