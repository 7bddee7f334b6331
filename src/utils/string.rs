use std::sync::LazyLock;

use regex::Regex;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("invalid sanitize regex"));

/// 净化字符串，移除特殊字符，用于歌曲匹配
pub fn sanitize_string(input: &str) -> String {
    let result = SPECIAL_CHARS.replace_all(input, "");
    result.trim().to_lowercase()
}

/// 比较两个字符串的相似度，取值 0.0 ~ 1.0
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a_clean = sanitize_string(a);
    let b_clean = sanitize_string(b);

    if a_clean.is_empty() || b_clean.is_empty() {
        return 0.0;
    }

    strsim::normalized_levenshtein(&a_clean, &b_clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_similarity() {
        // 完全一致的字符串
        assert_eq!(string_similarity("hello world", "hello world"), 1.0);

        // 完全不一致的字符串
        assert_eq!(string_similarity("abcde", "fghij"), 0.0);

        // 部分一致的字符串
        assert!(string_similarity("hello world", "hello there") > 0.5);

        // 大小写和特殊字符不影响相似度
        assert_eq!(string_similarity("Hello, World!", "hello world"), 1.0);

        // 空字符串
        assert_eq!(string_similarity("", "hello"), 0.0);
        assert_eq!(string_similarity("!!", "hello"), 0.0);
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("Hello, World!"), "hello world");
        assert_eq!(sanitize_string("  Test-123  "), "test123");
        assert_eq!(sanitize_string("稻香 (Live)"), "稻香 live");
        assert_eq!(sanitize_string(""), "");
    }
}
