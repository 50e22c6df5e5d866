//! Small shared utilities: safe string truncation, constant-time comparison,
//! and environment-file loading.

use std::path::Path;
use subtle::ConstantTimeEq;

/// Safely truncate a string at character boundaries (not byte boundaries).
/// This prevents panics when truncating multi-byte UTF-8 characters.
///
/// ```
/// use lix_core::util::safe_truncate;
///
/// let s = "Hello, world!";
/// assert_eq!(safe_truncate(s, 5), "Hello");
/// ```
#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Safely truncate a string and add ellipsis if truncated.
///
/// ```
/// use lix_core::util::safe_truncate_with_ellipsis;
///
/// assert_eq!(safe_truncate_with_ellipsis("Hello, world!", 5), "Hello...");
/// assert_eq!(safe_truncate_with_ellipsis("Hi", 5), "Hi");
/// ```
pub fn safe_truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        format!("{}...", safe_truncate(s, max_chars))
    }
}

/// Constant-time comparison of two strings, used for shared-key auth.
///
/// ```
/// use lix_core::util::constant_time_eq;
///
/// assert!(constant_time_eq("secret", "secret"));
/// assert!(!constant_time_eq("secret", "SECRET"));
/// ```
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Load environment variables from a lixd env file if not already set.
/// Searches standard locations in order:
/// 1. `/usr/local/etc/lixd/lixd.env`
/// 2. the platform config dir's `lixd/lixd.env`
/// 3. `~/.config/lixd/lixd.env`
pub fn load_env_file() {
    let env_paths = [
        "/usr/local/etc/lixd/lixd.env".to_string(),
        dirs::config_dir()
            .map(|p| p.join("lixd/lixd.env").to_string_lossy().to_string())
            .unwrap_or_default(),
        dirs::home_dir()
            .map(|p| p.join(".config/lixd/lixd.env").to_string_lossy().to_string())
            .unwrap_or_default(),
    ];

    for path in &env_paths {
        if path.is_empty() {
            continue;
        }
        if Path::new(path).exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                parse_env_file(&contents);
            }
            break;
        }
    }
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports `KEY=value`, `export KEY=value`, quoted values, and `#` comments.
pub fn parse_env_file(contents: &str) {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_ascii() {
        assert_eq!(safe_truncate("hello world", 5), "hello");
        assert_eq!(safe_truncate("hi", 5), "hi");
        assert_eq!(safe_truncate("", 5), "");
    }

    #[test]
    fn truncate_unicode() {
        assert_eq!(safe_truncate("Æøå er fine bokstaver", 3), "Æøå");
        assert_eq!(safe_truncate("Hello æøå", 7), "Hello æ");
    }

    #[test]
    fn truncate_with_ellipsis() {
        assert_eq!(safe_truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(safe_truncate_with_ellipsis("hi", 5), "hi");
    }

    #[test]
    fn constant_time_eq_behavior() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secre"));
        assert!(!constant_time_eq("", "a"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn parse_env_file_sets_unset_vars() {
        std::env::remove_var("TEST_LIX_VAR1");
        std::env::remove_var("TEST_LIX_VAR2");
        std::env::remove_var("TEST_LIX_VAR3");

        let contents = r#"
            # comment
            TEST_LIX_VAR1=value1
            export TEST_LIX_VAR2="quoted value"
            TEST_LIX_VAR3='single quoted'
        "#;

        parse_env_file(contents);

        assert_eq!(std::env::var("TEST_LIX_VAR1").unwrap(), "value1");
        assert_eq!(std::env::var("TEST_LIX_VAR2").unwrap(), "quoted value");
        assert_eq!(std::env::var("TEST_LIX_VAR3").unwrap(), "single quoted");
    }
}
