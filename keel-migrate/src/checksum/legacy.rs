//! Legacy normalizer. Frozen: stored version-8 checksums depend on every byte it emits.

use super::NormalizeOptions;

pub(super) fn normalize(content: &str, options: &NormalizeOptions) -> String {
    let mut out = format!(
        "{}:{}:{}:",
        options.end_delimiter.as_deref().unwrap_or(""),
        options.split_statements,
        options.strip_comments
    );
    out.push_str(&content.split_whitespace().collect::<Vec<_>>().join(" "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_legacy() {
        let options = NormalizeOptions::default();
        assert_eq!(
            normalize("  SELECT 1;\n -- kept\n", &options),
            ":true:false:SELECT 1; -- kept"
        );
    }

    #[test]
    fn test_legacy_header_reflects_options() {
        let options = NormalizeOptions {
            end_delimiter: Some("GO".to_string()),
            split_statements: false,
            strip_comments: true,
        };
        assert_eq!(normalize("x", &options), "GO:false:true:x");
    }
}
