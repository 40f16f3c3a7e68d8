//! Current normalizer.

use super::NormalizeOptions;
use crate::sql_text;

pub(super) fn normalize(content: &str, options: &NormalizeOptions) -> String {
    let text = content.replace("\r\n", "\n").replace('\r', "\n");
    let text = sql_text::strip_comments(&text);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    sql_text::strip_trailing_delimiter(&collapsed, options.delimiter()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_current() {
        let options = NormalizeOptions::default();
        assert_eq!(
            normalize("-- header\r\nSELECT  *\r\n  FROM t; ", &options),
            "SELECT * FROM t"
        );
        assert_eq!(normalize("SELECT '--x' ;", &options), "SELECT '--x'");
    }

    #[test]
    fn test_normalize_custom_delimiter() {
        let options = NormalizeOptions {
            end_delimiter: Some("GO".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize("EXEC p\nGO\n", &options), "EXEC p");
        assert_eq!(normalize("EXEC p;", &options), "EXEC p;");
    }
}
