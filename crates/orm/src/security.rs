//! Identifier sanitization
//!
//! Values are always bound as parameters, but identifiers (tables, columns,
//! aliases) have to be spliced into the SQL text. Everything the query
//! builder interpolates goes through [`wrap_identifier`], which rejects any
//! name outside `[A-Za-z0-9_.`"\[\]]+` before a statement is built.

use crate::error::{ModelError, ModelResult};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z0-9_.`"\[\]]+$"#).expect("identifier pattern is valid")
});

static ALIAS_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+as\s+(.+)$").expect("alias pattern is valid"));

/// Validate a table or column name.
///
/// Accepts `orders.total`, `` `user`.`name` ``, `"id"` and `[id]`; rejects
/// whitespace, operators, semicolons and comment markers.
pub fn sanitize_identifier(identifier: &str) -> ModelResult<&str> {
    if identifier.is_empty() {
        return Err(ModelError::Validation("Identifier cannot be empty".to_string()));
    }
    if !IDENTIFIER.is_match(identifier) {
        return Err(ModelError::Validation(format!(
            "Invalid identifier '{}': only letters, digits, '_', '.', quotes and brackets are allowed",
            identifier
        )));
    }
    Ok(identifier)
}

/// Escape one identifier segment by doubling the quote character and
/// wrapping it.
pub fn escape_identifier(segment: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    let escaped = segment.replace(quote, &doubled);
    format!("{}{}{}", quote, escaped, quote)
}

/// Validate and quote an identifier for the given quote character.
///
/// Handles `table.column` paths, the `*` and `table.*` wildcards and
/// `column as alias`. Segments already wrapped in backticks, double quotes
/// or brackets are re-quoted with `quote`.
pub fn wrap_identifier(identifier: &str, quote: char) -> ModelResult<String> {
    let identifier = identifier.trim();
    if identifier == "*" {
        return Ok("*".to_string());
    }

    if let Some(caps) = ALIAS_SPLIT.captures(identifier) {
        let (column, alias) = (&caps[1], &caps[2]);
        let alias = sanitize_identifier(alias.trim())?;
        if alias.contains('.') {
            return Err(ModelError::Validation(format!("Invalid alias '{}'", alias)));
        }
        return Ok(format!(
            "{} AS {}",
            wrap_identifier(column, quote)?,
            escape_identifier(unquote(alias), quote)
        ));
    }

    let (path, wildcard) = match identifier.strip_suffix(".*") {
        Some(table) => (table, true),
        None => (identifier, false),
    };
    sanitize_identifier(path)?;

    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ModelError::Validation(format!("Invalid identifier '{}'", identifier)));
    }

    let mut wrapped = segments
        .iter()
        .map(|segment| escape_identifier(unquote(segment), quote))
        .collect::<Vec<_>>();
    if wildcard {
        wrapped.push("*".to_string());
    }

    Ok(wrapped.join("."))
}

fn unquote(segment: &str) -> &str {
    let bytes = segment.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'`' && last == b'`') || (first == b'"' && last == b'"') || (first == b'[' && last == b']') {
            return &segment[1..segment.len() - 1];
        }
    }
    segment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_qualified_and_quoted_names() {
        assert!(sanitize_identifier("id").is_ok());
        assert!(sanitize_identifier("orders.total").is_ok());
        assert!(sanitize_identifier("`user`.`name`").is_ok());
        assert!(sanitize_identifier("\"id\"").is_ok());
        assert!(sanitize_identifier("[order]").is_ok());
    }

    #[test]
    fn test_rejects_injection_attempts() {
        for bad in ["id; DROP TABLE users", "1=1 OR 1", "name--", "a b", "x'y", "col)", ""] {
            let err = sanitize_identifier(bad).unwrap_err();
            assert!(matches!(err, ModelError::Validation(_)), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_wrap_identifier_per_quote_style() {
        assert_eq!(wrap_identifier("orders.total", '"').unwrap(), "\"orders\".\"total\"");
        assert_eq!(wrap_identifier("orders.total", '`').unwrap(), "`orders`.`total`");
        assert_eq!(wrap_identifier("`user`.`name`", '"').unwrap(), "\"user\".\"name\"");
        assert_eq!(wrap_identifier("[order]", '`').unwrap(), "`order`");
    }

    #[test]
    fn test_wildcards_and_aliases() {
        assert_eq!(wrap_identifier("*", '"').unwrap(), "*");
        assert_eq!(wrap_identifier("products.*", '"').unwrap(), "\"products\".*");
        assert_eq!(
            wrap_identifier("products.name as product_name", '`').unwrap(),
            "`products`.`name` AS `product_name`"
        );
        assert!(wrap_identifier("name as x; drop", '"').is_err());
        assert!(wrap_identifier("*.id", '"').is_err());
        assert!(wrap_identifier("orders..total", '"').is_err());
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        assert_eq!(escape_identifier("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(wrap_identifier("a\"b", '"').unwrap(), "\"a\"\"b\"");
    }
}
