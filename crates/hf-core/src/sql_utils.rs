//! SQL identifier quoting utilities
//!
//! Provides safe quoting for SQL identifiers and qualified relation names to
//! prevent SQL injection when constructing dynamic SQL statements.

/// Quote a SQL identifier to prevent injection.
///
/// Wraps the identifier in double quotes and escapes any embedded double quotes
/// by doubling them, following the SQL standard.
///
/// # Examples
/// ```
/// use hf_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("orders"), r#""orders""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render a quoted, schema-qualified relation name.
///
/// An empty schema is meaningful (no default schema) and yields the bare
/// quoted identifier.
///
/// # Examples
/// ```
/// use hf_core::sql_utils::qualified_name;
/// assert_eq!(qualified_name("analytics", "orders"), r#""analytics"."orders""#);
/// assert_eq!(qualified_name("", "orders"), r#""orders""#);
/// ```
pub fn qualified_name(schema: &str, name: &str) -> String {
    if schema.is_empty() {
        quote_ident(name)
    } else {
        format!("{}.{}", quote_ident(schema), quote_ident(name))
    }
}

/// Escape a SQL string literal value by doubling single quotes.
///
/// This is for use inside single-quoted SQL string literals, not identifiers.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
