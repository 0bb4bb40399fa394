//! Post-processing of model-generated SQL: normalization and the read-only gate.

pub mod normalizer;
pub mod validator;

pub use normalizer::SqlNormalizer;
pub use validator::{validate, ValidatedQuery};

/// Quote a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Unquoted identifiers fold to lowercase in PostgreSQL, so these need quoting.
pub fn has_uppercase(name: &str) -> bool {
    name.chars().any(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Invoice"), "\"Invoice\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
