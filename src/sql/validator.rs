//! Read-only gate for generated SQL.
//!
//! Syntactic only: the statement must start with `SELECT` and must not be
//! followed by a second statement. It does not prove the query is free of
//! side effects; the execution gateway additionally runs it in a read-only
//! transaction.

use crate::error::{Nl2SqlError, Result};
use serde::Serialize;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// SQL that passed `validate`. Only the validator can construct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuery {
    sql: String,
}

impl ValidatedQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

pub fn validate(sql: &str) -> Result<ValidatedQuery> {
    let trimmed = sql.trim();

    let starts_with_select = trimmed
        .get(..6)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("select"));
    if !starts_with_select {
        let preview: String = trimmed.chars().take(40).collect();
        return Err(Nl2SqlError::NotSelect(preview));
    }

    ensure_single_statement(trimmed)?;

    Ok(ValidatedQuery {
        sql: trimmed.to_string(),
    })
}

/// Reject `SELECT ...; <anything>`. Trailing semicolons and comments are fine.
fn ensure_single_statement(sql: &str) -> Result<()> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| Nl2SqlError::NotSelect(format!("unreadable SQL: {}", e)))?;

    let mut seen_terminator = false;
    for token in tokens {
        match token {
            Token::SemiColon => seen_terminator = true,
            Token::Whitespace(_) | Token::EOF => {}
            _ if seen_terminator => return Err(Nl2SqlError::MultipleStatements),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_prefix_passes() {
        assert!(validate("select 1").is_ok());
        assert!(validate("Select * from X").is_ok());
        assert!(validate(" SELECT 1").is_ok());
        assert_eq!(validate("\n  SELECT 1  \n").unwrap().sql(), "SELECT 1");
    }

    #[test]
    fn test_non_select_fails() {
        assert!(matches!(validate("DROP TABLE X"), Err(Nl2SqlError::NotSelect(_))));
        assert!(matches!(validate("DELETE FROM Invoice"), Err(Nl2SqlError::NotSelect(_))));
        assert!(matches!(validate("WITH t AS (SELECT 1) SELECT * FROM t"), Err(Nl2SqlError::NotSelect(_))));
        assert!(matches!(validate(""), Err(Nl2SqlError::NotSelect(_))));
        assert!(matches!(validate("SEL"), Err(Nl2SqlError::NotSelect(_))));
    }

    #[test]
    fn test_trailing_semicolon_is_allowed() {
        assert!(validate("SELECT 1;").is_ok());
        assert!(validate("SELECT 1;  -- done\n").is_ok());
    }

    #[test]
    fn test_stacked_statements_are_rejected() {
        assert!(matches!(
            validate("SELECT 1; DROP TABLE \"Invoice\""),
            Err(Nl2SqlError::MultipleStatements)
        ));
        assert!(matches!(
            validate("select * from x;delete from x;"),
            Err(Nl2SqlError::MultipleStatements)
        ));
    }

    #[test]
    fn test_semicolons_inside_literals_are_fine() {
        assert!(validate("SELECT 'a;b' AS v").is_ok());
        assert!(validate("SELECT \"odd;name\" FROM t").is_ok());
    }

    #[test]
    fn test_non_ascii_prefix_does_not_panic() {
        assert!(validate("séléct 1").is_err());
    }
}
