//! Query Result - rows materialized as ordered column → value maps

use serde::{Deserialize, Serialize};

/// One result row. Keys keep the database's column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column labels in declared order
    pub columns: Vec<String>,

    pub rows: Vec<Row>,

    /// Set when the row cap stopped the fetch early
    pub truncated: bool,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>, truncated: bool) -> Self {
        Self {
            columns,
            rows,
            truncated,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Human-readable summary returned next to the data.
    pub fn explanation(&self) -> String {
        let mut explanation = format!(
            "Query executed successfully. Returned {} row(s).",
            self.rows.len()
        );
        if self.truncated {
            explanation.push_str(&format!(
                " Results were truncated to the first {} row(s).",
                self.rows.len()
            ));
        }
        explanation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explanation() {
        let mut row = Row::new();
        row.insert("sum".to_string(), json!(1250.5));
        let result = ResultSet::new(vec!["sum".to_string()], vec![row], false);
        assert_eq!(result.explanation(), "Query executed successfully. Returned 1 row(s).");

        let capped = ResultSet::new(vec![], vec![Row::new(), Row::new()], true);
        assert!(capped.explanation().ends_with("truncated to the first 2 row(s)."));
    }

    #[test]
    fn test_rows_keep_column_order() {
        let mut row = Row::new();
        row.insert("zeta".to_string(), json!(1));
        row.insert("alpha".to_string(), json!(2));
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"zeta":1,"alpha":2}"#);
    }
}
