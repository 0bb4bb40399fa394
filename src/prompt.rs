//! Prompt construction for SQL generation
//!
//! `build_prompt` is a pure function of the question and the schema
//! snapshot: the same inputs always render the same text.

use crate::schema::SchemaDescription;
use crate::sql::{has_uppercase, quote_ident};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fmt::Write;

/// System message sent alongside every generation prompt.
pub const SYSTEM_PROMPT: &str = "You are a SQL expert. Generate only valid PostgreSQL SELECT queries. Return only the SQL, no explanations.";

/// Maximum number of mixed-case column names listed in the quoting rule.
const COLUMN_HINT_LIMIT: usize = 8;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)(?:\.(\w+))?\}").unwrap();
}

/// A worked example whose SQL names tables as `{Table}` and columns as
/// `{Table.column}`. It renders only when every placeholder resolves
/// against the live schema.
struct ExampleTemplate {
    question: &'static str,
    sql: &'static str,
}

const EXAMPLES: &[ExampleTemplate] = &[
    ExampleTemplate {
        question: "What's the total spend?",
        sql: "SELECT SUM({Invoice.totalAmount}) FROM {Invoice};",
    },
    ExampleTemplate {
        question: "List top 5 vendors by spend",
        sql: "SELECT v.{Vendor.vendorName}, SUM(i.{Invoice.totalAmount}) AS total_spend FROM {Vendor} v JOIN {Invoice} i ON v.{Vendor.id} = i.{Invoice.vendorId} GROUP BY v.{Vendor.id}, v.{Vendor.vendorName} ORDER BY total_spend DESC LIMIT 5;",
    },
    ExampleTemplate {
        question: "Show overdue invoices",
        sql: "SELECT i.* FROM {Invoice} i JOIN {Payment} p ON i.{Invoice.id} = p.{Payment.invoiceId} WHERE p.{Payment.dueDate} < CURRENT_DATE AND p.{Payment.status} != 'paid';",
    },
    ExampleTemplate {
        question: "Which customers have the most invoices?",
        sql: "SELECT c.{Customer.name}, COUNT(i.{Invoice.id}) AS invoice_count FROM {Customer} c JOIN {Invoice} i ON c.{Customer.id} = i.{Invoice.customerId} GROUP BY c.{Customer.id}, c.{Customer.name} ORDER BY invoice_count DESC LIMIT 10;",
    },
];

impl ExampleTemplate {
    fn render(&self, schema: &SchemaDescription) -> Option<String> {
        let mut resolved = true;
        let sql = PLACEHOLDER.replace_all(self.sql, |caps: &Captures| {
            let table = schema.find_table(&caps[1]);
            let name = match (table, caps.get(2)) {
                (Some(table), Some(column)) => table.find_column(column.as_str()).map(|c| c.name.as_str()),
                (Some(table), None) => Some(table.name.as_str()),
                (None, _) => None,
            };
            match name {
                Some(name) => quote_ident(name),
                None => {
                    resolved = false;
                    String::new()
                }
            }
        });

        if resolved {
            Some(format!("- \"{}\" -> {}", self.question, sql))
        } else {
            None
        }
    }
}

/// Build the generation prompt for `question` against `schema`.
pub fn build_prompt(question: &str, schema: &SchemaDescription) -> String {
    let mut prompt = String::from(
        "You are a SQL expert. Generate a PostgreSQL query based on the natural language question.\n\n",
    );

    render_schema(&mut prompt, schema);
    prompt.push('\n');
    render_examples(&mut prompt, schema);
    prompt.push('\n');
    render_rules(&mut prompt, schema);

    let _ = write!(prompt, "\nNatural language question: {}", question);
    prompt
}

fn render_schema(out: &mut String, schema: &SchemaDescription) {
    if schema.is_empty() {
        out.push_str("Database Schema: no schema information is available. Only reference tables you are certain exist.\n");
        return;
    }

    out.push_str("Database Schema (PostgreSQL - use EXACT table names as shown):\n");
    for table in &schema.tables {
        let _ = writeln!(out, "\nTable: {} (use EXACT name with quotes)", quote_ident(&table.name));
        out.push_str("Columns:\n");
        for column in &table.columns {
            let _ = write!(out, "  - {} ({})", quote_ident(&column.name), column.data_type);
            if column.nullable {
                out.push_str(" [nullable]");
            }
            out.push('\n');
        }
    }
}

fn render_examples(out: &mut String, schema: &SchemaDescription) {
    let mut lines: Vec<String> = EXAMPLES.iter().filter_map(|e| e.render(schema)).collect();

    if let Some(table) = schema.tables.first() {
        let quoted = quote_ident(&table.name);
        lines.push(format!(
            "- \"How many rows are in {}?\" -> SELECT COUNT(*) FROM {};",
            table.name, quoted
        ));
        lines.push(format!(
            "- \"Show 10 rows from {}\" -> SELECT * FROM {} LIMIT 10;",
            table.name, quoted
        ));
    }

    if lines.is_empty() {
        return;
    }

    let table_list = schema
        .table_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Example queries (using actual table names: {}):", table_list);
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

fn render_rules(out: &mut String, schema: &SchemaDescription) {
    let tables = schema
        .table_names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");

    let mut mixed_case_columns: Vec<&str> = Vec::new();
    for column in schema.tables.iter().flat_map(|t| t.columns.iter()) {
        if has_uppercase(&column.name) && !mixed_case_columns.contains(&column.name.as_str()) {
            mixed_case_columns.push(&column.name);
        }
    }
    let columns = mixed_case_columns
        .into_iter()
        .take(COLUMN_HINT_LIMIT)
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");

    out.push_str("CRITICAL RULES:\n");
    out.push_str("- Only generate SELECT queries (read-only)\n");
    out.push_str("- Use proper PostgreSQL syntax\n");
    out.push_str("- Identifiers containing capital letters MUST be wrapped in double quotes\n");
    if tables.is_empty() {
        out.push_str("- Use table names EXACTLY as they exist in the database\n");
    } else {
        let _ = writeln!(out, "- Use table names EXACTLY as shown in the schema, with quotes: {}", tables);
    }
    if columns.is_empty() {
        out.push_str("- Use column names EXACTLY as shown in the schema\n");
    } else {
        let _ = writeln!(
            out,
            "- Use column names EXACTLY as shown in the schema, with quotes when they contain capital letters: {}",
            columns
        );
    }
    out.push_str("- For dates, use CURRENT_DATE, NOW(), or proper date functions\n");
    out.push_str("- Use explicit JOIN ... ON clauses between key columns, and qualify columns with a table alias when joining\n");
    out.push_str("- Return ONLY the SQL query, no explanations or markdown formatting\n");
    out.push_str("- Do not include any text before or after the SQL query\n");
    out.push_str("- PostgreSQL is case-sensitive - use EXACT table and column names from the schema\n");
}
