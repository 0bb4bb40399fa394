//! SQL Normalizer
//!
//! Cleans raw model output into a single SQL string:
//! 1. strips markdown code fences (optionally tagged `sql`),
//! 2. trims surrounding whitespace,
//! 3. rewrites bare known identifiers to their quoted catalog casing.
//!
//! Step 3 runs over a small lexer so string literals, comments, quoted
//! identifiers and dollar-quoted bodies are copied through untouched and
//! only whole words are compared. `normalize` is idempotent.

use crate::schema::SchemaDescription;
use crate::sql::{has_uppercase, quote_ident};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref FENCE_OPEN: Regex =
        Regex::new(r"(?i)^```[ \t]*(?:(?:sql|postgresql|postgres|pgsql|psql)\b)?").unwrap();
    static ref FENCE_CLOSE: Regex = Regex::new(r"```$").unwrap();
}

/// PostgreSQL reserved key words (including those that may be function or type names).
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant", "group",
    "having", "ilike", "in", "initially", "inner", "intersect", "into", "is", "isnull",
    "join", "lateral", "leading", "left", "like", "limit", "localtime", "localtimestamp",
    "natural", "not", "notnull", "null", "offset", "on", "only", "or", "order", "outer",
    "overlaps", "placing", "primary", "references", "returning", "right", "select",
    "session_user", "similar", "some", "symmetric", "table", "tablesample", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "verbose", "when",
    "where", "window", "with",
];

/// Non-reserved words that still act as keywords next to literals and in EXTRACT.
const NON_RESERVED_KEYWORDS: &[&str] = &[
    "century", "date", "day", "decade", "dow", "doy", "epoch", "first", "hour", "interval",
    "isodow", "isoyear", "last", "microseconds", "millennium", "milliseconds", "minute",
    "month", "quarter", "second", "time", "timestamp", "timezone", "week", "year", "zone",
];

/// Words that close a FROM list.
const FROM_LIST_END: &[&str] = &[
    "where", "group", "having", "order", "limit", "offset", "on", "using", "union",
    "intersect", "except", "window", "fetch", "for", "select",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentKind {
    Table,
    Column,
}

#[derive(Debug, Clone)]
struct KnownIdent {
    name: String,
    kind: IdentKind,
}

/// Normalizer bound to one schema snapshot.
#[derive(Debug, Clone, Default)]
pub struct SqlNormalizer {
    identifiers: HashMap<String, KnownIdent>,
}

impl SqlNormalizer {
    pub fn new(schema: &SchemaDescription) -> Self {
        let mut identifiers = HashMap::new();
        let mut ambiguous_tables = HashSet::new();

        for table in &schema.tables {
            let key = table.name.to_lowercase();
            let conflicting = identifiers
                .get(&key)
                .map(|known: &KnownIdent| known.name != table.name);
            match conflicting {
                Some(true) => {
                    ambiguous_tables.insert(key);
                }
                Some(false) => {}
                None => {
                    identifiers.insert(
                        key,
                        KnownIdent {
                            name: table.name.clone(),
                            kind: IdentKind::Table,
                        },
                    );
                }
            }
        }
        for key in &ambiguous_tables {
            identifiers.remove(key);
        }

        // Every spelling of each column name, across all tables.
        let mut spellings: HashMap<String, HashSet<&str>> = HashMap::new();
        for column in schema.tables.iter().flat_map(|t| t.columns.iter()) {
            spellings
                .entry(column.name.to_lowercase())
                .or_default()
                .insert(column.name.as_str());
        }
        for (key, names) in spellings {
            if names.len() != 1 || identifiers.contains_key(&key) || ambiguous_tables.contains(&key) {
                continue;
            }
            if let Some(name) = names.into_iter().next() {
                if has_uppercase(name) {
                    identifiers.insert(
                        key,
                        KnownIdent {
                            name: name.to_string(),
                            kind: IdentKind::Column,
                        },
                    );
                }
            }
        }

        Self { identifiers }
    }

    /// Clean raw model output into normalized SQL.
    pub fn normalize(&self, raw: &str) -> String {
        let sql = strip_code_fences(raw);
        if self.identifiers.is_empty() {
            return sql.to_string();
        }
        self.quote_identifiers(sql)
    }

    fn quote_identifiers(&self, sql: &str) -> String {
        let chars: Vec<char> = sql.chars().collect();
        let mut out = String::with_capacity(sql.len() + 16);
        // Lowercased previous bare word, kept across whitespace and comments.
        let mut prev_word: Option<String> = None;
        // Previous punctuation character, when it came after the last word.
        let mut prev_symbol: Option<char> = None;
        let mut after_literal = false;
        let mut in_from_list = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            let end = match c {
                '\'' => {
                    prev_word = None;
                    prev_symbol = None;
                    after_literal = true;
                    skip_quoted(&chars, i, '\'', false)
                }
                '"' => {
                    prev_word = None;
                    prev_symbol = None;
                    after_literal = false;
                    skip_quoted(&chars, i, '"', false)
                }
                '-' if next == Some('-') => skip_line_comment(&chars, i),
                '/' if next == Some('*') => skip_block_comment(&chars, i),
                '$' => {
                    prev_word = None;
                    prev_symbol = None;
                    after_literal = false;
                    skip_dollar_quoted(&chars, i).unwrap_or(i + 1)
                }
                c if c.is_ascii_digit() => {
                    prev_word = None;
                    prev_symbol = None;
                    after_literal = false;
                    skip_while(&chars, i, |ch| ch.is_alphanumeric() || ch == '.' || ch == '_')
                }
                c if is_ident_start(c) => {
                    let end = skip_while(&chars, i, is_ident_char);
                    let word: String = chars[i..end].iter().collect();

                    // E'...' strings honour backslash escapes.
                    if word.eq_ignore_ascii_case("e") && chars.get(end) == Some(&'\'') {
                        out.push_str(&word);
                        prev_word = None;
                        prev_symbol = None;
                        after_literal = true;
                        let literal_end = skip_quoted(&chars, end, '\'', true);
                        out.extend(&chars[end..literal_end]);
                        i = literal_end;
                        continue;
                    }

                    let lower = word.to_lowercase();
                    let position = WordPosition {
                        prev_word: prev_word.as_deref(),
                        prev_symbol,
                        after_literal,
                        in_from_list,
                        next: next_significant(&chars, end),
                        next_word: next_word(&chars, end),
                    };
                    match self.rewrite(&lower, &position) {
                        Some(quoted) => out.push_str(&quoted),
                        None => {
                            out.push_str(&word);
                            in_from_list = match lower.as_str() {
                                "from" | "join" => true,
                                w if FROM_LIST_END.contains(&w) => false,
                                _ => in_from_list,
                            };
                        }
                    }
                    prev_word = Some(lower);
                    prev_symbol = None;
                    after_literal = false;
                    i = end;
                    continue;
                }
                c if c.is_whitespace() => i + 1,
                _ => {
                    prev_word = None;
                    prev_symbol = Some(c);
                    after_literal = false;
                    i + 1
                }
            };

            out.extend(&chars[i..end]);
            i = end;
        }

        out
    }

    fn rewrite(&self, lower: &str, at: &WordPosition<'_>) -> Option<String> {
        let ident = self.identifiers.get(lower)?;

        // Function call, not an identifier.
        if at.next == Some('(') {
            return None;
        }

        // `schema.table` and `alias.column` are always identifier positions.
        let qualified = at.prev_symbol == Some('.');

        if RESERVED_WORDS.contains(&lower) && !qualified {
            let relation_position = matches!(at.prev_word, Some("from") | Some("join"))
                || (at.prev_symbol == Some(',') && at.in_from_list);
            if ident.kind != IdentKind::Table || !relation_position {
                return None;
            }
        }

        if ident.kind == IdentKind::Column && !qualified && is_keyword_position(lower, at) {
            return None;
        }

        Some(quote_ident(&ident.name))
    }
}

/// What surrounds a bare word in the statement.
#[derive(Debug)]
struct WordPosition<'a> {
    prev_word: Option<&'a str>,
    prev_symbol: Option<char>,
    after_literal: bool,
    in_from_list: bool,
    next: Option<char>,
    next_word: Option<String>,
}

/// Places where a bare word is a type name, an alias or a keyword.
fn is_keyword_position(lower: &str, at: &WordPosition<'_>) -> bool {
    // `x::date`, `CAST(x AS date)` and `AS alias`.
    if at.prev_symbol == Some(':') || at.prev_word == Some("as") {
        return true;
    }
    if !NON_RESERVED_KEYWORDS.contains(&lower) {
        return false;
    }
    // DATE '2024-01-01', INTERVAL '1' DAY, NULLS FIRST, AT TIME ZONE, EXTRACT(YEAR FROM ..)
    at.next == Some('\'')
        || at.after_literal
        || matches!(at.prev_word, Some("nulls") | Some("at") | Some("time"))
        || (at.prev_symbol == Some('(') && at.next_word.as_deref() == Some("from"))
}

/// Remove surrounding markdown code fences and whitespace.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    loop {
        let before = text.len();
        if let Some(m) = FENCE_OPEN.find(text) {
            text = text[m.end()..].trim();
        }
        if let Some(m) = FENCE_CLOSE.find(text) {
            text = text[..m.start()].trim();
        }
        if text.len() == before {
            return text;
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn skip_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut i = start;
    while i < chars.len() && pred(chars[i]) {
        i += 1;
    }
    i
}

fn next_significant(chars: &[char], start: usize) -> Option<char> {
    chars[start..].iter().copied().find(|c| !c.is_whitespace())
}

/// Lowercased bare word following `start`, if the next token is one.
fn next_word(chars: &[char], start: usize) -> Option<String> {
    let begin = skip_while(chars, start, char::is_whitespace);
    if !chars.get(begin).copied().map_or(false, is_ident_start) {
        return None;
    }
    let end = skip_while(chars, begin, is_ident_char);
    Some(chars[begin..end].iter().collect::<String>().to_lowercase())
}

/// End (exclusive) of a quoted run starting at `start`. Doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn skip_line_comment(chars: &[char], start: usize) -> usize {
    skip_while(chars, start, |c| c != '\n')
}

/// Block comments nest in PostgreSQL.
fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('/', Some('*')) => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// `$tag$ ... $tag$`; `None` when `start` is not a dollar-quote opener (e.g. `$1`).
fn skip_dollar_quoted(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j).map_or(false, |c| c.is_ascii_digit()) {
        return None;
    }
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    if chars.get(j) != Some(&'$') {
        return None;
    }

    let delimiter = &chars[start..=j];
    let mut i = j + 1;
    while i + delimiter.len() <= chars.len() {
        if &chars[i..i + delimiter.len()] == delimiter {
            return Some(i + delimiter.len());
        }
        i += 1;
    }
    Some(chars.len())
}
