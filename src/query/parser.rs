//! Lenient SQL-ish parser
//!
//! Recognises the subset every tier can execute:
//! - `SELECT <aggregates> FROM <dataset>`
//! - `JOIN <table> ON a = b`
//! - `WHERE` conjunctions of `=, !=, <>, >, >=, <, <=, IN (...), LIKE '...'`
//! - `ORDER BY <field> [ASC|DESC]`, `LIMIT n`, `OFFSET n`
//!
//! Anything else is left in `ParsedSql::unparsed` rather than rejected.
//! Literal values written as `:name` are parameter placeholders.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

use super::ast::{AggregateFunction, Aggregation, JoinSpec, Predicate, SortSpec};
use super::errors::{QueryError, QueryResult};

/// Descriptors recognised in a SQL string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSql {
    pub dataset: Option<String>,
    pub filters: Vec<Predicate>,
    pub aggregations: Vec<Aggregation>,
    pub joins: Vec<JoinSpec>,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// WHERE conditions that could not be read
    pub unparsed: Vec<String>,
}

fn compile(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn from_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(&RE, r"(?i)\bFROM\s+([A-Za-z_][A-Za-z0-9_.]*)")
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(&RE, r"(?is)^\s*SELECT\s+(?:DISTINCT\s+)?(.+?)\s+FROM\b")
}

pub(crate) fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(
        &RE,
        r"(?i)\b(COUNT|SUM|AVG|MAX|MIN)\s*\(\s*(\*|[A-Za-z_][A-Za-z0-9_.]*)\s*\)(\s+OVER\b)?(?:\s+AS\s+([A-Za-z_][A-Za-z0-9_]*))?",
    )
}

fn join_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(
        &RE,
        r"(?i)\bJOIN\s+([A-Za-z_][A-Za-z0-9_.]*)(?:\s+(?:AS\s+)?[A-Za-z_][A-Za-z0-9_]*)?\s+ON\s+([A-Za-z0-9_.]+\s*=\s*[A-Za-z0-9_.]+)",
    )
}

fn where_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(
        &RE,
        r"(?is)\bWHERE\s+(.+?)(?:\s+GROUP\s+BY\b|\s+ORDER\s+BY\b|\s+LIMIT\b|\s+OFFSET\b|\s+UNION\b|\s*;|\s*$)",
    )
}

fn condition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(
        &RE,
        r"(?is)^([A-Za-z_][A-Za-z0-9_.]*)\s*(NOT\s+LIKE|NOT\s+IN|LIKE|IN|!=|<>|>=|<=|=|>|<)\s*(.+)$",
    )
}

fn order_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(
        &RE,
        r"(?i)\bORDER\s+BY\s+([A-Za-z_][A-Za-z0-9_.]*)(?:\s+(ASC|DESC))?",
    )
}

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(&RE, r"(?i)\bLIMIT\s+(\d+)")
}

fn offset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    compile(&RE, r"(?i)\bOFFSET\s+(\d+)")
}

/// Target dataset from the first `FROM <name>`
pub fn extract_dataset(sql: &str) -> Option<String> {
    from_re()
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parses what it can; never fails
pub fn parse(sql: &str) -> ParsedSql {
    let mut parsed = ParsedSql {
        dataset: extract_dataset(sql),
        ..ParsedSql::default()
    };

    if let Some(select) = select_re().captures(sql).and_then(|c| c.get(1)) {
        parsed.aggregations = parse_aggregations(select.as_str());
    }

    for caps in join_re().captures_iter(sql) {
        parsed.joins.push(JoinSpec {
            table: caps[1].to_string(),
            on: caps[2].to_string(),
        });
    }

    if let Some(clause) = where_re().captures(sql).and_then(|c| c.get(1)) {
        for condition in split_conjuncts(clause.as_str()) {
            match parse_condition(&condition) {
                Some(predicate) => parsed.filters.push(predicate),
                None => parsed.unparsed.push(condition),
            }
        }
    }

    if let Some(caps) = order_re().captures(sql) {
        let field = unqualified(&caps[1]);
        parsed.sort = Some(match caps.get(2) {
            Some(dir) if dir.as_str().eq_ignore_ascii_case("desc") => SortSpec::desc(field),
            _ => SortSpec::asc(field),
        });
    }

    parsed.limit = limit_re()
        .captures(sql)
        .and_then(|c| c[1].parse::<usize>().ok());
    parsed.offset = offset_re()
        .captures(sql)
        .and_then(|c| c[1].parse::<usize>().ok());

    parsed
}

/// Parses and rejects text without a dataset or with unreadable conditions
pub fn parse_strict(sql: &str) -> QueryResult<ParsedSql> {
    if sql.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    let parsed = parse(sql);
    if parsed.dataset.is_none() {
        return Err(QueryError::MissingDataset(sql.trim().to_string()));
    }
    if let Some(condition) = parsed.unparsed.first() {
        return Err(QueryError::UnsupportedCondition(condition.clone()));
    }
    Ok(parsed)
}

fn parse_aggregations(select_list: &str) -> Vec<Aggregation> {
    aggregate_re()
        .captures_iter(select_list)
        .filter(|caps| caps.get(3).is_none())
        .filter_map(|caps| {
            let function = AggregateFunction::parse(&caps[1])?;
            let field = match &caps[2] {
                "*" => None,
                f => Some(unqualified(f)),
            };
            Some(Aggregation {
                function,
                field,
                alias: caps.get(4).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

fn parse_condition(condition: &str) -> Option<Predicate> {
    let condition = strip_parens(condition.trim());
    let caps = condition_re().captures(condition)?;
    let field = unqualified(&caps[1]);
    let op = caps[2].split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    let raw = caps[3].trim();

    match op.as_str() {
        "=" => parse_literal(raw).map(|v| Predicate::eq(field, v)),
        "!=" | "<>" => parse_literal(raw).map(|v| Predicate::ne(field, v)),
        ">" => parse_literal(raw).map(|v| Predicate::gt(field, v)),
        ">=" => parse_literal(raw).map(|v| Predicate::gte(field, v)),
        "<" => parse_literal(raw).map(|v| Predicate::lt(field, v)),
        "<=" => parse_literal(raw).map(|v| Predicate::lte(field, v)),
        "IN" => parse_list(raw).map(|values| Predicate::in_list(field, values)),
        "LIKE" => match parse_literal(raw)? {
            Value::String(pattern) => Some(Predicate::like(field, pattern)),
            _ => None,
        },
        _ => None,
    }
}

fn parse_list(raw: &str) -> Option<Vec<Value>> {
    let inner = raw.strip_prefix('(')?.strip_suffix(')')?;
    if inner.to_ascii_uppercase().contains("SELECT") {
        return None;
    }
    split_top_level(inner, ',')
        .iter()
        .map(|item| parse_literal(item))
        .collect()
}

/// Parses a single literal: quoted string, number, boolean, null or `:param`
pub(crate) fn parse_literal(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.len() >= 2 {
        for quote in ['\'', '"'] {
            if raw.starts_with(quote) && raw.ends_with(quote) {
                let inner = &raw[1..raw.len() - 1];
                let doubled: String = [quote, quote].iter().collect();
                if inner.replace(&doubled, "").contains(quote) {
                    return None;
                }
                return Some(Value::String(inner.replace(&doubled, &quote.to_string())));
            }
        }
    }

    match raw.to_ascii_lowercase().as_str() {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }

    if let Some(name) = raw.strip_prefix(':') {
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Some(Value::String(raw.to_string()));
        }
        return None;
    }

    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::from(i));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Splits a WHERE clause on top-level `AND`
fn split_conjuncts(clause: &str) -> Vec<String> {
    let bytes = clause.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ if depth == 0 && b.is_ascii_whitespace() && is_and_at(bytes, i) => {
                    parts.push(clause[start..i].trim().to_string());
                    i += 5;
                    start = i;
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }

    let tail = clause[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

fn is_and_at(bytes: &[u8], i: usize) -> bool {
    bytes.len() > i + 4
        && bytes[i + 1..i + 4].eq_ignore_ascii_case(b"and")
        && bytes[i + 4].is_ascii_whitespace()
}

fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == separator => items.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }
    items.push(current);
    items
}

fn strip_parens(mut text: &str) -> &str {
    while text.starts_with('(') && text.ends_with(')') && wraps_whole(text) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

fn wraps_whole(text: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn unqualified(field: &str) -> String {
    field.rsplit('.').next().unwrap_or(field).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{FilterOp, SortDirection};
    use serde_json::json;

    #[test]
    fn test_parse_simple_select() {
        let parsed = parse("SELECT * FROM orders WHERE status = 'pending'");

        assert_eq!(parsed.dataset.as_deref(), Some("orders"));
        assert_eq!(parsed.filters, vec![Predicate::eq("status", json!("pending"))]);
        assert!(parsed.aggregations.is_empty());
        assert!(parsed.unparsed.is_empty());
    }

    #[test]
    fn test_parse_conjunction_and_operators() {
        let parsed = parse(
            "select * from orders where amount >= 10 AND amount < 99.5 and status != 'void' AND region <> 'eu'",
        );

        assert_eq!(
            parsed.filters,
            vec![
                Predicate::gte("amount", json!(10)),
                Predicate::lt("amount", json!(99.5)),
                Predicate::ne("status", json!("void")),
                Predicate::ne("region", json!("eu")),
            ]
        );
    }

    #[test]
    fn test_parse_in_and_like() {
        let parsed = parse(
            "SELECT * FROM users WHERE type IN ('admin', 'owner') AND name LIKE 'al%'",
        );

        assert_eq!(
            parsed.filters,
            vec![
                Predicate::in_list("type", vec![json!("admin"), json!("owner")]),
                Predicate::like("name", "al%"),
            ]
        );
    }

    #[test]
    fn test_and_inside_string_is_not_split() {
        let parsed = parse("SELECT * FROM notes WHERE title = 'salt and pepper'");
        assert_eq!(parsed.filters, vec![Predicate::eq("title", json!("salt and pepper"))]);
    }

    #[test]
    fn test_escaped_quote() {
        let parsed = parse("SELECT * FROM notes WHERE title = 'it''s'");
        assert_eq!(parsed.filters, vec![Predicate::eq("title", json!("it's"))]);
    }

    #[test]
    fn test_parse_order_limit_offset() {
        let parsed = parse("SELECT * FROM events ORDER BY timestamp DESC LIMIT 20 OFFSET 40");

        let sort = parsed.sort.unwrap();
        assert_eq!(sort.field, "timestamp");
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(parsed.limit, Some(20));
        assert_eq!(parsed.offset, Some(40));
    }

    #[test]
    fn test_where_stops_at_order_by() {
        let parsed = parse("SELECT * FROM events WHERE type = 'click' ORDER BY timestamp");
        assert_eq!(parsed.filters, vec![Predicate::eq("type", json!("click"))]);
    }

    #[test]
    fn test_parse_aggregations() {
        let parsed = parse("SELECT COUNT(*), SUM(amount) AS total, avg(o.amount) FROM orders");

        assert_eq!(parsed.aggregations.len(), 3);
        assert_eq!(parsed.aggregations[0], Aggregation::count_all());
        assert_eq!(parsed.aggregations[1].alias.as_deref(), Some("total"));
        assert_eq!(parsed.aggregations[2].field.as_deref(), Some("amount"));
    }

    #[test]
    fn test_window_function_is_not_an_aggregation() {
        let parsed = parse("SELECT SUM(amount) OVER (PARTITION BY userId) FROM orders");
        assert!(parsed.aggregations.is_empty());
    }

    #[test]
    fn test_parse_join() {
        let parsed = parse("SELECT * FROM orders o JOIN users u ON o.userId = u.id");

        assert_eq!(parsed.joins.len(), 1);
        assert_eq!(parsed.joins[0].table, "users");
        assert_eq!(parsed.joins[0].on, "o.userId = u.id");
    }

    #[test]
    fn test_unreadable_condition_is_kept_aside() {
        let parsed = parse("SELECT * FROM orders WHERE status = 'a' OR status = 'b'");
        assert!(parsed.filters.is_empty());
        assert_eq!(parsed.unparsed.len(), 1);

        let err = parse_strict("SELECT * FROM orders WHERE status = 'a' OR status = 'b'").unwrap_err();
        assert_eq!(err.code(), "QUERY_UNSUPPORTED_CONDITION");
    }

    #[test]
    fn test_parse_strict_requires_dataset() {
        assert_eq!(parse_strict("   ").unwrap_err(), QueryError::EmptyQuery);
        assert!(matches!(
            parse_strict("SELECT 1").unwrap_err(),
            QueryError::MissingDataset(_)
        ));
    }

    #[test]
    fn test_parameter_placeholder() {
        let parsed = parse("SELECT * FROM orders WHERE userId = :user");
        assert_eq!(parsed.filters[0].op, FilterOp::Eq(json!(":user")));
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("42"), Some(json!(42)));
        assert_eq!(parse_literal("-1.5"), Some(json!(-1.5)));
        assert_eq!(parse_literal("TRUE"), Some(json!(true)));
        assert_eq!(parse_literal("null"), Some(Value::Null));
        assert_eq!(parse_literal("\"x\""), Some(json!("x")));
        assert_eq!(parse_literal("bare_word"), None);
    }

    #[test]
    fn test_parenthesised_condition() {
        let parsed = parse("SELECT * FROM orders WHERE (status = 'pending')");
        assert_eq!(parsed.filters, vec![Predicate::eq("status", json!("pending"))]);
    }
}
