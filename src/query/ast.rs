//! Query model shared by every execution tier
//!
//! A `Query` carries the raw SQL-like text plus structured descriptors.
//! `Query::new` runs the lenient parser so that plain SQL is executable;
//! builders add or override descriptors.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::QueryResult;
use super::parser::{self, ParsedSql};

/// Filter operation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FilterOp {
    /// field = value
    Eq(Value),
    /// field != value
    Ne(Value),
    /// field > value
    Gt(Value),
    /// field >= value
    Gte(Value),
    /// field < value
    Lt(Value),
    /// field <= value
    Lte(Value),
    /// field IN (values)
    In(Vec<Value>),
    /// field LIKE pattern (`%` any run, `_` one char)
    Like(String),
}

impl FilterOp {
    /// Returns true if this is an equality operation
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq(_))
    }

    /// Returns true if this is a range operation
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::Gte(_) | FilterOp::Gt(_) | FilterOp::Lte(_) | FilterOp::Lt(_)
        )
    }

    /// Returns the operator as written in SQL
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "=",
            FilterOp::Ne(_) => "!=",
            FilterOp::Gt(_) => ">",
            FilterOp::Gte(_) => ">=",
            FilterOp::Lt(_) => "<",
            FilterOp::Lte(_) => "<=",
            FilterOp::In(_) => "in",
            FilterOp::Like(_) => "like",
        }
    }

    /// Rough selectivity rank, most selective first
    pub fn selectivity_rank(&self) -> u8 {
        match self {
            FilterOp::Eq(_) => 0,
            FilterOp::Gt(_) | FilterOp::Gte(_) | FilterOp::Lt(_) | FilterOp::Lte(_) => 1,
            FilterOp::In(_) => 2,
            FilterOp::Like(_) => 3,
            FilterOp::Ne(_) => 4,
        }
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field name
    pub field: String,
    /// Filter operation
    pub op: FilterOp,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    /// Create an equality predicate
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq(value))
    }

    /// Create an inequality predicate
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Ne(value))
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gt(value))
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gte(value))
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lt(value))
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lte(value))
    }

    /// Create a membership predicate
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOp::In(values))
    }

    /// Create a pattern predicate
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOp::Like(pattern.into()))
    }

    /// Returns true if this is an equality predicate
    pub fn is_equality(&self) -> bool {
        self.op.is_equality()
    }

    /// Returns true if this is a range predicate
    pub fn is_range(&self) -> bool {
        self.op.is_range()
    }
}

/// Aggregation functions supported by every tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
        }
    }

    /// Parse a function name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" => Some(AggregateFunction::Avg),
            "max" => Some(AggregateFunction::Max),
            "min" => Some(AggregateFunction::Min),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One aggregation in the select list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    /// Target field; `None` means `*`
    pub field: Option<String>,
    /// Output column name override
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(function: AggregateFunction, field: Option<&str>) -> Self {
        Self {
            function,
            field: field.map(str::to_string),
            alias: None,
        }
    }

    /// COUNT(*)
    pub fn count_all() -> Self {
        Self::new(AggregateFunction::Count, None)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Column name in the summary record
    ///
    /// `alias`, else `count` for COUNT(*), else `{function}_{field}`.
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.field {
            Some(field) => format!("{}_{}", self.function.as_str(), field),
            None => self.function.as_str().to_string(),
        }
    }
}

/// Join descriptor; only its presence feeds cost estimation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub table: String,
    pub on: String,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// An analytical query
#[derive(Debug, Clone)]
pub struct Query {
    /// Query identifier
    pub id: String,
    /// Raw SQL-like text
    pub sql: String,
    /// Target dataset / table
    pub dataset: Option<String>,
    /// Filter predicates (combined with AND)
    pub filters: Vec<Predicate>,
    /// Aggregations; when present the result collapses to one record
    pub aggregations: Vec<Aggregation>,
    /// Joins
    pub joins: Vec<JoinSpec>,
    /// Sort order
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Named parameters, ordered by name
    pub parameters: BTreeMap<String, Value>,
    /// Whether the result may be cached
    pub cacheable: bool,
    /// Cache TTL override
    pub cache_timeout: Option<Duration>,
    /// Optimizer rules applied to this query
    pub optimizations: Vec<String>,
}

impl Query {
    /// Creates a query from SQL text, filling descriptors the lenient parser recognises
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let parsed = parser::parse(&sql);
        Self::from_parts(sql, parsed)
    }

    /// Creates a query from SQL text, rejecting conditions the parser cannot read
    pub fn parse(sql: impl Into<String>) -> QueryResult<Self> {
        let sql = sql.into();
        let parsed = parser::parse_strict(&sql)?;
        Ok(Self::from_parts(sql, parsed))
    }

    /// Creates a full scan over a dataset
    pub fn scan(dataset: impl Into<String>) -> Self {
        let dataset = dataset.into();
        Self::new(format!("SELECT * FROM {}", dataset))
    }

    fn from_parts(sql: String, parsed: ParsedSql) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sql,
            dataset: parsed.dataset,
            filters: parsed.filters,
            aggregations: parsed.aggregations,
            joins: parsed.joins,
            sort: parsed.sort,
            limit: parsed.limit,
            offset: parsed.offset,
            parameters: BTreeMap::new(),
            cacheable: true,
            cache_timeout: None,
            optimizations: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Adds a predicate
    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Adds an equality filter
    pub fn filter_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with_filter(Predicate::eq(field, value))
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn with_join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(JoinSpec {
            table: table.into(),
            on: on.into(),
        });
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Binds a named parameter
    ///
    /// Filter values written as `:name` in the SQL are replaced by `value`.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        let placeholder = Value::String(format!(":{}", name));
        for predicate in &mut self.filters {
            bind_placeholder(&mut predicate.op, &placeholder, &value);
        }
        self.parameters.insert(name, value);
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = Some(timeout);
        self
    }

    /// Records an optimizer rule as applied
    pub fn annotate(&mut self, rule: impl Into<String>) {
        let rule = rule.into();
        if !self.optimizations.contains(&rule) {
            self.optimizations.push(rule);
        }
    }

    /// Target dataset: explicit descriptor, else the `FROM <name>` pattern
    pub fn dataset_name(&self) -> Option<String> {
        self.dataset
            .clone()
            .or_else(|| parser::extract_dataset(&self.sql))
    }

    /// Distinct filter columns in predicate order
    pub fn filter_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for predicate in &self.filters {
            if !columns.contains(&predicate.field) {
                columns.push(predicate.field.clone());
            }
        }
        columns
    }

    /// Canonical text of the structured descriptors
    ///
    /// Covers dataset, filters, aggregations, joins, sort and slicing, but
    /// not the id, the SQL text or the parameters.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.dataset_name(),
            self.filters,
            self.aggregations,
            self.joins,
            self.sort,
            self.limit,
            self.offset
        )
    }

    /// Structural hash of the query shape
    ///
    /// Independent of the query id and of SQL whitespace: two queries with
    /// the same fingerprint collide.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.fingerprint().hash(&mut hasher);
        hasher.finish()
    }
}

fn bind_placeholder(op: &mut FilterOp, placeholder: &Value, value: &Value) {
    match op {
        FilterOp::Eq(v)
        | FilterOp::Ne(v)
        | FilterOp::Gt(v)
        | FilterOp::Gte(v)
        | FilterOp::Lt(v)
        | FilterOp::Lte(v) => {
            if v == placeholder {
                *v = value.clone();
            }
        }
        FilterOp::In(values) => {
            for v in values.iter_mut() {
                if v == placeholder {
                    *v = value.clone();
                }
            }
        }
        FilterOp::Like(pattern) => {
            if let (Value::String(p), Value::String(bound)) = (placeholder, value) {
                if pattern == p {
                    *pattern = bound.clone();
                }
            }
        }
    }
}
