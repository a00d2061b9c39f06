//! Query model shared by all execution tiers
//!
//! - `Query` with structured descriptors (filters, aggregations, joins, sort)
//! - Lenient SQL-ish parser filling those descriptors from text
//! - `QueryShape` cost/complexity analysis used for tier selection
//! - `TierOutput`, the raw output every tier hands back

mod ast;
mod errors;
mod output;
mod parser;
mod shape;

pub use ast::{
    AggregateFunction, Aggregation, FilterOp, JoinSpec, Predicate, Query, SortDirection, SortSpec,
};
pub use errors::{QueryError, QueryResult};
pub use output::{infer_columns, ColumnInfo, ColumnType, TierOutput};
pub use parser::{extract_dataset, parse, parse_strict, ParsedSql};
pub use shape::QueryShape;
