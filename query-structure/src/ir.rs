//! The JSON query IR: `model` + `action` + `args`. This is the wire
//! contract between a client and the compiler.

use crate::filter::Where;
use indexmap::IndexMap;
use prisma_value::PrismaValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    Count,
    Aggregate,
    GroupBy,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        use Action::*;
        Some(match name {
            "findUnique" => FindUnique,
            "findUniqueOrThrow" => FindUniqueOrThrow,
            "findFirst" => FindFirst,
            "findFirstOrThrow" => FindFirstOrThrow,
            "findMany" => FindMany,
            "create" => Create,
            "createMany" => CreateMany,
            "update" => Update,
            "updateMany" => UpdateMany,
            "upsert" => Upsert,
            "delete" => Delete,
            "deleteMany" => DeleteMany,
            "count" => Count,
            "aggregate" => Aggregate,
            "groupBy" => GroupBy,
            _ => return None,
        })
    }

    /// Whether this action is expected to yield at most one row, and
    /// therefore compiles with `LIMIT 1` instead of the caller-supplied
    /// `take`.
    pub fn is_single_row(&self) -> bool {
        matches!(
            self,
            Action::FindUnique | Action::FindUniqueOrThrow | Action::FindFirst | Action::FindFirstOrThrow
        )
    }

    pub fn or_throw(&self) -> bool {
        matches!(self, Action::FindUniqueOrThrow | Action::FindFirstOrThrow)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone)]
pub struct OrderByEntry {
    pub field: String,
    pub order: SortOrder,
    pub nulls: Option<NullsOrder>,
}

/// The selection tree: which scalars to return, and which relations to
/// recurse into (optionally restricting their own selection).
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// `None` means "all scalars" (`SELECT *`); `Some` lists the chosen
    /// scalar field names explicitly.
    pub scalars: Option<Vec<String>>,
    pub include: IndexMap<String, IncludeEntry>,
}

#[derive(Debug, Clone)]
pub struct IncludeEntry {
    pub nested: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Avg,
    Sum,
    Count,
    First,
}

impl AggregateOp {
    pub fn parse(name: &str) -> Option<Self> {
        use AggregateOp::*;
        Some(match name {
            "min" => Min,
            "max" => Max,
            "avg" => Avg,
            "sum" => Sum,
            "count" => Count,
            "first" => First,
            _ => return None,
        })
    }

    pub fn sql_fn(&self) -> &'static str {
        match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Avg => "AVG",
            AggregateOp::Sum => "SUM",
            AggregateOp::Count => "COUNT",
            AggregateOp::First => "MIN", // `first` over an ordered subquery degenerates to a bounded MIN/ORDER BY; see compiler.
        }
    }
}

/// A scalar sub-SELECT evaluated against a related model, correlated to
/// the outer row via `FieldRef`.
#[derive(Debug, Clone)]
pub struct ComputedField {
    pub field: String,
    pub operation: AggregateOp,
    pub from: String,
    pub where_: Option<ComputedWhere>,
    pub order_by: Option<OrderByEntry>,
}

/// The `where` clause of a computed field. Values may either be
/// `FieldRef(outer_column)`, resolving to the base table alias, or
/// ordinary parameterized literals.
#[derive(Debug, Clone, Default)]
pub struct ComputedWhere {
    pub conditions: Vec<ComputedCondition>,
}

#[derive(Debug, Clone)]
pub enum ComputedOperand {
    FieldRef(String),
    Value(PrismaValue),
}

#[derive(Debug, Clone)]
pub struct ComputedCondition {
    pub column: String,
    pub operand: ComputedOperand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
}

/// `args.arguments`: the recognized, heterogeneous argument bag.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub where_: Option<Where>,
    pub data: Option<serde_json::Value>,
    pub create_data: Option<serde_json::Value>,
    pub update_data: Option<serde_json::Value>,
    pub order_by: Vec<OrderByEntry>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub aggregate: Option<AggregateArgs>,
    pub by: Vec<String>,
    pub distinct: bool,
    pub distinct_fields: Vec<String>,
    /// `_computed`: correlated sub-SELECTs to splice into the SELECT
    /// list of a `findUnique`/`findFirst`/`findMany`.
    pub computed: Vec<ComputedField>,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateArgs {
    pub count: Option<CountSpec>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub count_filtered: Vec<FilteredAggregate>,
    pub avg_filtered: Vec<FilteredAggregate>,
}

#[derive(Debug, Clone)]
pub enum CountSpec {
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct FilteredAggregate {
    pub alias: String,
    pub column: Option<String>,
    pub filter: Where,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub arguments: Arguments,
    pub selection: Selection,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub model: String,
    pub action: Action,
    pub args: Args,
}
