//! Schema registry and JSON query IR: the data model consumed by the SQL
//! compiler. Populated once at startup (the registry) or once per
//! request (the IR), then read-only for the rest of its lifetime.

pub mod builder;
pub mod filter;
pub mod ir;
pub mod registry;

pub use builder::{BuilderError, QueryBuilder};
pub use filter::{
    FilterParseError, FilterValue, RelationFilter, RelationOp, RelationPathFilter, ScalarCondition, ScalarOp,
    StringMatchMode, Where,
};
pub use ir::{
    Action, AggregateArgs, AggregateOp, Args, Arguments, ComputedCondition, ComputedField, ComputedOperand,
    ComputedWhere, CountSpec, FilteredAggregate, IncludeEntry, MutationKind, NullsOrder, OrderByEntry, Query,
    Selection, SortOrder,
};
pub use registry::{Field, Model, Relation, RelationKind, RegistryError, SchemaRegistry};
