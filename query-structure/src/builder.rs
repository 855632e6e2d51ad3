//! The IR builder: a fluent, mutable convenience for assembling a
//! [`Query`]. The IR itself is the contract — this builder exists purely
//! so embedders don't have to hand-construct `Arguments`/`Selection`
//! trees, and fails at `build()` time rather than letting a half-built
//! query leak into the compiler.

use crate::filter::Where;
use crate::ir::{Action, AggregateArgs, Args, Arguments, ComputedField, IncludeEntry, OrderByEntry, Query, Selection};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("query builder: `model` was never set")]
    MissingModel,
    #[error("query builder: `action` was never set")]
    MissingAction,
}

#[derive(Debug, Default)]
pub struct QueryBuilder {
    model: Option<String>,
    action: Option<Action>,
    arguments: Arguments,
    selection: Selection,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn where_(mut self, where_: Where) -> Self {
        self.arguments.where_ = Some(where_);
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.arguments.data = Some(data);
        self
    }

    /// The `create` branch of an `upsert`'s `data: {create, update}` pair.
    pub fn create_data(mut self, data: serde_json::Value) -> Self {
        self.arguments.create_data = Some(data);
        self
    }

    /// The `update` branch of an `upsert`'s `data: {create, update}` pair.
    pub fn update_data(mut self, data: serde_json::Value) -> Self {
        self.arguments.update_data = Some(data);
        self
    }

    pub fn order_by(mut self, entry: OrderByEntry) -> Self {
        self.arguments.order_by.push(entry);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.arguments.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.arguments.skip = Some(skip);
        self
    }

    pub fn aggregate(mut self, aggregate: AggregateArgs) -> Self {
        self.arguments.aggregate = Some(aggregate);
        self
    }

    pub fn computed_field(mut self, field: ComputedField) -> Self {
        self.arguments.computed.push(field);
        self
    }

    pub fn by(mut self, fields: Vec<String>) -> Self {
        self.arguments.by = fields;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.arguments.distinct = true;
        self
    }

    pub fn distinct_fields(mut self, fields: Vec<String>) -> Self {
        self.arguments.distinct_fields = fields;
        self
    }

    pub fn select_scalars(mut self, fields: Vec<String>) -> Self {
        self.selection.scalars = Some(fields);
        self
    }

    pub fn include(mut self, relation: impl Into<String>, nested: Selection) -> Self {
        self.selection.include.insert(relation.into(), IncludeEntry { nested });
        self
    }

    pub fn build(self) -> Result<Query, BuilderError> {
        Ok(Query {
            model: self.model.ok_or(BuilderError::MissingModel)?,
            action: self.action.ok_or(BuilderError::MissingAction)?,
            args: Args {
                arguments: self.arguments,
                selection: self.selection,
            },
        })
    }
}

/// Ergonomic builder for the `_aggregate` argument bag, backed by `bon`
/// so optional knobs (`avg`, `sum`, `min`, `max`, the `*Filtered`
/// variants) don't all need to be threaded through by hand.
#[bon::bon]
impl AggregateArgs {
    #[builder]
    pub fn assemble(
        count_all: Option<bool>,
        avg: Option<Vec<String>>,
        sum: Option<Vec<String>>,
        min: Option<Vec<String>>,
        max: Option<Vec<String>>,
    ) -> Self {
        use crate::ir::CountSpec;
        AggregateArgs {
            count: count_all.and_then(|b| b.then_some(CountSpec::All)),
            avg: avg.unwrap_or_default(),
            sum: sum.unwrap_or_default(),
            min: min.unwrap_or_default(),
            max: max.unwrap_or_default(),
            count_filtered: Vec::new(),
            avg_filtered: Vec::new(),
        }
    }
}
