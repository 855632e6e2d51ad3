//! `count` / `aggregate` / `groupBy` compilation.

use crate::context::SqlCompiler;
use crate::error::CompileError;
use prisma_value::PrismaValue;
use query_builder::SqlQuery;
use query_structure::{AggregateArgs, Args, CountSpec, OrderByEntry, SortOrder};

impl<'a> SqlCompiler<'a> {
    pub fn compile_count(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let mut sql_args = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.quote(&table));
        if let Some(where_) = &args.arguments.where_ {
            if let Some(clause) = self.compile_where(where_, model, None, &mut sql_args)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        Ok(finish(sql, sql_args))
    }

    pub fn compile_aggregate(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let mut sql_args = Vec::new();

        let where_clause = match &args.arguments.where_ {
            Some(where_) => self.compile_where(where_, model, None, &mut sql_args)?,
            None => None,
        };

        let empty = AggregateArgs::default();
        let agg = args.arguments.aggregate.as_ref().unwrap_or(&empty);
        let select_list = self.aggregate_select_list(model, agg, &mut sql_args)?;

        let mut sql = format!("SELECT {select_list} FROM {}", self.quote(&table));
        if let Some(clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok(finish(sql, sql_args))
    }

    pub fn compile_group_by(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let mut sql_args = Vec::new();

        let where_clause = match &args.arguments.where_ {
            Some(where_) => self.compile_where(where_, model, None, &mut sql_args)?,
            None => None,
        };

        let empty = AggregateArgs::default();
        let agg = args.arguments.aggregate.as_ref().unwrap_or(&empty);
        let group_cols = args.arguments.by.iter().map(|f| self.quote(f)).collect::<Vec<_>>().join(", ");
        let agg_list = self.aggregate_select_list(model, agg, &mut sql_args)?;
        let select_list = if agg_list.is_empty() { group_cols.clone() } else { format!("{group_cols}, {agg_list}") };

        let mut sql = format!("SELECT {select_list} FROM {}", self.quote(&table));
        if let Some(clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        sql.push_str(&format!(" GROUP BY {group_cols}"));

        if !args.arguments.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.render_group_by_order(&args.arguments.order_by));
        }

        Ok(finish(sql, sql_args))
    }

    fn render_group_by_order(&self, entries: &[OrderByEntry]) -> String {
        entries
            .iter()
            .map(|e| {
                let dir = match e.order {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                format!("{} {dir}", self.quote(&e.field))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Builds the `_count`/`_avg`/`_sum`/`_min`/`_max` (+ `*Filtered`
    /// variants) SELECT fragments. Filtered-aggregate parameters are
    /// bound after whatever the caller already put in `args` (the outer
    /// WHERE's), so they occupy the trailing placeholder slots even
    /// though their SQL text appears earlier in the final string.
    fn aggregate_select_list(
        &self,
        model: &str,
        agg: &AggregateArgs,
        args: &mut Vec<PrismaValue>,
    ) -> Result<String, CompileError> {
        let mut parts = Vec::new();

        match &agg.count {
            Some(CountSpec::All) => parts.push(format!("COUNT(*) AS {}", self.quote("_count"))),
            Some(CountSpec::Fields(fields)) => {
                for f in fields {
                    parts.push(format!("COUNT({}) AS {}", self.quote(f), self.quote(&format!("_count_{f}"))));
                }
            }
            None => {}
        }

        for (op_name, fields) in [("avg", &agg.avg), ("sum", &agg.sum), ("min", &agg.min), ("max", &agg.max)] {
            for field in fields {
                let fn_name = op_name.to_uppercase();
                parts.push(format!(
                    "{fn_name}({}) AS {}",
                    self.quote(field),
                    self.quote(&format!("_{op_name}_{field}"))
                ));
            }
        }

        if self.dialect.supports_filter_clause() {
            for f in &agg.count_filtered {
                let filter_sql = self.compile_where(&f.filter, model, None, args)?.unwrap_or_else(|| "TRUE".to_string());
                parts.push(format!("COUNT(*) FILTER (WHERE {filter_sql}) AS {}", self.quote(&f.alias)));
            }
            for f in &agg.avg_filtered {
                let column = f.column.as_deref().unwrap_or_default();
                let filter_sql = self.compile_where(&f.filter, model, None, args)?.unwrap_or_else(|| "TRUE".to_string());
                parts.push(format!(
                    "AVG({}) FILTER (WHERE {filter_sql}) AS {}",
                    self.quote(column),
                    self.quote(&f.alias)
                ));
            }
        }

        Ok(parts.join(", "))
    }
}

fn finish(sql: String, args: Vec<PrismaValue>) -> SqlQuery {
    SqlQuery {
        arg_types: args.iter().map(|v| v.type_identifier()).collect(),
        sql,
        args,
        relation_metadata: None,
        computed_field_names: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dialect;
    use prisma_value::TypeIdentifier;
    use query_structure::{Arguments, Field, FilteredAggregate, Model, Selection, SchemaRegistry, Where};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new(false);
        reg.register_model(
            Model::new("Review")
                .field(Field::scalar("id", TypeIdentifier::String).primary())
                .field(Field::scalar("productId", TypeIdentifier::String))
                .field(Field::scalar("rating", TypeIdentifier::Int32)),
        )
        .unwrap();
        reg
    }

    #[test]
    fn count_filtered_matches_literal_scenario() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let args = Args {
            arguments: Arguments {
                where_: Some(Where::from_json(&json!({"productId": "p1"})).unwrap()),
                aggregate: Some(AggregateArgs {
                    count: Some(CountSpec::All),
                    count_filtered: vec![FilteredAggregate {
                        alias: "fiveStar".into(),
                        column: None,
                        filter: Where::from_json(&json!({"rating": 5})).unwrap(),
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            selection: Selection::default(),
        };
        let compiled = compiler.compile_aggregate("Review", &args).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT COUNT(*) AS \"_count\", COUNT(*) FILTER (WHERE \"rating\" = $2) AS \"fiveStar\" FROM \"Review\" WHERE \"productId\" = $1"
        );
        assert_eq!(compiled.args, vec![PrismaValue::String("p1".into()), PrismaValue::Int(5)]);
    }

    #[test]
    fn count_filtered_is_silently_dropped_outside_postgres() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Mysql);
        let args = Args {
            arguments: Arguments {
                aggregate: Some(AggregateArgs {
                    count: Some(CountSpec::All),
                    count_filtered: vec![FilteredAggregate {
                        alias: "fiveStar".into(),
                        column: None,
                        filter: Where::from_json(&json!({"rating": 5})).unwrap(),
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            selection: Selection::default(),
        };
        let compiled = compiler.compile_aggregate("Review", &args).unwrap();
        assert_eq!(compiled.sql, "SELECT COUNT(*) AS `_count` FROM `Review`");
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn plain_count_has_no_select_list_branching() {
        let reg = registry();
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let args = Args { arguments: Arguments::default(), selection: Selection::default() };
        let compiled = compiler.compile_count("Review", &args).unwrap();
        assert_eq!(compiled.sql, "SELECT COUNT(*) FROM \"Review\"");
    }
}
