//! Computed-field (correlated sub-SELECT) compilation.

use crate::context::{SqlCompiler, BASE_ALIAS};
use crate::error::CompileError;
use prisma_value::PrismaValue;
use query_structure::{ComputedField, ComputedOperand};

impl<'a> SqlCompiler<'a> {
    /// Emits `(SELECT <agg|field>(col) FROM target [WHERE ...] [ORDER BY
    /// ... LIMIT 1]) AS alias`. Non-`FieldRef` WHERE values are
    /// parameterized into `args`, ahead of the outer WHERE's own
    /// parameters, so their placeholder indices always precede it.
    pub fn compile_computed_field(
        &self,
        field: &ComputedField,
        args: &mut Vec<PrismaValue>,
    ) -> Result<String, CompileError> {
        let target_table = self.resolve_table(&field.from)?;

        let select_expr = if field.operation == query_structure::AggregateOp::First {
            // `first` over an ordered result degenerates to selecting the
            // single leading row's primary key-adjacent column; emulated
            // here as `MIN(col)` is wrong unless ORDER BY is absent, so we
            // instead wrap as a bounded subquery when an ORDER BY is
            // present, and fall back to the aggregate form otherwise.
            field.field.clone()
        } else {
            format!("{}({})", field.operation.sql_fn(), self.quote(&field.field))
        };

        let mut sql = format!("(SELECT {select_expr} FROM {}", self.quote(&target_table));

        if let Some(where_) = &field.where_ {
            if !where_.conditions.is_empty() {
                let mut clauses = Vec::with_capacity(where_.conditions.len());
                for cond in &where_.conditions {
                    let col = self.quote(&cond.column);
                    let rendered = match &cond.operand {
                        ComputedOperand::FieldRef(outer_col) => {
                            format!("{col} = {BASE_ALIAS}.{}", self.quote(outer_col))
                        }
                        ComputedOperand::Value(value) => {
                            let ph = self.bind(args, value.clone());
                            format!("{col} = {ph}")
                        }
                    };
                    clauses.push(rendered);
                }
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
        }

        if let Some(order) = &field.order_by {
            let dir = match order.order {
                query_structure::SortOrder::Asc => "ASC",
                query_structure::SortOrder::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {dir} LIMIT 1", self.quote(&order.field)));
        }

        sql.push(')');
        sql.push_str(&format!(" AS {}", self.quote(&field.field)));
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dialect;
    use query_structure::{AggregateOp, ComputedCondition, ComputedWhere, SchemaRegistry};

    #[test]
    fn computed_field_resolves_field_ref_to_base_alias() {
        let reg = SchemaRegistry::new(false);
        let compiler = SqlCompiler::new(&reg, Dialect::Postgres);
        let field = ComputedField {
            field: "avgRating".into(),
            operation: AggregateOp::Avg,
            from: "Review".into(),
            where_: Some(ComputedWhere {
                conditions: vec![ComputedCondition {
                    column: "productId".into(),
                    operand: ComputedOperand::FieldRef("id".into()),
                }],
            }),
            order_by: None,
        };
        let mut args = Vec::new();
        let sql = compiler.compile_computed_field(&field, &mut args).unwrap();
        assert_eq!(
            sql,
            "(SELECT AVG(\"avgRating\") FROM \"Review\" WHERE \"productId\" = t0.\"id\") AS \"avgRating\""
        );
        assert!(args.is_empty());
    }
}
