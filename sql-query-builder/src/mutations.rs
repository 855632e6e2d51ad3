//! `create`/`createMany`/`update`/`updateMany`/`delete`/`deleteMany`/
//! `upsert` compilation, plus nested-write
//! `connect`/`disconnect` splitting.

use crate::context::SqlCompiler;
use crate::error::CompileError;
use prisma_value::PrismaValue;
use query_builder::{CompiledMutation, Dialect, RelationMutation, SqlQuery};
use query_structure::{Action, Args, RelationKind, ScalarOp};

impl<'a> SqlCompiler<'a> {
    pub fn compile_create(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let data = args
            .arguments
            .data
            .as_ref()
            .ok_or_else(|| CompileError::MissingData { model: model.to_string(), action: "create".to_string() })?;
        let columns = data_columns(data);

        let mut sql_args = Vec::new();
        let cols = columns.iter().map(|(c, _)| self.quote(c)).collect::<Vec<_>>().join(", ");
        let placeholders = columns
            .iter()
            .map(|(_, v)| self.bind(&mut sql_args, v.clone()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("INSERT INTO {} ({cols}) VALUES ({placeholders})", self.quote(&table));
        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING *");
        }

        Ok(finish(sql, sql_args))
    }

    pub fn compile_create_many(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let data = args.arguments.data.as_ref().ok_or_else(|| CompileError::MissingData {
            model: model.to_string(),
            action: "createMany".to_string(),
        })?;
        let rows = data
            .as_array()
            .cloned()
            .ok_or_else(|| CompileError::EmptyCreateMany { model: model.to_string() })?;
        if rows.is_empty() {
            return Err(CompileError::EmptyCreateMany { model: model.to_string() });
        }

        let first_cols = data_columns(&rows[0]).into_iter().map(|(c, _)| c).collect::<Vec<_>>();
        let mut sql_args = Vec::new();
        let mut value_groups = Vec::with_capacity(rows.len());

        for row in &rows {
            let row_cols = data_columns(row);
            let row_names: Vec<&String> = row_cols.iter().map(|(c, _)| c).collect();
            if row_names.len() != first_cols.len() || row_names.iter().any(|c| !first_cols.contains(c)) {
                return Err(CompileError::InconsistentCreateManyKeys { model: model.to_string() });
            }
            let by_name: std::collections::HashMap<&str, &PrismaValue> =
                row_cols.iter().map(|(c, v)| (c.as_str(), v)).collect();
            let placeholders = first_cols
                .iter()
                .map(|c| self.bind(&mut sql_args, by_name[c.as_str()].clone()))
                .collect::<Vec<_>>()
                .join(", ");
            value_groups.push(format!("({placeholders})"));
        }

        let cols = first_cols.iter().map(|c| self.quote(c)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "INSERT INTO {} ({cols}) VALUES {}",
            self.quote(&table),
            value_groups.join(", ")
        );

        Ok(finish(sql, sql_args))
    }

    pub fn compile_update(&self, model: &str, action: Action, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let data = args
            .arguments
            .data
            .as_ref()
            .ok_or_else(|| CompileError::MissingData { model: model.to_string(), action: "update".to_string() })?;
        let columns = data_columns(data);

        let mut sql_args = Vec::new();
        let assignments = columns
            .iter()
            .map(|(c, v)| {
                let ph = self.bind(&mut sql_args, v.clone());
                format!("{} = {ph}", self.quote(c))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("UPDATE {} SET {assignments}", self.quote(&table));
        if let Some(where_) = &args.arguments.where_ {
            if let Some(clause) = self.compile_where(where_, model, None, &mut sql_args)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }

        // `updateMany` shares this exact form; only `update` additionally
        // implies single-row semantics, enforced by the executor, not the
        // SQL shape itself. RETURNING here is PostgreSQL-only — unlike
        // create/upsert, MySQL and SQLite are expected to re-fetch.
        let _ = action;
        if matches!(self.dialect, Dialect::Postgres) {
            sql.push_str(" RETURNING *");
        }

        Ok(finish(sql, sql_args))
    }

    pub fn compile_delete(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;
        let mut sql_args = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.quote(&table));
        if let Some(where_) = &args.arguments.where_ {
            if let Some(clause) = self.compile_where(where_, model, None, &mut sql_args)? {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
        }
        Ok(finish(sql, sql_args))
    }

    pub fn compile_upsert(&self, model: &str, args: &Args) -> Result<SqlQuery, CompileError> {
        let table = self.resolve_table(model)?;

        let conflict_keys: Vec<String> = args
            .arguments
            .where_
            .as_ref()
            .map(|w| w.scalars.iter().filter(|c| c.op == ScalarOp::Equals).map(|c| c.field.clone()).collect())
            .unwrap_or_default();
        if conflict_keys.is_empty() {
            return Err(CompileError::EmptyConflictKeys { model: model.to_string() });
        }

        let create_data = args.arguments.create_data.as_ref().ok_or_else(|| CompileError::MissingData {
            model: model.to_string(),
            action: "upsert".to_string(),
        })?;
        let insert_cols = data_columns(create_data);

        let mut sql_args = Vec::new();
        let cols = insert_cols.iter().map(|(c, _)| self.quote(c)).collect::<Vec<_>>().join(", ");
        let placeholders = insert_cols
            .iter()
            .map(|(_, v)| self.bind(&mut sql_args, v.clone()))
            .collect::<Vec<_>>()
            .join(", ");

        let update_cols = args.arguments.update_data.as_ref().map(data_columns).unwrap_or_default();
        let assignments = update_cols
            .iter()
            .map(|(c, v)| {
                let ph = self.bind(&mut sql_args, v.clone());
                format!("{} = {ph}", self.quote(c))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let conflict_cols = conflict_keys.iter().map(|k| self.quote(k)).collect::<Vec<_>>().join(", ");

        let sql = match self.dialect {
            Dialect::Postgres | Dialect::Sqlite => format!(
                "INSERT INTO {} ({cols}) VALUES ({placeholders}) ON CONFLICT ({conflict_cols}) DO UPDATE SET {assignments}{}",
                self.quote(&table),
                if self.dialect.supports_returning() { " RETURNING *" } else { "" }
            ),
            Dialect::Mysql => format!(
                "INSERT INTO {} ({cols}) VALUES ({placeholders}) ON DUPLICATE KEY UPDATE {assignments}",
                self.quote(&table)
            ),
        };

        Ok(finish(sql, sql_args))
    }

    /// Splits `data` into a cleaned map for the primary INSERT/UPDATE and
    /// a list of junction-table side effects for any M:N `connect`/
    /// `disconnect` sub-mapping.
    pub fn compile_with_relations(&self, model: &str, action: Action, args: &Args) -> Result<CompiledMutation, CompileError> {
        let data = args.arguments.data.as_ref().ok_or_else(|| CompileError::MissingData {
            model: model.to_string(),
            action: format!("{action}"),
        })?;
        let obj = data.as_object().cloned().unwrap_or_default();

        let mut clean = serde_json::Map::new();
        let mut relation_mutations = Vec::new();

        for (field, value) in obj.iter() {
            match relation_ops(value) {
                Some((connects, disconnects)) if self.registry.get_relation(model, field).is_ok() => {
                    let relation = self.registry.get_relation(model, field)?;
                    if relation.kind != RelationKind::ManyToMany {
                        return Err(CompileError::ConnectOnNonManyToMany {
                            model: model.to_string(),
                            field: field.clone(),
                        });
                    }
                    let own_value = self.resolve_own_reference(model, relation, &obj, args)?;
                    for target in &connects {
                        relation_mutations.push(self.compile_connect(relation, &own_value, target, model, field)?);
                    }
                    for target in &disconnects {
                        relation_mutations.push(self.compile_disconnect(relation, &own_value, target, model, field)?);
                    }
                }
                _ => {
                    clean.insert(field.clone(), value.clone());
                }
            }
        }

        let mut cleaned_args = args.clone();
        cleaned_args.arguments.data = Some(serde_json::Value::Object(clean));

        let main_query = match action {
            Action::Create => self.compile_create(model, &cleaned_args)?,
            Action::Update => self.compile_update(model, Action::Update, &cleaned_args)?,
            other => {
                return Err(CompileError::UnsupportedAction {
                    action: format!("{other}"),
                    dialect: self.dialect,
                })
            }
        };

        Ok(CompiledMutation { main_query, relation_mutations })
    }

    fn resolve_own_reference(
        &self,
        model: &str,
        relation: &query_structure::Relation,
        data: &serde_json::Map<String, serde_json::Value>,
        args: &Args,
    ) -> Result<PrismaValue, CompileError> {
        let key = &relation.references[0];
        if let Some(v) = data.get(key) {
            return Ok(PrismaValue::from(v.clone()));
        }
        if let Some(where_) = &args.arguments.where_ {
            if let Some(cond) = where_.scalars.iter().find(|c| &c.field == key && c.op == ScalarOp::Equals) {
                if let query_structure::FilterValue::Scalar(v) = &cond.value {
                    return Ok(v.clone());
                }
            }
        }
        Err(CompileError::MissingData { model: model.to_string(), action: "connect/disconnect".to_string() })
    }

    fn compile_connect(
        &self,
        relation: &query_structure::Relation,
        own_value: &PrismaValue,
        target: &serde_json::Value,
        model: &str,
        field: &str,
    ) -> Result<RelationMutation, CompileError> {
        let target_value = self.resolve_target_reference(relation, target, model, field)?;
        let join_table = relation.join_table.as_ref().unwrap();
        let join_column = relation.join_column.as_ref().unwrap();
        let inverse_join_column = relation.inverse_join_column.as_ref().unwrap();

        let mut sql_args = Vec::new();
        let a = self.bind(&mut sql_args, own_value.clone());
        let b = self.bind(&mut sql_args, target_value);

        let sql = match self.dialect {
            Dialect::Postgres => format!(
                "INSERT INTO {} ({}, {}) VALUES ({a}, {b}) ON CONFLICT DO NOTHING",
                self.quote(join_table),
                self.quote(join_column),
                self.quote(inverse_join_column)
            ),
            Dialect::Mysql => format!(
                "INSERT IGNORE INTO {} ({}, {}) VALUES ({a}, {b})",
                self.quote(join_table),
                self.quote(join_column),
                self.quote(inverse_join_column)
            ),
            Dialect::Sqlite => format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES ({a}, {b})",
                self.quote(join_table),
                self.quote(join_column),
                self.quote(inverse_join_column)
            ),
        };

        Ok(RelationMutation { relation_name: relation.name.clone(), query: finish(sql, sql_args) })
    }

    fn compile_disconnect(
        &self,
        relation: &query_structure::Relation,
        own_value: &PrismaValue,
        target: &serde_json::Value,
        model: &str,
        field: &str,
    ) -> Result<RelationMutation, CompileError> {
        let target_value = self.resolve_target_reference(relation, target, model, field)?;
        let join_table = relation.join_table.as_ref().unwrap();
        let join_column = relation.join_column.as_ref().unwrap();
        let inverse_join_column = relation.inverse_join_column.as_ref().unwrap();

        let mut sql_args = Vec::new();
        let a = self.bind(&mut sql_args, own_value.clone());
        let b = self.bind(&mut sql_args, target_value);
        let sql = format!(
            "DELETE FROM {} WHERE {} = {a} AND {} = {b}",
            self.quote(join_table),
            self.quote(join_column),
            self.quote(inverse_join_column)
        );

        Ok(RelationMutation { relation_name: relation.name.clone(), query: finish(sql, sql_args) })
    }

    fn resolve_target_reference(
        &self,
        relation: &query_structure::Relation,
        target: &serde_json::Value,
        model: &str,
        field: &str,
    ) -> Result<PrismaValue, CompileError> {
        let key = &relation.references[0];
        target
            .as_object()
            .and_then(|m| m.get(key))
            .map(|v| PrismaValue::from(v.clone()))
            .ok_or_else(|| CompileError::UnknownConnectField {
                model: model.to_string(),
                field: field.to_string(),
                target_field: key.clone(),
            })
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

fn data_columns(value: &serde_json::Value) -> Vec<(String, PrismaValue)> {
    value
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), PrismaValue::from(v.clone()))).collect())
        .unwrap_or_default()
}

/// Recognizes `{connect: ..., disconnect: ...}` sub-mappings, normalizing
/// the single-object-or-array forms into lists.
fn relation_ops(value: &serde_json::Value) -> Option<(Vec<serde_json::Value>, Vec<serde_json::Value>)> {
    let obj = value.as_object()?;
    if !obj.contains_key("connect") && !obj.contains_key("disconnect") {
        return None;
    }
    let as_list = |v: Option<&serde_json::Value>| match v {
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    Some((as_list(obj.get("connect")), as_list(obj.get("disconnect"))))
}
