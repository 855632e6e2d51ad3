//! The schema registry: an append-only, in-memory catalog of models,
//! fields and relations. Populated once at startup by whatever generator
//! reads the caller's schema source; immutable for the rest of the
//! process's life.

use indexmap::IndexMap;
use prisma_value::TypeIdentifier;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub column_name: String,
    pub type_tag: TypeIdentifier,
    pub is_primary: bool,
    pub is_unique: bool,
    pub is_nullable: bool,
    pub is_relation_marker: bool,
    pub default_expr: Option<String>,
}

impl Field {
    pub fn scalar(name: impl Into<String>, type_tag: TypeIdentifier) -> Self {
        let name = name.into();
        Field {
            column_name: name.clone(),
            name,
            type_tag,
            is_primary: false,
            is_unique: false,
            is_nullable: false,
            is_relation_marker: false,
            default_expr: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }
}

/// A relation field. Relations reference their target model *by name*,
/// never by embedding another `Model`, since the relation graph is
/// inherently cyclic (A -> B and B -> A) and the registry is the only
/// place names get resolved.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub target_model: String,
    pub foreign_key: Vec<String>,
    pub references: Vec<String>,
    pub join_table: Option<String>,
    pub join_column: Option<String>,
    pub inverse_join_column: Option<String>,
    pub inverse_relation: Option<String>,
    pub is_owner: bool,
}

impl Relation {
    pub fn validate(&self) -> Result<(), RegistryError> {
        match self.kind {
            RelationKind::ManyToMany => {
                if self.join_table.is_none() || self.join_column.is_none() || self.inverse_join_column.is_none() {
                    return Err(RegistryError::InvalidRelation {
                        relation: self.name.clone(),
                        reason: "many-to-many relations require join_table, join_column and inverse_join_column"
                            .into(),
                    });
                }
            }
            RelationKind::OneToOne | RelationKind::OneToMany | RelationKind::ManyToOne => {
                if self.foreign_key.is_empty() || self.references.is_empty() {
                    return Err(RegistryError::InvalidRelation {
                        relation: self.name.clone(),
                        reason: "non-M:N relations require a non-empty foreign_key and references".into(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub table_name: String,
    pub fields: IndexMap<String, Field>,
    pub relations: IndexMap<String, Relation>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Model {
            table_name: name.clone(),
            name,
            fields: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    pub fn primary_keys(&self) -> Vec<&Field> {
        self.fields.values().filter(|f| f.is_primary).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("model `{0}` is not registered")]
    UnknownModel(String),
    #[error("model `{0}` has no registered fields")]
    NoPrimaryKey(String),
    #[error("field `{field}` is not a relation on model `{model}`")]
    NotARelation { model: String, field: String },
    #[error("invalid relation `{relation}`: {reason}")]
    InvalidRelation { relation: String, reason: String },
    #[error(
        "model `{name}` is not registered. `{name}` looks like a logical (PascalCase) model name; \
         did you mean the table name `{suggestion}`? Strict mode rejects unregistered PascalCase \
         names instead of silently falling back to them."
    )]
    StrictModeUnknownModel { name: String, suggestion: String },
}

/// Append-only catalog of [`Model`]s. Built once at startup; shared
/// read-only (via `&SchemaRegistry`) across every compiler/executor
/// instance afterwards — never mutated concurrently.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: IndexMap<String, Model>,
    strict_mode: bool,
}

impl SchemaRegistry {
    pub fn new(strict_mode: bool) -> Self {
        SchemaRegistry {
            models: IndexMap::new(),
            strict_mode,
        }
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn register_model(&mut self, model: Model) -> Result<(), RegistryError> {
        for relation in model.relations.values() {
            relation.validate()?;
        }
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn get_model(&self, name: &str) -> Result<&Model, RegistryError> {
        self.models.get(name).ok_or_else(|| {
            if self.strict_mode && looks_pascal_case(name) {
                RegistryError::StrictModeUnknownModel {
                    name: name.to_string(),
                    suggestion: to_snake_case(name),
                }
            } else {
                RegistryError::UnknownModel(name.to_string())
            }
        })
    }

    pub fn get_relation<'a>(&'a self, model: &str, field: &str) -> Result<&'a Relation, RegistryError> {
        let model = self.get_model(model)?;
        model.relations.get(field).ok_or_else(|| RegistryError::NotARelation {
            model: model.name.clone(),
            field: field.to_string(),
        })
    }

    pub fn get_primary_keys(&self, model: &str) -> Result<Vec<&Field>, RegistryError> {
        let model = self.get_model(model)?;
        let pks = model.primary_keys();
        if pks.is_empty() {
            return Err(RegistryError::NoPrimaryKey(model.name.clone()));
        }
        Ok(pks)
    }

    /// Falls back to the logical model name when nothing is registered,
    /// per spec: only strict mode + a PascalCase-looking name turns this
    /// into a hard error (via `get_model`).
    pub fn get_table_name(&self, model: &str) -> String {
        match self.models.get(model) {
            Some(m) => m.table_name.clone(),
            None => model.to_string(),
        }
    }
}

fn looks_pascal_case(name: &str) -> bool {
    let starts_upper = name.chars().next().is_some_and(|c| c.is_uppercase());
    let has_lower = name.chars().any(|c| c.is_lowercase());
    starts_upper && has_lower
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
