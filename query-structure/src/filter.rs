//! The `where` clause data model. The source protocol represents filters
//! as a dynamically-typed JSON mapping where a value may be a primitive, a
//! list, or a nested mapping of operators; we normalize that into a typed
//! variant once, at the IR boundary, instead of re-sniffing `serde_json::Value`
//! shapes throughout the compiler.

use indexmap::IndexMap;
use prisma_value::PrismaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    Equals,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    EqualsOrNull,
    InOrNull,
    NotInOrNull,
}

impl ScalarOp {
    pub fn parse(key: &str) -> Option<Self> {
        use ScalarOp::*;
        Some(match key {
            "equals" => Equals,
            "not" => Not,
            "in" => In,
            "notIn" => NotIn,
            "lt" => Lt,
            "lte" => Lte,
            "gt" => Gt,
            "gte" => Gte,
            "contains" => Contains,
            "startsWith" => StartsWith,
            "endsWith" => EndsWith,
            "isNull" => IsNull,
            "isNotNull" => IsNotNull,
            "equalsOrNull" => EqualsOrNull,
            "inOrNull" => InOrNull,
            "notInOrNull" => NotInOrNull,
            _ => return None,
        })
    }

    pub const ALL_NAMES: &'static [&'static str] = &[
        "equals",
        "not",
        "in",
        "notIn",
        "lt",
        "lte",
        "gt",
        "gte",
        "contains",
        "startsWith",
        "endsWith",
        "isNull",
        "isNotNull",
        "equalsOrNull",
        "inOrNull",
        "notInOrNull",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatchMode {
    Default,
    Insensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    Some,
    Every,
    None,
}

impl RelationOp {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "some" => Some(RelationOp::Some),
            "every" => Some(RelationOp::Every),
            "none" => Some(RelationOp::None),
            _ => None,
        }
    }
}

/// A single scalar condition: `field <op> value`, with an optional
/// string-match mode for `contains`/`startsWith`/`endsWith`.
#[derive(Debug, Clone)]
pub struct ScalarCondition {
    pub field: String,
    pub op: ScalarOp,
    pub value: FilterValue,
    pub mode: StringMatchMode,
}

/// Normalized filter value: either a bare scalar/list (sugar for
/// `equals`/`in`), an explicit operator map, or one of the structural
/// forms (relation filter, logical composition, deep relation path).
#[derive(Debug, Clone)]
pub enum FilterValue {
    Scalar(PrismaValue),
    List(Vec<PrismaValue>),
    Ops(IndexMap<String, FilterValue>),
}

/// A fully parsed `where` clause, ready for the compiler to walk.
#[derive(Debug, Clone, Default)]
pub struct Where {
    pub scalars: Vec<ScalarCondition>,
    pub relations: Vec<RelationFilter>,
    pub and: Vec<Where>,
    pub or: Vec<Where>,
    pub not: Vec<Where>,
    pub relation_path: Option<RelationPathFilter>,
}

impl Where {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
            && self.relations.is_empty()
            && self.and.is_empty()
            && self.or.is_empty()
            && self.not.is_empty()
            && self.relation_path.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RelationFilter {
    pub field: String,
    pub op: RelationOp,
    pub inner: Box<Where>,
}

/// `_relationPath` + `_relationWhere`: a dotted path through one or more
/// relations, chained the same way `include` would, ending in an
/// arbitrary inner `where`.
#[derive(Debug, Clone)]
pub struct RelationPathFilter {
    pub path: Vec<String>,
    pub inner: Box<Where>,
}

#[derive(Debug, thiserror::Error)]
pub enum FilterParseError {
    #[error("unknown filter operator `{0}`; expected one of {}", ScalarOp::ALL_NAMES.join(", "))]
    UnknownOperator(String),
    #[error("`{0}` must be a JSON object, array, or scalar")]
    InvalidShape(String),
    #[error("`_relationWhere` is required alongside `_relationPath`")]
    MissingRelationWhere,
}

impl Where {
    /// Parses a `where` argument as it arrives over the wire: a JSON
    /// object whose keys are either logical composition keys (`AND`,
    /// `OR`, `NOT`), the `_relationPath`/`_relationWhere` pair, or field
    /// names. Whether a field name denotes a scalar or a relation is not
    /// resolved here — it is structural (relation filters carry
    /// `some`/`every`/`none`) and is cross-checked against the schema
    /// registry later, by the compiler.
    pub fn from_json(value: &serde_json::Value) -> Result<Where, FilterParseError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FilterParseError::InvalidShape("where".to_string()))?;

        let mut out = Where::default();
        let mut relation_path: Option<Vec<String>> = None;
        let mut relation_where: Option<&serde_json::Value> = None;

        for (key, val) in obj {
            match key.as_str() {
                "AND" => out.and = parse_where_list(val)?,
                "OR" => out.or = parse_where_list(val)?,
                // `NOT` is a single nested `where`, not a list (spec §3) —
                // but accept an array too, negating each element
                // independently, since some callers send a list here.
                "NOT" => out.not = if val.is_array() { parse_where_list(val)? } else { vec![Where::from_json(val)?] },
                "_relationPath" => {
                    relation_path = val.as_str().map(|s| s.split('.').map(str::to_owned).collect());
                }
                "_relationWhere" => relation_where = Some(val),
                field => {
                    if let Some(op) = relation_op_of(val) {
                        out.relations.push(RelationFilter {
                            field: field.to_string(),
                            op,
                            inner: Box::new(Where::from_json(
                                val.as_object()
                                    .and_then(|m| m.get(relation_op_key(op)))
                                    .unwrap_or(&serde_json::Value::Object(Default::default())),
                            )?),
                        });
                    } else {
                        out.scalars.extend(parse_scalar_field(field, val)?);
                    }
                }
            }
        }

        if let Some(path) = relation_path {
            let inner = relation_where.ok_or(FilterParseError::MissingRelationWhere)?;
            out.relation_path = Some(RelationPathFilter {
                path,
                inner: Box::new(Where::from_json(inner)?),
            });
        }

        Ok(out)
    }
}

fn parse_where_list(value: &serde_json::Value) -> Result<Vec<Where>, FilterParseError> {
    value
        .as_array()
        .ok_or_else(|| FilterParseError::InvalidShape("AND/OR/NOT".to_string()))?
        .iter()
        .map(Where::from_json)
        .collect()
}

fn relation_op_key(op: RelationOp) -> &'static str {
    match op {
        RelationOp::Some => "some",
        RelationOp::Every => "every",
        RelationOp::None => "none",
    }
}

fn relation_op_of(value: &serde_json::Value) -> Option<RelationOp> {
    let obj = value.as_object()?;
    for key in ["some", "every", "none"] {
        if obj.contains_key(key) {
            return RelationOp::parse(key);
        }
    }
    None
}

fn parse_scalar_field(field: &str, value: &serde_json::Value) -> Result<Vec<ScalarCondition>, FilterParseError> {
    match value {
        serde_json::Value::Object(map) if map.keys().any(|k| ScalarOp::parse(k).is_some()) => {
            let mut out = Vec::new();
            for (k, v) in map {
                let op = ScalarOp::parse(k).ok_or_else(|| FilterParseError::UnknownOperator(k.clone()))?;
                let (value, mode) = parse_operator_value(v);
                out.push(ScalarCondition {
                    field: field.to_string(),
                    op,
                    value,
                    mode,
                });
            }
            Ok(out)
        }
        serde_json::Value::Array(items) => Ok(vec![ScalarCondition {
            field: field.to_string(),
            op: ScalarOp::In,
            value: FilterValue::List(items.iter().cloned().map(PrismaValue::from).collect()),
            mode: StringMatchMode::Default,
        }]),
        other => Ok(vec![ScalarCondition {
            field: field.to_string(),
            op: ScalarOp::Equals,
            value: FilterValue::Scalar(PrismaValue::from(other.clone())),
            mode: StringMatchMode::Default,
        }]),
    }
}

/// Unwraps the `{value, mode: 'insensitive'}` form accepted by
/// `contains`/`startsWith`/`endsWith`; everything else is a bare value.
fn parse_operator_value(value: &serde_json::Value) -> (FilterValue, StringMatchMode) {
    if let Some(map) = value.as_object() {
        if let Some(inner) = map.get("value") {
            let mode = match map.get("mode").and_then(|m| m.as_str()) {
                Some("insensitive") => StringMatchMode::Insensitive,
                _ => StringMatchMode::Default,
            };
            return (FilterValue::Scalar(PrismaValue::from(inner.clone())), mode);
        }
    }
    if let Some(items) = value.as_array() {
        return (
            FilterValue::List(items.iter().cloned().map(PrismaValue::from).collect()),
            StringMatchMode::Default,
        );
    }
    (FilterValue::Scalar(PrismaValue::from(value.clone())), StringMatchMode::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_scalar_is_equals() {
        let w = Where::from_json(&json!({"isActive": true})).unwrap();
        assert_eq!(w.scalars.len(), 1);
        assert_eq!(w.scalars[0].op, ScalarOp::Equals);
    }

    #[test]
    fn list_is_in() {
        let w = Where::from_json(&json!({"id": ["a", "b"]})).unwrap();
        assert_eq!(w.scalars[0].op, ScalarOp::In);
    }

    #[test]
    fn operator_map_with_insensitive_mode() {
        let w = Where::from_json(&json!({"email": {"contains": {"value": "@ex.com", "mode": "insensitive"}}})).unwrap();
        assert_eq!(w.scalars[0].op, ScalarOp::Contains);
        assert_eq!(w.scalars[0].mode, StringMatchMode::Insensitive);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = Where::from_json(&json!({"email": {"bogus": 1}})).unwrap_err();
        assert!(matches!(err, FilterParseError::UnknownOperator(_)));
    }

    #[test]
    fn relation_some_nests_inner_where() {
        let w = Where::from_json(&json!({"reviews": {"some": {"rating": {"gte": 4}}}})).unwrap();
        assert_eq!(w.relations.len(), 1);
        assert_eq!(w.relations[0].op, RelationOp::Some);
        assert_eq!(w.relations[0].inner.scalars[0].op, ScalarOp::Gte);
    }

    #[test]
    fn and_or_not_compose() {
        let w = Where::from_json(&json!({
            "AND": [{"a": 1}, {"b": 2}],
            "NOT": {"c": 3}
        }))
        .unwrap();
        assert_eq!(w.and.len(), 2);
        assert_eq!(w.not.len(), 1);
    }

    #[test]
    fn relation_path_requires_relation_where() {
        let err = Where::from_json(&json!({"_relationPath": "a.b"})).unwrap_err();
        assert!(matches!(err, FilterParseError::MissingRelationWhere));
    }
}
