//! Folds the flat, alias-keyed rows a JOINed query returns into nested
//! typed records.

use indexmap::IndexMap;
use prisma_value::PrismaValue;
use query_builder::{IncludedRelation, Record, RecordValue};
use query_structure::{RelationKind, SchemaRegistry};

pub type FlatRow = IndexMap<String, PrismaValue>;

/// Entry point: `base_model` must be registered; `included` is the same
/// relation tree `compile_relations` returned alongside the SELECT that
/// produced `rows`.
pub fn deserialize_rows(
    registry: &SchemaRegistry,
    base_model: &str,
    included: &[IncludedRelation],
    rows: &[FlatRow],
) -> Result<Vec<Record>, query_structure::RegistryError> {
    let refs: Vec<&FlatRow> = rows.iter().collect();
    fold(registry, base_model, included, &refs, "")
}

fn fold(
    registry: &SchemaRegistry,
    model: &str,
    included: &[IncludedRelation],
    rows: &[&FlatRow],
    prefix: &str,
) -> Result<Vec<Record>, query_structure::RegistryError> {
    let pk_fields: Vec<String> = registry.get_primary_keys(model)?.iter().map(|f| f.name.clone()).collect();
    let pk_keys: Vec<String> = pk_fields.iter().map(|f| format!("{prefix}{f}")).collect();

    // Group preserving first-seen order; PrismaValue doesn't implement
    // Hash (it carries floats/decimals), so grouping is a linear scan —
    // fine at the row volumes a single query page returns.
    let mut groups: Vec<(Vec<PrismaValue>, Vec<&FlatRow>)> = Vec::new();
    for row in rows {
        let key: Vec<PrismaValue> = pk_keys.iter().map(|k| row.get(k).cloned().unwrap_or(PrismaValue::Null)).collect();
        match groups.iter_mut().find(|(k, _)| k == &key) {
            Some(group) => group.1.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    // An all-null PK tuple means the outer LEFT JOIN found no matching
    // row for this relation; such groups carry no record at all.
    groups.retain(|(key, _)| key.iter().any(|v| !v.is_null()));

    let mut records = Vec::with_capacity(groups.len());
    for (_, group_rows) in groups {
        records.push(build_record(registry, model, included, &group_rows, prefix)?);
    }
    Ok(records)
}

fn build_record(
    registry: &SchemaRegistry,
    model: &str,
    included: &[IncludedRelation],
    group_rows: &[&FlatRow],
    prefix: &str,
) -> Result<Record, query_structure::RegistryError> {
    let mut record = Record::new();
    let first = group_rows[0];

    for (key, value) in first.iter() {
        if let Some(rest) = key.strip_prefix(prefix) {
            if !rest.is_empty() && !rest.contains("__") {
                record.insert(rest.to_string(), RecordValue::Scalar(value.clone()));
            }
        }
    }

    for relation in included {
        let child_prefix = format!("{prefix}{}__", relation.name);
        match relation.kind {
            RelationKind::OneToOne | RelationKind::ManyToOne => {
                let nested = fold(registry, &relation.target_model, &relation.nested, &group_rows[..1], &child_prefix)?;
                record.insert(relation.name.clone(), RecordValue::ToOne(nested.into_iter().next()));
            }
            RelationKind::OneToMany | RelationKind::ManyToMany => {
                let nested = fold(registry, &relation.target_model, &relation.nested, group_rows, &child_prefix)?;
                record.insert(relation.name.clone(), RecordValue::ToMany(nested));
            }
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prisma_value::TypeIdentifier;
    use query_structure::{Field, Model, RelationKind};

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new(false);
        reg.register_model(
            Model::new("Product").field(Field::scalar("id", TypeIdentifier::String).primary()),
        )
        .unwrap();
        reg.register_model(
            Model::new("Category")
                .field(Field::scalar("id", TypeIdentifier::String).primary())
                .field(Field::scalar("label", TypeIdentifier::String)),
        )
        .unwrap();
        reg.register_model(
            Model::new("Review")
                .field(Field::scalar("id", TypeIdentifier::String).primary())
                .field(Field::scalar("rating", TypeIdentifier::Int32)),
        )
        .unwrap();
        reg
    }

    fn row(pairs: &[(&str, PrismaValue)]) -> FlatRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn to_many_dedups_by_relation_pk_preserving_order() {
        let reg = registry();
        let included = vec![IncludedRelation {
            name: "categories".into(),
            kind: RelationKind::ManyToMany,
            table_alias: "t1".into(),
            parent_alias: "t0".into(),
            target_model: "Category".into(),
            nested: vec![],
        }];

        let rows = vec![
            row(&[
                ("id", PrismaValue::String("p1".into())),
                ("categories__id", PrismaValue::String("c1".into())),
                ("categories__label", PrismaValue::String("Tools".into())),
            ]),
            row(&[
                ("id", PrismaValue::String("p1".into())),
                ("categories__id", PrismaValue::String("c1".into())),
                ("categories__label", PrismaValue::String("Tools".into())),
            ]),
            row(&[
                ("id", PrismaValue::String("p1".into())),
                ("categories__id", PrismaValue::String("c2".into())),
                ("categories__label", PrismaValue::String("Outdoor".into())),
            ]),
        ];

        let records = deserialize_rows(&reg, "Product", &included, &rows).unwrap();
        assert_eq!(records.len(), 1);
        let categories = match &records[0]["categories"] {
            RecordValue::ToMany(list) => list,
            other => panic!("expected ToMany, got {other:?}"),
        };
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0]["id"], RecordValue::Scalar(PrismaValue::String("c1".into())));
        assert_eq!(categories[1]["id"], RecordValue::Scalar(PrismaValue::String("c2".into())));
    }

    #[test]
    fn to_one_with_no_match_is_none() {
        let reg = registry();
        let included = vec![IncludedRelation {
            name: "featuredReview".into(),
            kind: RelationKind::OneToOne,
            table_alias: "t1".into(),
            parent_alias: "t0".into(),
            target_model: "Review".into(),
            nested: vec![],
        }];
        let rows = vec![row(&[
            ("id", PrismaValue::String("p1".into())),
            ("featuredReview__id", PrismaValue::Null),
            ("featuredReview__rating", PrismaValue::Null),
        ])];

        let records = deserialize_rows(&reg, "Product", &included, &rows).unwrap();
        assert_eq!(records[0]["featuredReview"], RecordValue::ToOne(None));
    }

    #[test]
    fn distinct_base_records_match_distinct_pk_count() {
        let reg = registry();
        let rows = vec![
            row(&[("id", PrismaValue::String("p1".into()))]),
            row(&[("id", PrismaValue::String("p2".into()))]),
        ];
        let records = deserialize_rows(&reg, "Product", &[], &rows).unwrap();
        assert_eq!(records.len(), 2);
    }
}
