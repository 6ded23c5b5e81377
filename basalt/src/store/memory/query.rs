use super::matcher::resolve;
use super::reply::{CommandError, CommandOutcome};
use crate::collection::Document;
use crate::common::{Value, CODE_BAD_VALUE, DOC_ID};
use std::cmp::Ordering;

/// Parsed sort specification: fields with their direction.
#[derive(Debug, Clone, Default)]
pub(crate) struct SortOrder {
    fields: Vec<(String, bool)>,
}

impl SortOrder {
    pub(crate) fn parse(sort: &Document) -> CommandOutcome<SortOrder> {
        let mut fields = Vec::with_capacity(sort.size());
        for (field, direction) in sort.iter() {
            let ascending = match direction.as_i64() {
                Some(1) => true,
                Some(-1) => false,
                _ => {
                    return Err(CommandError::new(
                        CODE_BAD_VALUE,
                        "$sort key ordering must be 1 (for ascending) or -1 (for descending)",
                    ))
                }
            };
            fields.push((field.clone(), ascending));
        }
        Ok(SortOrder { fields })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, ascending) in &self.fields {
            let ordering = sort_key(a, field).cmp(&sort_key(b, field));
            let ordering = if *ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort, so ties keep insertion order.
    pub(crate) fn sort(&self, documents: &mut [Document]) {
        if !self.is_empty() {
            documents.sort_by(|a, b| self.compare(a, b));
        }
    }
}

fn sort_key(document: &Document, field: &str) -> Value {
    resolve(document, field)
        .first()
        .map(|v| (*v).clone())
        .unwrap_or(Value::Null)
}

/// Field selection applied to result documents.
#[derive(Debug, Clone)]
pub(crate) enum Projection {
    All,
    Include { fields: Vec<String>, with_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    pub(crate) fn parse(projection: Option<&Document>) -> CommandOutcome<Projection> {
        let projection = match projection {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(Projection::All),
        };

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut with_id = true;
        for (field, flag) in projection.iter() {
            let include = flag.is_truthy();
            if field == DOC_ID {
                with_id = include;
                if !include {
                    excluded.push(field.clone());
                }
            } else if include {
                included.push(field.clone());
            } else {
                excluded.push(field.clone());
            }
        }

        let excludes_other_than_id = excluded.iter().any(|f| f != DOC_ID);
        if !included.is_empty() && excludes_other_than_id {
            return Err(CommandError::new(
                CODE_BAD_VALUE,
                "Projection cannot have a mix of inclusion and exclusion",
            ));
        }

        if included.is_empty() && excluded.is_empty() {
            // only `_id: 1`
            Ok(Projection::Include {
                fields: vec![],
                with_id: true,
            })
        } else if included.is_empty() {
            Ok(Projection::Exclude(excluded))
        } else {
            Ok(Projection::Include {
                fields: included,
                with_id,
            })
        }
    }

    pub(crate) fn apply(&self, document: Document) -> Document {
        match self {
            Projection::All => document,
            Projection::Exclude(fields) => {
                let mut document = document;
                for field in fields {
                    document.remove(field);
                }
                document
            }
            Projection::Include { fields, with_id } => {
                let mut projected = Document::new();
                if *with_id {
                    if let Some(id) = document.id() {
                        projected.insert(DOC_ID, id.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = document.get(field) {
                        // keep the literal key when the path cannot nest
                        if projected.put(field.as_str(), value.clone()).is_err() {
                            projected.insert(field.clone(), value.clone());
                        }
                    }
                }
                projected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_sort_ascending_and_descending() {
        let mut docs = vec![
            doc! { a: 2, b: 1 },
            doc! { a: 1, b: 2 },
            doc! { a: 2, b: 3 },
            doc! { b: 4 },
        ];
        SortOrder::parse(&doc! { a: (-1), b: 1 })
            .unwrap()
            .sort(&mut docs);
        assert_eq!(
            docs,
            vec![
                doc! { a: 2, b: 1 },
                doc! { a: 2, b: 3 },
                doc! { a: 1, b: 2 },
                doc! { b: 4 },
            ]
        );
    }

    #[test]
    fn test_sort_rejects_bad_direction() {
        assert!(SortOrder::parse(&doc! { a: 2 }).is_err());
        assert!(SortOrder::parse(&doc! { a: "up" }).is_err());
    }

    #[test]
    fn test_inclusion_projection() {
        let projection = Projection::parse(Some(&doc! { name: 1, "address.city": 1 })).unwrap();
        let projected = projection.apply(doc! {
            _id: 7,
            name: "Alice",
            age: 30,
            address: { city: "Oslo", zip: 150 }
        });
        assert_eq!(
            projected,
            doc! { _id: 7, name: "Alice", address: { city: "Oslo" } }
        );
    }

    #[test]
    fn test_inclusion_without_id() {
        let projection = Projection::parse(Some(&doc! { name: 1, _id: 0 })).unwrap();
        let projected = projection.apply(doc! { _id: 7, name: "Alice" });
        assert_eq!(projected, doc! { name: "Alice" });
    }

    #[test]
    fn test_exclusion_projection() {
        let projection = Projection::parse(Some(&doc! { age: 0 })).unwrap();
        let projected = projection.apply(doc! { _id: 7, name: "Alice", age: 30 });
        assert_eq!(projected, doc! { _id: 7, name: "Alice" });
    }

    #[test]
    fn test_mixed_projection_fails() {
        assert!(Projection::parse(Some(&doc! { name: 1, age: 0 })).is_err());
        assert!(Projection::parse(Some(&doc! {})).is_ok());
    }
}
