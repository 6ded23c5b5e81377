use super::matcher::is_operator_document;
use super::reply::{CommandError, CommandOutcome};
use crate::collection::{Document, ObjectId};
use crate::common::{
    Value, CODE_BAD_VALUE, CODE_FAILED_TO_PARSE, CODE_IMMUTABLE_FIELD, CODE_TYPE_MISMATCH, DOC_ID,
    FIELD_SEPARATOR,
};
use crate::errors::BasaltError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    Set,
    Unset,
    Inc,
    Push,
    SetOnInsert,
}

impl Modifier {
    fn parse(name: &str) -> Option<Modifier> {
        match name {
            "$set" => Some(Modifier::Set),
            "$unset" => Some(Modifier::Unset),
            "$inc" => Some(Modifier::Inc),
            "$push" => Some(Modifier::Push),
            "$setOnInsert" => Some(Modifier::SetOnInsert),
            _ => None,
        }
    }
}

/// A parsed update: either modifier operations or a whole-document
/// replacement.
#[derive(Debug, Clone)]
pub(crate) enum Update {
    Modifiers(Vec<(Modifier, Document)>),
    Replacement(Document),
}

impl Update {
    pub(crate) fn parse(update: &Document) -> CommandOutcome<Update> {
        if !is_operator_document(update) {
            if let Some(key) = update.keys().find(|k| k.starts_with('$')) {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!("The dollar ($) prefixed field '{}' is not valid for storage", key),
                ));
            }
            return Ok(Update::Replacement(update.clone()));
        }

        let mut modifiers = Vec::with_capacity(update.size());
        for (name, argument) in update.iter() {
            let modifier = Modifier::parse(name).ok_or_else(|| {
                CommandError::new(
                    CODE_FAILED_TO_PARSE,
                    format!("Unknown modifier: {}. Expected a valid update modifier", name),
                )
            })?;
            let fields = argument.as_document().ok_or_else(|| {
                CommandError::new(
                    CODE_FAILED_TO_PARSE,
                    format!(
                        "Modifiers operate on fields but we found type {} instead",
                        argument.type_name()
                    ),
                )
            })?;
            modifiers.push((modifier, fields.clone()));
        }
        Ok(Update::Modifiers(modifiers))
    }

    /// Applies the update in place and reports whether the document
    /// changed. `$setOnInsert` only takes effect when `inserting`.
    pub(crate) fn apply(&self, document: &mut Document, inserting: bool) -> CommandOutcome<bool> {
        let before = document.clone();
        match self {
            Update::Replacement(replacement) => {
                *document = replace(document, replacement)?;
            }
            Update::Modifiers(modifiers) => {
                for (modifier, fields) in modifiers {
                    for (path, argument) in fields.iter() {
                        if !inserting {
                            check_immutable(document, *modifier, path, argument)?;
                        }
                        apply_modifier(document, *modifier, path, argument, inserting)?;
                    }
                }
            }
        }
        Ok(!before.is_identical(document))
    }

    /// Builds the document inserted by an upsert: equality fields from the
    /// query, then the update, then a generated `_id` if still missing.
    pub(crate) fn upsert_document(&self, query: &Document) -> CommandOutcome<Document> {
        let mut seed = Document::new();
        seed_from_query(query, &mut seed)?;

        let document = match self {
            Update::Modifiers(_) => {
                self.apply(&mut seed, true)?;
                seed
            }
            Update::Replacement(replacement) => {
                let mut document = replacement.clone();
                if !document.has_id() {
                    if let Some(id) = seed.id() {
                        document = with_leading_id(document, id.clone());
                    }
                }
                document
            }
        };

        if document.has_id() {
            Ok(document)
        } else {
            Ok(with_leading_id(document, Value::ObjectId(ObjectId::new())))
        }
    }
}

/// Returns `document` with `_id` as its first field.
pub(crate) fn with_leading_id(document: Document, id: Value) -> Document {
    let mut result = Document::with_capacity(document.size() + 1);
    result.insert(DOC_ID, id);
    for (key, value) in document {
        if key != DOC_ID {
            result.insert(key, value);
        }
    }
    result
}

fn replace(current: &Document, replacement: &Document) -> CommandOutcome<Document> {
    match (current.id(), replacement.id()) {
        (Some(existing), Some(replaced)) if existing != replaced => Err(CommandError::new(
            CODE_IMMUTABLE_FIELD,
            "After applying the update, the (immutable) field '_id' was found to have been altered",
        )),
        (Some(existing), _) => Ok(with_leading_id(replacement.clone(), existing.clone())),
        (None, _) => Ok(replacement.clone()),
    }
}

fn touches_id(path: &str) -> bool {
    path == DOC_ID || path.starts_with(&format!("{}{}", DOC_ID, FIELD_SEPARATOR))
}

fn check_immutable(
    document: &Document,
    modifier: Modifier,
    path: &str,
    argument: &Value,
) -> CommandOutcome<()> {
    if !touches_id(path) || modifier == Modifier::SetOnInsert {
        return Ok(());
    }
    if modifier == Modifier::Set && path == DOC_ID && document.id() == Some(argument) {
        return Ok(());
    }
    Err(CommandError::new(
        CODE_IMMUTABLE_FIELD,
        format!(
            "Performing an update on the path '{}' would modify the immutable field '_id'",
            path
        ),
    ))
}

fn apply_modifier(
    document: &mut Document,
    modifier: Modifier,
    path: &str,
    argument: &Value,
    inserting: bool,
) -> CommandOutcome<()> {
    match modifier {
        Modifier::Set => put(document, path, argument.clone()),
        Modifier::SetOnInsert if inserting => put(document, path, argument.clone()),
        Modifier::SetOnInsert => Ok(()),
        Modifier::Unset => {
            document.remove(path);
            Ok(())
        }
        Modifier::Inc => {
            if !argument.is_number() {
                return Err(CommandError::new(
                    CODE_TYPE_MISMATCH,
                    "Cannot increment with non-numeric argument",
                ));
            }
            let next = match document.get(path) {
                None => argument.clone(),
                Some(current) if current.is_number() => {
                    current.checked_add(argument).ok_or_else(|| {
                        CommandError::new(
                            CODE_BAD_VALUE,
                            format!("Failed to apply $inc to '{}': integer overflow", path),
                        )
                    })?
                }
                Some(current) => {
                    return Err(CommandError::new(
                        CODE_TYPE_MISMATCH,
                        format!(
                            "Cannot apply $inc to a value of non-numeric type {} at '{}'",
                            current.type_name(),
                            path
                        ),
                    ))
                }
            };
            put(document, path, next)
        }
        Modifier::Push => {
            let values = match argument.as_document().and_then(|d| d.get("$each")) {
                Some(Value::Array(each)) => each.clone(),
                Some(_) => {
                    return Err(CommandError::new(
                        CODE_BAD_VALUE,
                        "The argument to $each in $push must be an array",
                    ))
                }
                None => vec![argument.clone()],
            };
            match document.get_mut(path) {
                Some(Value::Array(items)) => {
                    items.extend(values);
                    Ok(())
                }
                Some(other) => Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!(
                        "The field '{}' must be an array but is of type {}",
                        path,
                        other.type_name()
                    ),
                )),
                None => put(document, path, Value::Array(values)),
            }
        }
    }
}

fn put(document: &mut Document, path: &str, value: Value) -> CommandOutcome<()> {
    document
        .put(path, value)
        .map_err(|e| path_error(path, e))
}

fn path_error(path: &str, error: BasaltError) -> CommandError {
    CommandError::new(
        CODE_BAD_VALUE,
        format!("Cannot apply update to '{}': {}", path, error.message()),
    )
}

fn seed_from_query(query: &Document, seed: &mut Document) -> CommandOutcome<()> {
    for (key, value) in query.iter() {
        if key == "$and" {
            for clause in value.as_array().into_iter().flatten() {
                if let Some(clause) = clause.as_document() {
                    seed_from_query(clause, seed)?;
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }

        match value.as_document() {
            Some(operators) if is_operator_document(operators) => {
                if let Some(eq) = operators.get("$eq") {
                    put(seed, key, eq.clone())?;
                }
            }
            _ => put(seed, key, value.clone())?,
        }
    }
    Ok(())
}
