use super::reply::{CommandError, CommandOutcome};
use crate::collection::Document;
use crate::common::{Value, CODE_BAD_VALUE, FIELD_SEPARATOR};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// A parsed query filter.
///
/// Built once per command from the filter document and evaluated against
/// every stored document. An empty filter matches everything.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Field(String, Condition),
}

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
}

impl Filter {
    pub(crate) fn match_all() -> Filter {
        Filter::And(vec![])
    }

    pub(crate) fn parse(filter: &Document) -> CommandOutcome<Filter> {
        let mut clauses = Vec::with_capacity(filter.size());
        for (key, value) in filter.iter() {
            match key.as_str() {
                "$and" => clauses.push(Filter::And(parse_clauses(key, value)?)),
                "$or" => clauses.push(Filter::Or(parse_clauses(key, value)?)),
                op if op.starts_with('$') => {
                    return Err(CommandError::new(
                        CODE_BAD_VALUE,
                        format!("unknown top level operator: {}", op),
                    ));
                }
                field => parse_field(field, value, &mut clauses)?,
            }
        }

        if clauses.len() == 1 {
            if let Some(clause) = clauses.pop() {
                return Ok(clause);
            }
        }
        Ok(Filter::And(clauses))
    }

    pub(crate) fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Filter::Field(path, condition) => {
                let reached = resolve(document, path);
                condition.test(&reached)
            }
        }
    }
}

impl Condition {
    fn test(&self, reached: &[&Value]) -> bool {
        match self {
            Condition::Eq(target) => equals_any(reached, target),
            Condition::Ne(target) => !equals_any(reached, target),
            Condition::Gt(target) => compares(reached, target, |o| o == Ordering::Greater),
            Condition::Gte(target) => compares(reached, target, |o| o != Ordering::Less),
            Condition::Lt(target) => compares(reached, target, |o| o == Ordering::Less),
            Condition::Lte(target) => compares(reached, target, |o| o != Ordering::Greater),
            Condition::In(targets) => targets.iter().any(|t| equals_any(reached, t)),
            Condition::Nin(targets) => !targets.iter().any(|t| equals_any(reached, t)),
            Condition::Exists(expected) => !reached.is_empty() == *expected,
            Condition::Regex(regex) => candidates(reached)
                .iter()
                .any(|v| v.as_str().map(|s| regex.is_match(s)).unwrap_or(false)),
        }
    }
}

fn parse_clauses(operator: &str, value: &Value) -> CommandOutcome<Vec<Filter>> {
    let items = match value.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => {
            return Err(CommandError::new(
                CODE_BAD_VALUE,
                format!("{} must be a nonempty array", operator),
            ))
        }
    };

    let mut clauses = Vec::with_capacity(items.len());
    for item in items {
        match item.as_document() {
            Some(doc) => clauses.push(Filter::parse(doc)?),
            None => {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!("{} argument's entries must be objects", operator),
                ))
            }
        }
    }
    Ok(clauses)
}

fn parse_field(field: &str, value: &Value, clauses: &mut Vec<Filter>) -> CommandOutcome<()> {
    let operators = match value.as_document() {
        Some(doc) if is_operator_document(doc) => doc,
        _ => {
            clauses.push(Filter::Field(field.to_string(), Condition::Eq(value.clone())));
            return Ok(());
        }
    };

    let regex_options = operators
        .get("$options")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    for (operator, argument) in operators.iter() {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(argument.clone()),
            "$ne" => Condition::Ne(argument.clone()),
            "$gt" => Condition::Gt(argument.clone()),
            "$gte" => Condition::Gte(argument.clone()),
            "$lt" => Condition::Lt(argument.clone()),
            "$lte" => Condition::Lte(argument.clone()),
            "$in" => Condition::In(list_argument(operator, argument)?),
            "$nin" => Condition::Nin(list_argument(operator, argument)?),
            "$exists" => Condition::Exists(argument.is_truthy()),
            "$regex" => Condition::Regex(build_regex(argument, regex_options)?),
            "$options" => continue,
            other => {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!("unknown operator: {}", other),
                ))
            }
        };
        clauses.push(Filter::Field(field.to_string(), condition));
    }
    Ok(())
}

pub(crate) fn is_operator_document(doc: &Document) -> bool {
    doc.first_key().map(|k| k.starts_with('$')).unwrap_or(false)
}

fn list_argument(operator: &str, argument: &Value) -> CommandOutcome<Vec<Value>> {
    argument.as_array().cloned().ok_or_else(|| {
        CommandError::new(CODE_BAD_VALUE, format!("{} needs an array", operator))
    })
}

fn build_regex(argument: &Value, options: &str) -> CommandOutcome<Regex> {
    let pattern = argument
        .as_str()
        .ok_or_else(|| CommandError::new(CODE_BAD_VALUE, "$regex has to be a string"))?;

    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!("invalid flag in regex options: {}", other),
                ))
            }
        };
    }
    builder.build().map_err(|e| {
        CommandError::new(
            CODE_BAD_VALUE,
            format!("Regular expression is invalid: {}", e),
        )
    })
}

/// Collects every value `path` reaches in `document`.
///
/// Arrays on the way fan out: a numeric segment selects an element, and
/// every embedded document in the array is searched with the same segment.
pub(crate) fn resolve<'a>(document: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut reached = Vec::new();
    if document.contains_key(path) {
        reached.extend(document.get(path));
        return reached;
    }

    let parts: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
    if let Some((head, rest)) = parts.split_first() {
        if let Some(value) = document.get(head) {
            collect(value, rest, &mut reached);
        }
    }
    reached
}

fn collect<'a>(value: &'a Value, parts: &[&str], reached: &mut Vec<&'a Value>) {
    let (head, rest) = match parts.split_first() {
        Some(split) => split,
        None => {
            reached.push(value);
            return;
        }
    };

    match value {
        Value::Document(doc) => {
            if let Some(child) = doc.get(head) {
                collect(child, rest, reached);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(child) = items.get(index) {
                    collect(child, rest, reached);
                }
            }
            for item in items.iter().filter(|item| item.is_document()) {
                collect(item, parts, reached);
            }
        }
        _ => {}
    }
}

/// Reached values plus the elements of reached arrays.
fn candidates<'a>(reached: &[&'a Value]) -> Vec<&'a Value> {
    let mut all = Vec::with_capacity(reached.len());
    for value in reached {
        all.push(*value);
        if let Value::Array(items) = value {
            all.extend(items.iter());
        }
    }
    all
}

fn equals_any(reached: &[&Value], target: &Value) -> bool {
    if target.is_null() && reached.is_empty() {
        return true;
    }
    candidates(reached).iter().any(|v| *v == target)
}

fn compares(reached: &[&Value], target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates(reached)
        .iter()
        .filter(|v| v.type_order() == target.type_order())
        .any(|v| accept(v.cmp(&target)))
}
