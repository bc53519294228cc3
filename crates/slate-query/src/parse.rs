//! Parse MongoDB-shell-shaped `bson::Document`s into [`Selector`]s and
//! [`Modifier`]s. This is the ergonomic entry point most callers use instead
//! of building the trees in §4.1 by hand.

use bson::{Bson, Document};

use crate::error::QueryError;
use crate::modifier::{FieldMutation, FieldUpdate, Modifier, PopDirection, PullSpec};
use crate::operator::{BsonTypeName, Condition};
use crate::selector::Selector;

pub fn parse_selector(doc: &Document) -> Result<Selector, QueryError> {
    let mut clauses = Vec::new();
    for (key, value) in doc {
        match key.as_str() {
            "$and" => clauses.push(Selector::and(parse_selector_array(value)?)?),
            "$or" => clauses.push(Selector::or(parse_selector_array(value)?)?),
            "$nor" => clauses.push(Selector::nor(parse_selector_array(value)?)?),
            k if k.starts_with('$') => {
                return Err(QueryError::UnknownOperator(k.to_string()));
            }
            field => clauses.push(parse_field_clause(field, value)?),
        }
    }
    match clauses.len() {
        0 => Err(QueryError::MalformedSelector("empty selector document".into())),
        1 => Ok(clauses.pop().unwrap()),
        _ => Selector::and(clauses),
    }
}

fn parse_selector_array(value: &Bson) -> Result<Vec<Selector>, QueryError> {
    let arr = match value {
        Bson::Array(a) => a,
        _ => return Err(QueryError::MalformedSelector("expected array".into())),
    };
    arr.iter()
        .map(|v| match v {
            Bson::Document(d) => parse_selector(d),
            _ => Err(QueryError::MalformedSelector("expected document".into())),
        })
        .collect()
}

fn parse_field_clause(field: &str, value: &Bson) -> Result<Selector, QueryError> {
    match value {
        Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            let mut conditions = Vec::new();
            for (op, arg) in ops {
                conditions.push(Selector::field(field, parse_condition(op, arg)?));
            }
            match conditions.len() {
                1 => Ok(conditions.pop().unwrap()),
                _ => Selector::and(conditions),
            }
        }
        other => Ok(Selector::field(field, Condition::Eq(other.clone()))),
    }
}

fn parse_condition(op: &str, arg: &Bson) -> Result<Condition, QueryError> {
    Ok(match op {
        "$eq" => Condition::Eq(arg.clone()),
        "$ne" => Condition::Ne(arg.clone()),
        "$gt" => Condition::Gt(arg.clone()),
        "$gte" => Condition::Gte(arg.clone()),
        "$lt" => Condition::Lt(arg.clone()),
        "$lte" => Condition::Lte(arg.clone()),
        "$in" => Condition::In(as_array(arg)?),
        "$nin" => Condition::Nin(as_array(arg)?),
        "$exists" => Condition::Exists(matches!(arg, Bson::Boolean(true))),
        "$regex" => Condition::Regex(parse_regex(arg)?),
        "$size" => Condition::Size(as_i64(arg)?),
        "$all" => Condition::All(as_array(arg)?),
        "$elemMatch" => match arg {
            Bson::Document(d) => Condition::ElemMatch(Box::new(parse_selector(d)?)),
            _ => return Err(QueryError::MalformedSelector("$elemMatch expects a document".into())),
        },
        "$type" => match arg {
            Bson::String(name) => Condition::Type(
                BsonTypeName::from_name(name)
                    .ok_or_else(|| QueryError::MalformedSelector(format!("unknown $type: {name}")))?,
            ),
            _ => return Err(QueryError::MalformedSelector("$type expects a string".into())),
        },
        "$not" => match arg {
            Bson::Document(d) => {
                let (inner_op, inner_arg) = d
                    .iter()
                    .next()
                    .ok_or_else(|| QueryError::MalformedSelector("$not requires an operator".into()))?;
                Condition::Not(Box::new(parse_condition(inner_op, inner_arg)?))
            }
            _ => return Err(QueryError::MalformedSelector("$not expects a document".into())),
        },
        "$mod" => {
            let pair = as_array(arg)?;
            if pair.len() != 2 {
                return Err(QueryError::MalformedSelector("$mod expects [divisor, remainder]".into()));
            }
            Condition::Mod(as_i64(&pair[0])?, as_i64(&pair[1])?)
        }
        other => return Err(QueryError::UnknownOperator(other.to_string())),
    })
}

fn parse_regex(arg: &Bson) -> Result<regex::Regex, QueryError> {
    match arg {
        Bson::String(pattern) => regex::Regex::new(pattern)
            .map_err(|e| QueryError::MalformedSelector(format!("invalid $regex: {e}"))),
        Bson::RegularExpression(re) => {
            let mut pattern = String::new();
            if re.options.contains('i') {
                pattern.push_str("(?i)");
            }
            pattern.push_str(&re.pattern);
            regex::Regex::new(&pattern)
                .map_err(|e| QueryError::MalformedSelector(format!("invalid $regex: {e}")))
        }
        _ => Err(QueryError::MalformedSelector("$regex expects a string or pattern".into())),
    }
}

fn as_array(value: &Bson) -> Result<Vec<Bson>, QueryError> {
    match value {
        Bson::Array(a) => Ok(a.clone()),
        _ => Err(QueryError::MalformedSelector("expected array argument".into())),
    }
}

fn as_i64(value: &Bson) -> Result<i64, QueryError> {
    match value {
        Bson::Int32(n) => Ok(*n as i64),
        Bson::Int64(n) => Ok(*n),
        Bson::Double(n) => Ok(*n as i64),
        _ => Err(QueryError::MalformedSelector("expected integer argument".into())),
    }
}

/// Parse a modifier document. If no top-level key starts with `$`, the
/// document is a full replacement (spec §4.1).
pub fn parse_modifier(doc: &Document) -> Result<Modifier, QueryError> {
    if !doc.keys().any(|k| k.starts_with('$')) {
        return Ok(Modifier::Replace(doc.clone()));
    }

    let mut updates = Vec::new();
    for (op, fields) in doc {
        let fields = match fields {
            Bson::Document(d) => d,
            _ => return Err(QueryError::MalformedModifier(format!("{op} expects a document"))),
        };
        for (path, arg) in fields {
            updates.push(FieldUpdate {
                path: path.clone(),
                mutation: parse_field_mutation(op, arg)?,
            });
        }
    }
    Ok(Modifier::Update(updates))
}

fn parse_field_mutation(op: &str, arg: &Bson) -> Result<FieldMutation, QueryError> {
    Ok(match op {
        "$set" => FieldMutation::Set(arg.clone()),
        "$unset" => FieldMutation::Unset,
        "$inc" => FieldMutation::Inc(arg.clone()),
        "$mul" => FieldMutation::Mul(arg.clone()),
        "$min" => FieldMutation::Min(arg.clone()),
        "$max" => FieldMutation::Max(arg.clone()),
        "$currentDate" => FieldMutation::CurrentDate,
        "$rename" => match arg {
            Bson::String(target) => FieldMutation::Rename(target.clone()),
            _ => return Err(QueryError::MalformedModifier("$rename expects a string".into())),
        },
        "$setOnInsert" => FieldMutation::SetOnInsert(arg.clone()),
        "$addToSet" => FieldMutation::AddToSet(each_or_single(arg)),
        "$push" => FieldMutation::Push(each_or_single(arg)),
        "$pull" => match arg {
            Bson::Document(d) if d.keys().any(|k| k.starts_with('$')) => {
                FieldMutation::Pull(PullSpec::Matching(parse_selector(d)?))
            }
            other => FieldMutation::Pull(PullSpec::Value(other.clone())),
        },
        "$pullAll" => FieldMutation::PullAll(as_array(arg)?),
        "$pop" => match arg {
            Bson::Int32(-1) | Bson::Int64(-1) => FieldMutation::Pop(PopDirection::First),
            _ => FieldMutation::Pop(PopDirection::Last),
        },
        other => return Err(QueryError::UnknownOperator(other.to_string())),
    })
}

/// `$addToSet`/`$push` accept either a bare value or `{ $each: [...] }`.
fn each_or_single(arg: &Bson) -> Vec<Bson> {
    if let Bson::Document(d) = arg {
        if let Some(Bson::Array(items)) = d.get("$each") {
            return items.clone();
        }
    }
    vec![arg.clone()]
}
