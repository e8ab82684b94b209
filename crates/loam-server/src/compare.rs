use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::error::CommandError;

/// Rank of a value's type in the cross-type sort order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::Decimal128(_) => 3,
        Bson::String(_) | Bson::Symbol(_) => 4,
        Bson::Document(_) => 5,
        Bson::Array(_) => 6,
        Bson::Binary(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::Boolean(_) => 9,
        Bson::DateTime(_) => 10,
        Bson::Timestamp(_) => 11,
        Bson::RegularExpression(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::JavaScriptCodeWithScope(_) => 14,
        Bson::MaxKey => 255,
        _ => 15,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// NaN sorts below every other number; `-0.0` equals `0.0`.
fn compare_doubles(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer with a double, without rounding the
/// integer through `f64`.
fn compare_int_double(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    // i64::MIN as f64 is exact; i64::MAX as f64 rounds up to 2^63
    if f >= i64::MAX as f64 {
        return Ordering::Less;
    }
    if f < i64::MIN as f64 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    i.cmp(&(whole as i64)).then_with(|| {
        let frac = f - whole;
        if frac > 0.0 {
            Ordering::Less
        } else if frac < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

/// Total order over BSON values. Numbers compare by value across widths.
/// `Decimal128` ranks after the other numbers and orders by its bytes.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::Double(x), Bson::Double(y)) => compare_doubles(*x, *y),
        (Bson::Double(x), other) => as_integer(other)
            .map(|i| compare_int_double(i, *x).reverse())
            .unwrap_or(Ordering::Equal),
        (other, Bson::Double(y)) => as_integer(other)
            .map(|i| compare_int_double(i, *y))
            .unwrap_or(Ordering::Equal),
        (Bson::Decimal128(x), Bson::Decimal128(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => compare_sequences(x, y),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .cmp(&y.bytes)
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype))),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => {
            (x.pattern.as_str(), x.options.as_str()).cmp(&(y.pattern.as_str(), y.options.as_str()))
        }
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y),
        (Bson::JavaScriptCodeWithScope(x), Bson::JavaScriptCodeWithScope(y)) => x
            .code
            .cmp(&y.code)
            .then_with(|| compare_documents(&x.scope, &y.scope)),
        _ => match (as_integer(a), as_integer(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
    }
}

fn compare_sequences(a: &[Bson], b: &[Bson]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = compare(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| compare(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Grouping key ordered by [`compare`].
#[derive(Debug, Clone)]
pub struct OrderedBson(pub Bson);

impl PartialEq for OrderedBson {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for OrderedBson {}

impl PartialOrd for OrderedBson {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedBson {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

// --- Filtering ---

/// Whether `doc` satisfies a top-level filter.
///
/// Each field either equals the given value or holds an operator document
/// using `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte` or `$in`.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, CommandError> {
    for (field, condition) in filter {
        let value = doc.get(field).unwrap_or(&Bson::Null);
        let ok = match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                matches_operators(value, ops)?
            }
            expected => compare(value, expected) == Ordering::Equal,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_operators(value: &Bson, ops: &Document) -> Result<bool, CommandError> {
    for (op, operand) in ops {
        let ord = compare(value, operand);
        let ok = match op.as_str() {
            "$eq" => ord == Ordering::Equal,
            "$ne" => ord != Ordering::Equal,
            "$gt" => type_rank(value) == type_rank(operand) && ord == Ordering::Greater,
            "$gte" => type_rank(value) == type_rank(operand) && ord != Ordering::Less,
            "$lt" => type_rank(value) == type_rank(operand) && ord == Ordering::Less,
            "$lte" => type_rank(value) == type_rank(operand) && ord != Ordering::Greater,
            "$in" => match operand {
                Bson::Array(candidates) => candidates
                    .iter()
                    .any(|c| compare(value, c) == Ordering::Equal),
                _ => return Err(CommandError::bad_value("$in needs an array")),
            },
            other => {
                return Err(CommandError::bad_value(format!(
                    "unknown operator: {other}"
                )));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

// --- Sorting ---

/// Parse `{ field: 1 | -1, ... }` into field/direction pairs.
pub fn sort_spec(sort: &Document) -> Result<Vec<(String, bool)>, CommandError> {
    sort.iter()
        .map(|(field, dir)| match as_f64(dir) {
            Some(d) if d == 1.0 => Ok((field.clone(), true)),
            Some(d) if d == -1.0 => Ok((field.clone(), false)),
            _ => Err(CommandError::bad_value(format!(
                "bad sort direction for '{field}'"
            ))),
        })
        .collect()
}

pub fn apply_sort(docs: &mut [Document], spec: &[(String, bool)]) {
    docs.sort_by(|a, b| {
        for (field, ascending) in spec {
            let av = a.get(field).unwrap_or(&Bson::Null);
            let bv = b.get(field).unwrap_or(&Bson::Null);
            let ord = compare(av, bv);
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
