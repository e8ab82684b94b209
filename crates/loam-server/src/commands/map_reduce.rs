use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bson::{Bson, Document, doc};
use loam_vm::{MapReduceVm, Scripts};

use super::{count, optional_bool, optional_count, optional_document, required_str};
use crate::catalog::{self, Catalog};
use crate::compare::OrderedBson;
use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Replace,
    Merge,
    Reduce,
}

#[derive(Debug, PartialEq)]
enum Target {
    Inline,
    Collection {
        db: String,
        name: String,
        action: Action,
    },
}

fn parse_out(value: Option<&Bson>, source_db: &str) -> Result<Target, CommandError> {
    let spec = match value {
        Some(Bson::String(name)) if !name.is_empty() => {
            return Ok(Target::Collection {
                db: source_db.to_string(),
                name: name.clone(),
                action: Action::Replace,
            });
        }
        Some(Bson::Document(spec)) => spec,
        Some(_) => return Err(CommandError::type_mismatch("out", "a string or an object")),
        None => return Err(CommandError::failed_to_parse("missing 'out'")),
    };

    if spec.contains_key("inline") {
        return match spec.len() {
            1 => Ok(Target::Inline),
            _ => Err(CommandError::bad_value("'inline' takes no other out options")),
        };
    }

    let mut target = None;
    let mut db = source_db.to_string();
    for (key, value) in spec {
        let action = match key.as_str() {
            "replace" => Action::Replace,
            "merge" => Action::Merge,
            "reduce" => Action::Reduce,
            "db" => {
                db = required_str(spec, "db")?.to_string();
                continue;
            }
            other => {
                return Err(CommandError::bad_value(format!("unknown out option '{other}'")));
            }
        };
        if target.is_some() {
            return Err(CommandError::bad_value("out takes exactly one output action"));
        }
        match value {
            Bson::String(name) if !name.is_empty() => target = Some((name.clone(), action)),
            _ => return Err(CommandError::type_mismatch(key, "a collection name")),
        }
    }
    match target {
        Some((name, action)) => Ok(Target::Collection { db, name, action }),
        None => Err(CommandError::bad_value("out needs one of replace, merge or reduce")),
    }
}

/// Function source plus the scope carried with it, if any.
fn function<'a>(
    command: &'a Document,
    key: &str,
) -> Result<Option<(&'a str, Option<&'a Document>)>, CommandError> {
    match command.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(code)) | Some(Bson::JavaScriptCode(code)) => Ok(Some((code, None))),
        Some(Bson::JavaScriptCodeWithScope(js)) => Ok(Some((&js.code, Some(&js.scope)))),
        Some(_) => Err(CommandError::type_mismatch(key, "code")),
    }
}

fn required_function<'a>(
    command: &'a Document,
    key: &str,
) -> Result<(&'a str, Option<&'a Document>), CommandError> {
    function(command, key)?.ok_or_else(|| CommandError::failed_to_parse(format!("missing '{key}'")))
}

fn duration_millis(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}

fn millis(since: Instant) -> i64 {
    duration_millis(since.elapsed())
}

/// `{ mapReduce, map, reduce, out, query?, sort?, limit?, finalize?,
/// scope?, verbose? }`.
///
/// Keys are grouped in ascending order, `reduce` only runs for keys with
/// more than one value, and output documents are `{ _id, value }`.
pub fn run(catalog: &Catalog, db: &str, command: &Document) -> Result<Document, CommandError> {
    let started = Instant::now();

    let collection = required_str(command, "mapReduce")?;
    let (map, map_scope) = required_function(command, "map")?;
    let (reduce, reduce_scope) = required_function(command, "reduce")?;
    let finalize = function(command, "finalize")?;
    let target = parse_out(command.get("out"), db)?;
    let empty = Document::new();
    let query = optional_document(command, "query")?.unwrap_or(&empty);
    let sort = optional_document(command, "sort")?;
    let limit = optional_count(command, "limit")?;
    let verbose = optional_bool(command, "verbose")?.unwrap_or(false);

    let mut scope = Document::new();
    for carried in [map_scope, reduce_scope, finalize.and_then(|(_, s)| s)]
        .into_iter()
        .flatten()
    {
        scope.extend(carried.clone());
    }
    if let Some(shared) = optional_document(command, "scope")? {
        scope.extend(shared.clone());
    }

    let vm = MapReduceVm::new(Scripts {
        map,
        reduce,
        finalize: finalize.map(|(code, _)| code),
        scope: Some(&scope),
    })?;

    let source = catalog.find(&catalog::namespace(db, collection), query, sort, 0, limit)?;
    let input = source.len() as u64;

    let mut groups: BTreeMap<OrderedBson, Vec<Bson>> = BTreeMap::new();
    let mut emitted = 0u64;
    let mut in_map = Duration::ZERO;
    let loop_started = Instant::now();
    for doc in &source {
        let call_started = Instant::now();
        let pairs = vm.map(doc)?;
        in_map += call_started.elapsed();
        for (key, value) in pairs {
            emitted += 1;
            groups.entry(OrderedBson(key)).or_default().push(value);
        }
    }
    // mapTime counts only the map calls; emitLoop adds grouping
    let map_time = duration_millis(in_map);
    let emit_loop = millis(loop_started);

    let reduce_started = Instant::now();
    let mut reductions = 0u64;
    let mut reduced = Vec::with_capacity(groups.len());
    for (OrderedBson(key), mut values) in groups {
        let value = if values.len() > 1 {
            reductions += 1;
            vm.reduce(&key, &values)?
        } else {
            values.pop().unwrap_or(Bson::Null)
        };
        reduced.push((key, value));
    }

    if let Target::Collection {
        db: out_db,
        name,
        action: Action::Reduce,
    } = &target
    {
        let out_ns = catalog::namespace(out_db, name);
        for (key, value) in &mut reduced {
            if let Some(existing) = catalog.find_by_id(&out_ns, key) {
                let previous = existing.get("value").cloned().unwrap_or(Bson::Null);
                *value = vm.reduce(key, &[previous, value.clone()])?;
            }
        }
    }

    let mut output = Vec::with_capacity(reduced.len());
    for (key, value) in reduced {
        let value = vm.finalize(&key, value)?;
        output.push(doc! { "_id": key, "value": value });
    }
    let reduce_time = millis(reduce_started);
    let produced = output.len() as u64;

    let mut reply = Document::new();
    match target {
        Target::Inline => {
            let results: Vec<Bson> = output.into_iter().map(Bson::Document).collect();
            reply.insert("results", results);
        }
        Target::Collection {
            db: out_db,
            name,
            action,
        } => {
            let out_ns = catalog::namespace(&out_db, &name);
            match action {
                Action::Replace => catalog.replace_all(&out_ns, output),
                Action::Merge | Action::Reduce => catalog.upsert_all(&out_ns, output),
            }
            if out_db == db {
                reply.insert("result", name);
            } else {
                reply.insert("result", doc! { "db": out_db, "collection": name });
            }
        }
    }

    let total = millis(started);
    tracing::debug!(
        collection,
        input,
        emitted,
        reductions,
        output = produced,
        total_ms = total,
        "map-reduce finished"
    );

    reply.insert("timeMillis", count(total as u64));
    if verbose {
        reply.insert(
            "timing",
            doc! {
                "mapTime": map_time,
                "emitLoop": emit_loop,
                "reduceTime": reduce_time,
                "total": total,
            },
        );
    }
    reply.insert(
        "counts",
        doc! {
            "input": count(input),
            "emit": count(emitted),
            "reduce": count(reductions),
            "output": count(produced),
        },
    );
    reply.insert("ok", 1.0);
    Ok(reply)
}
