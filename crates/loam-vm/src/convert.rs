use bson::{Bson, Document};
use mlua::{Lua, Table, UserData, Value};

use crate::error::VmError;

const ARRAY_METATABLE: &str = "loam.array";
const ARRAY_MARKER: &str = "__bson";

/// A value scripts can carry around but not inspect.
struct Opaque(Bson);

impl UserData for Opaque {}

/// Build the Lua value the scripts see for a BSON value.
///
/// Documents become string-keyed tables, arrays become sequences tagged
/// with a shared metatable so they read back as arrays even when empty or
/// holding nulls. ObjectIds are passed as their hex string and dates as
/// epoch millis. Anything else is opaque userdata that reads back as the
/// original value.
pub fn to_lua(lua: &Lua, value: &Bson) -> Result<Value, VmError> {
    Ok(match value {
        Bson::Null | Bson::Undefined => Value::Nil,
        Bson::Boolean(b) => Value::Boolean(*b),
        Bson::Int32(n) => Value::Integer(i64::from(*n)),
        Bson::Int64(n) => Value::Integer(*n),
        Bson::Double(f) => Value::Number(*f),
        Bson::String(s) | Bson::Symbol(s) => Value::String(lua.create_string(s)?),
        Bson::ObjectId(oid) => Value::String(lua.create_string(oid.to_hex())?),
        Bson::DateTime(dt) => Value::Integer(dt.timestamp_millis()),
        Bson::Document(doc) => Value::Table(document_table(lua, doc)?),
        Bson::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua(lua, item)?)?;
            }
            table.set_metatable(Some(array_metatable(lua)?))?;
            Value::Table(table)
        }
        other => Value::UserData(lua.create_userdata(Opaque(other.clone()))?),
    })
}

fn array_metatable(lua: &Lua) -> Result<Table, VmError> {
    if let Some(mt) = lua.named_registry_value::<Option<Table>>(ARRAY_METATABLE)? {
        return Ok(mt);
    }
    let mt = lua.create_table()?;
    mt.raw_set(ARRAY_MARKER, "array")?;
    lua.set_named_registry_value(ARRAY_METATABLE, mt.clone())?;
    Ok(mt)
}

pub(crate) fn document_table(lua: &Lua, doc: &Document) -> Result<Table, VmError> {
    let table = lua.create_table()?;
    for (key, value) in doc {
        table.raw_set(key.as_str(), to_lua(lua, value)?)?;
    }
    Ok(table)
}

/// Read a script result back as BSON.
///
/// Integers that fit in 32 bits come back as `Int32`. Tables tagged as
/// arrays come back as arrays with missing slots as null. An untagged
/// table whose keys are exactly `1..=n` is an array; any other table is a
/// document with keys in sorted order.
pub fn from_lua(value: &Value) -> Result<Bson, VmError> {
    Ok(match value {
        Value::Nil => Bson::Null,
        Value::Boolean(b) => Bson::Boolean(*b),
        Value::Integer(n) => match i32::try_from(*n) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(*n),
        },
        Value::Number(f) => Bson::Double(*f),
        Value::String(s) => Bson::String(s.to_string_lossy().to_string()),
        Value::Table(table) => table_to_bson(table)?,
        Value::UserData(ud) => match ud.borrow::<Opaque>() {
            Ok(opaque) => opaque.0.clone(),
            Err(_) => return Err(VmError::Conversion("scripts cannot return userdata".into())),
        },
        other => {
            return Err(VmError::Conversion(format!(
                "scripts cannot return {}",
                other.type_name()
            )));
        }
    })
}

fn is_tagged_array(table: &Table) -> Result<bool, VmError> {
    match table.metatable() {
        Some(mt) => Ok(mt.raw_get::<Option<String>>(ARRAY_MARKER)?.as_deref() == Some("array")),
        None => Ok(false),
    }
}

/// Slot index for a key of an array-shaped table.
fn slot(key: &Value) -> Option<usize> {
    match key {
        Value::Integer(n) if *n >= 1 => usize::try_from(*n).ok(),
        _ => None,
    }
}

fn table_to_bson(table: &Table) -> Result<Bson, VmError> {
    let mut entries = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        entries.push(pair?);
    }

    if is_tagged_array(table)? && entries.iter().all(|(key, _)| slot(key).is_some()) {
        let len = entries.iter().filter_map(|(key, _)| slot(key)).max().unwrap_or(0);
        let mut items = vec![Bson::Null; len];
        for (key, value) in &entries {
            if let Some(i) = slot(key) {
                items[i - 1] = from_lua(value)?;
            }
        }
        return Ok(Bson::Array(items));
    }

    let len = table.raw_len();
    if len > 0 && entries.len() == len {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
            let item: Value = table.raw_get(i)?;
            items.push(from_lua(&item)?);
        }
        return Ok(Bson::Array(items));
    }

    let mut fields = Vec::with_capacity(entries.len());
    for (key, value) in &entries {
        let key = match key {
            Value::String(s) => s.to_string_lossy().to_string(),
            Value::Integer(n) => n.to_string(),
            other => {
                return Err(VmError::Conversion(format!(
                    "{} table keys cannot be field names",
                    other.type_name()
                )));
            }
        };
        fields.push((key, from_lua(value)?));
    }
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Bson::Document(fields.into_iter().collect()))
}
