use std::sync::{Arc, Mutex};

use bson::{Bson, Document};
use mlua::{Function, Lua, LuaOptions, StdLib, Value};

use crate::convert::{document_table, from_lua, to_lua};
use crate::error::VmError;

/// Source for the functions of one map-reduce job.
#[derive(Debug, Clone, Default)]
pub struct Scripts<'a> {
    pub map: &'a str,
    pub reduce: &'a str,
    pub finalize: Option<&'a str>,
    /// Globals installed before any function is compiled.
    pub scope: Option<&'a Document>,
}

type Emitted = Arc<Mutex<Vec<(Bson, Bson)>>>;

const SANDBOXED_GLOBALS: [&str; 6] = [
    "dofile",
    "loadfile",
    "load",
    "require",
    "collectgarbage",
    "print",
];

/// A Lua state holding compiled map, reduce and finalize functions.
///
/// Besides the base functions, only the `table`, `string`, `math` and
/// `utf8` libraries are loaded. Base functions that reach the file system,
/// compile new chunks or drive the collector are removed. `map(doc)`
/// reports pairs through the global `emit(key, value)`.
pub struct MapReduceVm {
    lua: Lua,
    map: Function,
    reduce: Function,
    finalize: Option<Function>,
    emitted: Emitted,
}

impl MapReduceVm {
    pub fn new(scripts: Scripts<'_>) -> Result<Self, VmError> {
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
            LuaOptions::default(),
        )?;
        let globals = lua.globals();
        for name in SANDBOXED_GLOBALS {
            globals.raw_set(name, Value::Nil)?;
        }

        let emitted: Emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let emit = lua.create_function(move |_, (key, value): (Value, Value)| {
            let key = from_lua(&key).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
            let value = from_lua(&value).map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
            sink.lock().unwrap().push((key, value));
            Ok(())
        })?;
        globals.set("emit", emit)?;

        if let Some(scope) = scripts.scope {
            for (name, value) in scope {
                globals.set(name.as_str(), to_lua(&lua, value)?)?;
            }
        }

        let map = compile(&lua, "map", scripts.map)?;
        let reduce = compile(&lua, "reduce", scripts.reduce)?;
        let finalize = match scripts.finalize {
            Some(src) => Some(compile(&lua, "finalize", src)?),
            None => None,
        };

        Ok(Self {
            lua,
            map,
            reduce,
            finalize,
            emitted,
        })
    }

    /// Run `map` over one document and return what it emitted.
    pub fn map(&self, doc: &Document) -> Result<Vec<(Bson, Bson)>, VmError> {
        let table = document_table(&self.lua, doc)?;
        let outcome = self.map.call::<()>(table);
        // emitted is empty between calls, failed ones included
        let pairs = std::mem::take(&mut *self.emitted.lock().unwrap());
        outcome?;
        Ok(pairs)
    }

    pub fn reduce(&self, key: &Bson, values: &[Bson]) -> Result<Bson, VmError> {
        let list = self.lua.create_table()?;
        for (i, value) in values.iter().enumerate() {
            list.raw_set(i + 1, to_lua(&self.lua, value)?)?;
        }
        let out: Value = self.reduce.call((to_lua(&self.lua, key)?, list))?;
        from_lua(&out)
    }

    /// Apply `finalize` when one was given, otherwise return `value`.
    pub fn finalize(&self, key: &Bson, value: Bson) -> Result<Bson, VmError> {
        match &self.finalize {
            Some(f) => {
                let out: Value = f.call((to_lua(&self.lua, key)?, to_lua(&self.lua, &value)?))?;
                from_lua(&out)
            }
            None => Ok(value),
        }
    }
}

fn compile(lua: &Lua, name: &'static str, src: &str) -> Result<Function, VmError> {
    let compile_err = |e: mlua::Error| VmError::Compile {
        name,
        message: e.to_string(),
    };
    let value: Value = lua
        .load(format!("return {src}"))
        .set_name(name)
        .eval()
        .map_err(compile_err)?;
    match value {
        Value::Function(f) => Ok(f),
        other => Err(VmError::Compile {
            name,
            message: format!("expected a function, got {}", other.type_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const SUM: &str =
        "function(key, values) local s = 0 for _, v in ipairs(values) do s = s + v end return s end";

    fn vm(map: &str, finalize: Option<&str>, scope: Option<&Document>) -> MapReduceVm {
        MapReduceVm::new(Scripts {
            map,
            reduce: SUM,
            finalize,
            scope,
        })
        .unwrap()
    }

    #[test]
    fn map_collects_emits() {
        let vm = vm("function(doc) emit(doc.x, doc.y) emit(doc.x, 1) end", None, None);
        let pairs = vm.map(&doc! { "x": 2, "y": 4 }).unwrap();
        assert_eq!(
            pairs,
            vec![
                (Bson::Int32(2), Bson::Int32(4)),
                (Bson::Int32(2), Bson::Int32(1)),
            ]
        );
        assert!(vm.map(&doc! { "x": 3 }).unwrap().len() == 2);
    }

    #[test]
    fn unread_unsupported_fields_do_not_fail_map() {
        let vm = vm("function(doc) emit(doc.x, doc.blob) end", None, None);
        let blob = Bson::Decimal128(bson::Decimal128::from_bytes([3; 16]));
        let source = doc! {
            "x": 1,
            "blob": blob.clone(),
            "other": bson::Timestamp { time: 1, increment: 2 },
        };
        let pairs = vm.map(&source).unwrap();
        assert_eq!(pairs, vec![(Bson::Int32(1), blob)]);

        let arithmetic = MapReduceVm::new(Scripts {
            map: "function(doc) emit(1, doc.blob + 1) end",
            reduce: SUM,
            ..Default::default()
        })
        .unwrap();
        assert!(arithmetic.map(&source).is_err());
    }

    #[test]
    fn reduce_sums_values() {
        let vm = vm("function(doc) end", None, None);
        let total = vm
            .reduce(&Bson::Int32(1), &[Bson::Int32(1), Bson::Int32(2)])
            .unwrap();
        assert_eq!(total, Bson::Int32(3));
    }

    #[test]
    fn scope_is_visible() {
        let scope = doc! { "factor": 10 };
        let vm = vm("function(doc) emit(doc.x, doc.x * factor) end", None, Some(&scope));
        let pairs = vm.map(&doc! { "x": 2 }).unwrap();
        assert_eq!(pairs, vec![(Bson::Int32(2), Bson::Int32(20))]);
    }

    #[test]
    fn finalize_is_optional() {
        let plain = vm("function(doc) end", None, None);
        assert_eq!(plain.finalize(&Bson::Null, Bson::Int32(4)).unwrap(), Bson::Int32(4));

        let doubled = vm("function(doc) end", Some("function(k, v) return v * 2 end"), None);
        assert_eq!(doubled.finalize(&Bson::Null, Bson::Int32(4)).unwrap(), Bson::Int32(8));
    }

    #[test]
    fn syntax_errors_are_compile_errors() {
        let err = MapReduceVm::new(Scripts {
            map: "function(doc) emit(",
            reduce: SUM,
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, VmError::Compile { name: "map", .. }));
    }

    #[test]
    fn non_functions_are_rejected() {
        let err = MapReduceVm::new(Scripts {
            map: "42",
            reduce: SUM,
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, VmError::Compile { .. }));
    }

    #[test]
    fn runtime_errors_surface() {
        let vm = vm("function(doc) error('boom') end", None, None);
        let err = vm.map(&doc! {}).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn loaders_and_collector_are_removed() {
        let type_of_globals = vm(
            "function(doc) for _, name in ipairs(doc.names) do emit(name, type(_G[name])) end end",
            None,
            None,
        );
        let names = ["dofile", "loadfile", "load", "require", "collectgarbage"];
        let pairs = type_of_globals.map(&doc! { "names": names.to_vec() }).unwrap();
        assert_eq!(pairs.len(), names.len());
        for (name, kind) in pairs {
            assert_eq!(kind, Bson::String("nil".into()), "{name} is reachable");
        }

        let reads_file = vm("function(doc) dofile('/etc/hostname') end", None, None);
        let err = reads_file.map(&doc! {}).unwrap_err();
        assert!(err.to_string().contains("nil"), "{err}");
    }

    #[test]
    fn os_library_is_not_loaded() {
        let vm = vm("function(doc) os.exit(1) end", None, None);
        assert!(vm.map(&doc! {}).is_err());
    }
}
