use bson::{Bson, Document};

use crate::code::Javascript;
use crate::decode::decode;
use crate::error::OperationError;
use crate::operation::out::Out;
use crate::operation::{Operation, check_namespace, run};
use crate::options::{
    count_bson, expect_bool, expect_document, expect_non_negative, expect_type_map, unknown,
};
use crate::reply;
use crate::result::{MapReduceOutput, MapReduceResult, OutputCollection};
use crate::server::Server;
use crate::type_map::TypeMap;

/// Options recognized by [`MapReduce`].
///
/// Everything except `type_map` is forwarded to the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapReduceOptions {
    /// Ask for a timing breakdown. Defaults to `true`.
    pub verbose: Option<bool>,
    pub type_map: Option<TypeMap>,
    /// Filter applied to the source collection before mapping.
    pub query: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<u64>,
    pub finalize: Option<Javascript>,
    /// Globals visible to map, reduce and finalize.
    pub scope: Option<Document>,
    pub js_mode: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub max_time_ms: Option<u64>,
    pub collation: Option<Document>,
}

impl TryFrom<Document> for MapReduceOptions {
    type Error = OperationError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let mut options = MapReduceOptions::default();
        for (key, value) in doc {
            match key.as_str() {
                "verbose" => options.verbose = Some(expect_bool(&key, value)?),
                "typeMap" => options.type_map = expect_type_map(&key, value)?,
                "query" => options.query = Some(expect_document(&key, value)?),
                "sort" => options.sort = Some(expect_document(&key, value)?),
                "limit" => options.limit = Some(expect_non_negative(&key, value)?),
                "finalize" => options.finalize = Some(Javascript::try_from(value)?),
                "scope" => options.scope = Some(expect_document(&key, value)?),
                "jsMode" => options.js_mode = Some(expect_bool(&key, value)?),
                "bypassDocumentValidation" => {
                    options.bypass_document_validation = Some(expect_bool(&key, value)?)
                }
                "maxTimeMS" => options.max_time_ms = Some(expect_non_negative(&key, value)?),
                "collation" => options.collation = Some(expect_document(&key, value)?),
                other => return Err(unknown(other)),
            }
        }
        Ok(options)
    }
}

/// Server-side map-reduce over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MapReduce {
    database: String,
    collection: String,
    map: Javascript,
    reduce: Javascript,
    out: Out,
    options: MapReduceOptions,
}

impl MapReduce {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        map: Javascript,
        reduce: Javascript,
        out: Out,
        options: MapReduceOptions,
    ) -> Result<Self, OperationError> {
        let database = database.into();
        let collection = collection.into();
        check_namespace(&database, &collection)?;
        out.validate()?;
        Ok(Self {
            database,
            collection,
            map,
            reduce,
            out,
            options,
        })
    }

    pub fn out(&self) -> &Out {
        &self.out
    }

    fn verbose(&self) -> bool {
        self.options.verbose.unwrap_or(true)
    }

    fn type_map(&self) -> TypeMap {
        self.options.type_map.clone().unwrap_or_default()
    }

    fn output_reference(&self, value: Option<Bson>) -> Result<OutputCollection, OperationError> {
        let default_db = match &self.out {
            Out::Collection {
                database: Some(db), ..
            } => db.clone(),
            _ => self.database.clone(),
        };
        match value {
            Some(Bson::String(collection)) => Ok(OutputCollection {
                database: default_db,
                collection,
            }),
            Some(Bson::Document(target)) => Ok(OutputCollection {
                database: reply::read_string(&target, "db")?,
                collection: reply::read_string(&target, "collection")?,
            }),
            Some(other) => Err(OperationError::decode(format!(
                "`result` is {:?}, expected a collection reference",
                other.element_type()
            ))),
            None => Err(OperationError::decode("missing `result`")),
        }
    }

    fn parse_reply(&self, mut reply: Document) -> Result<MapReduceResult, OperationError> {
        let time_millis = reply::read_i64(&reply, "timeMillis")?;
        let execution_time_ms = u64::try_from(time_millis)
            .map_err(|_| OperationError::decode("`timeMillis` is negative"))?;
        let counts = reply::take_document(&mut reply, "counts")?;
        let timing = match (self.verbose(), reply.remove("timing")) {
            (true, Some(Bson::Document(timing))) => timing,
            (true, Some(other)) => {
                return Err(OperationError::decode(format!(
                    "`timing` is {:?}, expected a document",
                    other.element_type()
                )));
            }
            _ => Document::new(),
        };

        let output = match &self.out {
            Out::Inline => {
                let results = reply::take_array(&mut reply, "results")?;
                MapReduceOutput::Inline(decode(results, &self.type_map())?)
            }
            Out::Collection { .. } => {
                MapReduceOutput::Collection(self.output_reference(reply.remove("result"))?)
            }
        };

        Ok(MapReduceResult {
            output,
            execution_time_ms,
            counts,
            timing,
        })
    }
}

impl Operation for MapReduce {
    type Output = MapReduceResult;

    fn command(&self) -> Document {
        let mut cmd = Document::new();
        cmd.insert("mapReduce", self.collection.as_str());
        cmd.insert("map", self.map.clone());
        cmd.insert("reduce", self.reduce.clone());
        cmd.insert("out", self.out.to_bson());
        cmd.insert("verbose", self.verbose());

        let o = &self.options;
        if let Some(query) = &o.query {
            cmd.insert("query", query.clone());
        }
        if let Some(sort) = &o.sort {
            cmd.insert("sort", sort.clone());
        }
        if let Some(limit) = o.limit {
            cmd.insert("limit", count_bson(limit));
        }
        if let Some(finalize) = &o.finalize {
            cmd.insert("finalize", finalize.clone());
        }
        if let Some(scope) = &o.scope {
            cmd.insert("scope", scope.clone());
        }
        if let Some(js_mode) = o.js_mode {
            cmd.insert("jsMode", js_mode);
        }
        if let Some(bypass) = o.bypass_document_validation {
            cmd.insert("bypassDocumentValidation", bypass);
        }
        if let Some(max_time_ms) = o.max_time_ms {
            cmd.insert("maxTimeMS", count_bson(max_time_ms));
        }
        if let Some(collation) = &o.collation {
            cmd.insert("collation", collation.clone());
        }
        cmd
    }

    fn execute<S: Server + ?Sized>(&self, server: &S) -> Result<MapReduceResult, OperationError> {
        let reply = run(server, &self.database, self.command())?;
        self.parse_reply(reply)
    }
}
