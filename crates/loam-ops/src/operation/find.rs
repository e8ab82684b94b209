use bson::{Bson, Document, doc};

use crate::decode::{Decoded, decode};
use crate::error::OperationError;
use crate::operation::{Operation, check_namespace, run};
use crate::options::{
    count_bson, expect_document, expect_non_negative, expect_type_map, unknown,
};
use crate::reply;
use crate::server::Server;
use crate::type_map::TypeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub type_map: Option<TypeMap>,
    pub sort: Option<Document>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub projection: Option<Document>,
    pub batch_size: Option<u64>,
}

impl TryFrom<Document> for FindOptions {
    type Error = OperationError;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let mut options = FindOptions::default();
        for (key, value) in doc {
            match key.as_str() {
                "typeMap" => options.type_map = expect_type_map(&key, value)?,
                "sort" => options.sort = Some(expect_document(&key, value)?),
                "limit" => options.limit = Some(expect_non_negative(&key, value)?),
                "skip" => options.skip = Some(expect_non_negative(&key, value)?),
                "projection" => options.projection = Some(expect_document(&key, value)?),
                "batchSize" => options.batch_size = Some(expect_non_negative(&key, value)?),
                other => return Err(unknown(other)),
            }
        }
        Ok(options)
    }
}

/// Query a collection and materialize every matching document.
///
/// Follows the server cursor with `getMore` until it is exhausted, so the
/// returned sequence is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct Find {
    database: String,
    collection: String,
    filter: Document,
    options: FindOptions,
}

impl Find {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        filter: Document,
        options: FindOptions,
    ) -> Result<Self, OperationError> {
        let database = database.into();
        let collection = collection.into();
        check_namespace(&database, &collection)?;
        Ok(Self {
            database,
            collection,
            filter,
            options,
        })
    }

    fn get_more(&self, cursor_id: i64) -> Document {
        let mut cmd = doc! {
            "getMore": cursor_id,
            "collection": self.collection.as_str(),
        };
        if let Some(batch_size) = self.options.batch_size {
            cmd.insert("batchSize", count_bson(batch_size));
        }
        cmd
    }
}

/// Split a `{ cursor: { id, <batch> } }` reply into its id and batch.
fn read_cursor(mut reply: Document, batch: &str) -> Result<(i64, Vec<Bson>), OperationError> {
    let mut cursor = reply::take_document(&mut reply, "cursor")?;
    let id = reply::read_i64(&cursor, "id")?;
    let docs = reply::take_array(&mut cursor, batch)?;
    Ok((id, docs))
}

impl Operation for Find {
    type Output = Vec<Decoded>;

    fn command(&self) -> Document {
        let mut cmd = doc! {
            "find": self.collection.as_str(),
            "filter": self.filter.clone(),
        };
        let o = &self.options;
        if let Some(sort) = &o.sort {
            cmd.insert("sort", sort.clone());
        }
        if let Some(projection) = &o.projection {
            cmd.insert("projection", projection.clone());
        }
        if let Some(skip) = o.skip {
            cmd.insert("skip", count_bson(skip));
        }
        if let Some(limit) = o.limit {
            cmd.insert("limit", count_bson(limit));
        }
        if let Some(batch_size) = o.batch_size {
            cmd.insert("batchSize", count_bson(batch_size));
        }
        cmd
    }

    fn execute<S: Server + ?Sized>(&self, server: &S) -> Result<Vec<Decoded>, OperationError> {
        let reply = run(server, &self.database, self.command())?;
        let (mut cursor_id, mut raw) = read_cursor(reply, "firstBatch")?;
        while cursor_id != 0 {
            let reply = run(server, &self.database, self.get_more(cursor_id))?;
            let (next_id, batch) = read_cursor(reply, "nextBatch")?;
            raw.extend(batch);
            cursor_id = next_id;
        }
        decode(raw, &self.options.type_map.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_includes_options() {
        let find = Find::new(
            "test",
            "points",
            doc! { "x": 2 },
            FindOptions {
                sort: Some(doc! { "_id": 1 }),
                limit: Some(3),
                skip: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            find.command(),
            doc! {
                "find": "points",
                "filter": { "x": 2 },
                "sort": { "_id": 1 },
                "skip": 1,
                "limit": 3,
            }
        );
    }

    #[test]
    fn options_from_document() {
        let options = FindOptions::try_from(doc! { "typeMap": { "root": "object" }, "skip": 2 }).unwrap();
        assert_eq!(options.skip, Some(2));
        assert!(FindOptions::try_from(doc! { "tailable": true }).is_err());
    }

    #[test]
    fn rejects_empty_collection() {
        assert!(Find::new("test", "", Document::new(), Default::default()).is_err());
    }

    #[test]
    fn cursor_reply_without_batch_is_a_decode_error() {
        let err = read_cursor(doc! { "cursor": { "id": 0_i64 } }, "firstBatch").unwrap_err();
        assert!(matches!(err, OperationError::Decode(_)));
    }
}
