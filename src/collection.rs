//! The collection-level command helpers.
//!
//! Each method here assembles the parameter document a particular
//! MongoDB command expects and hands it to [`Connection::run_command`];
//! none of this is part of the wire contract itself (`run_command` is),
//! it is purely ergonomic sugar over the common `find`/`insert`/`update`/
//! `delete`/index/admin commands a collection handle is expected to offer.

use crate::bson::{Document, Value};
use crate::conn::Connection;
use crate::cursor::Cursor;
use crate::doc;
use crate::error::{MdbError, MdbResult};

/// A handle bound to one collection name within one database.
///
/// Borrows the connection for its lifetime; methods that return a
/// [`Cursor`] (`find`, `aggregate`) consume the handle, since the
/// cursor itself needs to keep borrowing the connection across
/// subsequent `getMore`s.
pub struct Collection<'a> {
    conn: &'a mut Connection,
    database: String,
    name: String,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(
        conn: &'a mut Connection,
        database: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            database: database.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, args: Document) -> MdbResult<Document> {
        self.conn.run_command(Some(&self.database), &args)
    }

    fn run_ok(&mut self, args: Document) -> MdbResult<Document> {
        let reply = self.run(args)?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            Err(operational(&reply))
        }
    }

    /// Runs `find`, returning a cursor over the matching documents.
    /// Consumes `self`: the returned [`Cursor`] keeps the connection
    /// borrowed to issue `getMore` as the batch is exhausted.
    pub fn find(self, filter: Document) -> MdbResult<Cursor<'a>> {
        self.find_with(filter, None, None)
    }

    /// `find` with an optional projection and batch size.
    pub fn find_with(
        mut self,
        filter: Document,
        projection: Option<Document>,
        batch_size: Option<i32>,
    ) -> MdbResult<Cursor<'a>> {
        let mut args = doc! {"find" => self.name.clone(), "filter" => filter};
        if let Some(projection) = projection {
            args.insert("projection", projection);
        }
        if let Some(batch_size) = batch_size {
            args.insert("batchSize", batch_size);
        }
        let reply = self.run_ok(args)?;
        let (batch, next_id) = first_batch(&reply)?;
        Ok(Cursor::new(
            self.conn,
            self.database,
            self.name,
            batch,
            next_id,
            batch_size,
        ))
    }

    /// Runs `find` with `limit: 1` and returns the sole matching
    /// document, if any.
    pub fn find_one(&mut self, filter: Document) -> MdbResult<Option<Document>> {
        self.find_one_with(filter, None)
    }

    pub fn find_one_with(
        &mut self,
        filter: Document,
        projection: Option<Document>,
    ) -> MdbResult<Option<Document>> {
        let mut args = doc! {
            "find" => self.name.clone(),
            "filter" => filter,
            "singleBatch" => true,
            "limit" => 1_i32,
        };
        if let Some(projection) = projection {
            args.insert("projection", projection);
        }
        let reply = self.run_ok(args)?;
        let (mut batch, _) = first_batch(&reply)?;
        Ok(if batch.is_empty() {
            None
        } else {
            Some(batch.remove(0))
        })
    }

    /// Runs `aggregate`, returning a cursor over the pipeline's output.
    pub fn aggregate(self, pipeline: Vec<Document>) -> MdbResult<Cursor<'a>> {
        self.aggregate_with(pipeline, Document::new())
    }

    pub fn aggregate_with(mut self, pipeline: Vec<Document>, cursor_opts: Document) -> MdbResult<Cursor<'a>> {
        let args = doc! {
            "aggregate" => self.name.clone(),
            "pipeline" => pipeline,
            "cursor" => cursor_opts,
        };
        let reply = self.run_ok(args)?;
        let (batch, next_id) = first_batch(&reply)?;
        Ok(Cursor::new(self.conn, self.database, self.name, batch, next_id, None))
    }

    /// `findAndModify`, raw parameters (`query`, `update`, `sort`,
    /// `remove`, `new`, `upsert`, `fields`, …) passed straight through.
    /// Returns the command's `value` field (the pre- or post-image,
    /// per the `new` flag), which is `Null` when nothing matched.
    pub fn find_and_modify(&mut self, mut params: Document) -> MdbResult<Value> {
        params.insert("findAndModify", self.name.clone());
        let reply = self.run_ok(params)?;
        Ok(reply.get("value").cloned().unwrap_or(Value::Null))
    }

    pub fn find_one_and_delete(&mut self, query: Document) -> MdbResult<Value> {
        self.find_and_modify(doc! {"query" => query, "remove" => true})
    }

    pub fn find_one_and_replace(&mut self, query: Document, replacement: Document) -> MdbResult<Value> {
        self.find_and_modify(doc! {
            "query" => query,
            "update" => replacement,
            "upsert" => true,
            "new" => true,
        })
    }

    /// Like [`Collection::find_one_and_replace`], but `update` is an
    /// update-operator document (`$set`, `$inc`, …) applied in place
    /// rather than a whole replacement document.
    pub fn find_one_and_update(&mut self, query: Document, update: Document) -> MdbResult<Value> {
        self.find_and_modify(doc! {
            "query" => query,
            "update" => update,
            "new" => true,
        })
    }

    /// Inserts one or more documents, returning the number the server
    /// reports as inserted (`n`).
    pub fn insert(&mut self, documents: Vec<Document>) -> MdbResult<i64> {
        let reply = self.run_ok(doc! {"insert" => self.name.clone(), "documents" => documents})?;
        Ok(reply.get_f64("n").unwrap_or(0.0) as i64)
    }

    pub fn insert_one(&mut self, document: Document) -> MdbResult<Document> {
        let ids = self.insert_many(vec![document])?;
        ids.into_iter().next().ok_or_else(|| {
            MdbError::protocol("insert reported success but returned no document")
        })
    }

    /// Inserts every document, assigning a fresh [`crate::bson::ObjectId`]
    /// to any missing `_id`, and returns the (possibly now-assigned)
    /// `_id` of each document in input order.
    pub fn insert_many(&mut self, mut documents: Vec<Document>) -> MdbResult<Vec<Document>> {
        for document in &mut documents {
            if document.get("_id").is_none() {
                let id = self.conn.gen_object_id()?;
                document.insert("_id", id);
            }
        }
        let reply = self.run(doc! {"insert" => self.name.clone(), "documents" => documents.clone()})?;
        if !reply.is_ok() {
            return Err(operational(&reply));
        }
        Ok(documents)
    }

    /// Raw `update` command: `updates` is the list of update
    /// specification documents (`q`, `u`, `upsert`, `multi`, …).
    pub fn update(&mut self, updates: Vec<Document>) -> MdbResult<Document> {
        self.run_ok(doc! {"update" => self.name.clone(), "updates" => updates})
    }

    pub fn update_one(&mut self, filter: Document, update: Document) -> MdbResult<Document> {
        self.update(vec![update_spec(filter, update, false, false)])
    }

    pub fn update_many(&mut self, filter: Document, update: Document) -> MdbResult<Document> {
        self.update(vec![update_spec(filter, update, true, false)])
    }

    pub fn replace_one(&mut self, filter: Document, replacement: Document) -> MdbResult<Document> {
        self.update(vec![update_spec(filter, replacement, false, false)])
    }

    pub fn upsert_one(&mut self, filter: Document, update: Document) -> MdbResult<Document> {
        self.update(vec![update_spec(filter, update, false, true)])
    }

    fn remove(&mut self, filter: Document, limit: i32) -> MdbResult<i64> {
        let deletes = vec![doc! {"q" => filter, "limit" => limit}];
        let reply = self.run_ok(doc! {"delete" => self.name.clone(), "deletes" => deletes})?;
        Ok(reply.get_f64("n").unwrap_or(0.0) as i64)
    }

    pub fn delete_one(&mut self, filter: Document) -> MdbResult<i64> {
        self.remove(filter, 1)
    }

    pub fn delete_many(&mut self, filter: Document) -> MdbResult<i64> {
        self.remove(filter, 0)
    }

    /// `save`: upserts by `_id` if present, otherwise inserts.
    pub fn save(&mut self, document: Document) -> MdbResult<Document> {
        match document.get("_id").cloned() {
            None => self.insert_one(document),
            Some(id) => {
                let mut rest = Document::new();
                for (k, v) in document.iter() {
                    if k != "_id" {
                        rest.insert(k, v.clone());
                    }
                }
                self.upsert_one(doc! {"_id" => id}, rest)
            }
        }
    }

    pub fn count(&mut self, query: Document) -> MdbResult<i64> {
        let reply = self.run_ok(doc! {"count" => self.name.clone(), "query" => query})?;
        Ok(reply.get_f64("n").unwrap_or(0.0) as i64)
    }

    pub fn distinct(&mut self, key: &str, query: Document) -> MdbResult<Vec<Value>> {
        let reply = self.run_ok(doc! {"distinct" => self.name.clone(), "key" => key, "query" => query})?;
        Ok(reply
            .get("values")
            .and_then(Value::as_array)
            .map(<[Value]>::to_vec)
            .unwrap_or_default())
    }

    /// Creates one index, deriving a name from the key spec
    /// (`field1_1_field2_-1`) when `options` does not set one.
    pub fn create_index(&mut self, keys: Document, mut options: Document) -> MdbResult<Document> {
        if options.get_str("name").is_none() {
            let name = default_index_name(&keys);
            options.insert("name", name);
        }
        options.insert("key", keys);
        self.create_indexes(vec![options])
    }

    pub fn create_indexes(&mut self, indexes: Vec<Document>) -> MdbResult<Document> {
        self.run_ok(doc! {"createIndexes" => self.name.clone(), "indexes" => indexes})
    }

    pub fn get_indexes(&mut self) -> MdbResult<Vec<Document>> {
        let reply = self.run_ok(doc! {"listIndexes" => self.name.clone()})?;
        let (batch, _) = first_batch(&reply)?;
        Ok(batch)
    }

    pub fn drop_index(&mut self, index_name: &str) -> MdbResult<Document> {
        self.run_ok(doc! {"deleteIndexes" => self.name.clone(), "index" => index_name})
    }

    pub fn drop_indexes(&mut self) -> MdbResult<Document> {
        self.drop_index("*")
    }

    /// Drops the collection. Returns `false` (rather than an error)
    /// when the collection did not exist (an `ns not found` reply is
    /// tolerated rather than surfaced).
    pub fn drop(&mut self) -> MdbResult<bool> {
        let reply = self.run(doc! {"drop" => self.name.clone()})?;
        Ok(reply.is_ok())
    }

    pub fn rename_collection(&mut self, new_name: &str) -> MdbResult<Document> {
        let from = format!("{}.{}", self.database, self.name);
        let to = format!("{}.{new_name}", self.database);
        let reply = self
            .conn
            .run_command(Some("admin"), &doc! {"renameCollection" => from, "to" => to})?;
        if reply.is_ok() {
            self.name = new_name.to_owned();
            Ok(reply)
        } else {
            Err(operational(&reply))
        }
    }

    pub fn stats(&mut self) -> MdbResult<Document> {
        self.run_ok(doc! {"collStats" => self.name.clone()})
    }

    pub fn data_size(&mut self) -> MdbResult<f64> {
        Ok(self.stats()?.get_f64("avgObjSize").unwrap_or(0.0))
    }

    pub fn storage_size(&mut self) -> MdbResult<f64> {
        Ok(self.stats()?.get_f64("storageSize").unwrap_or(0.0))
    }

    pub fn total_index_size(&mut self) -> MdbResult<f64> {
        Ok(self.stats()?.get_f64("totalIndexSize").unwrap_or(0.0))
    }

    pub fn total_size(&mut self) -> MdbResult<f64> {
        let stats = self.stats()?;
        Ok(stats.get_f64("storageSize").unwrap_or(0.0) + stats.get_f64("totalIndexSize").unwrap_or(0.0))
    }

    pub fn is_capped(&mut self) -> MdbResult<bool> {
        let reply = self
            .conn
            .run_command(
                Some(&self.database),
                &doc! {"listCollections" => 1.0_f64, "filter" => doc!{"name" => self.name.clone()}},
            )?;
        if !reply.is_ok() {
            return Err(operational(&reply));
        }
        let (batch, _) = first_batch(&reply)?;
        let entry = batch
            .first()
            .ok_or_else(|| MdbError::protocol("listCollections returned no matching entry"))?;
        Ok(entry
            .get("options")
            .and_then(Value::as_document)
            .and_then(|o| o.get_bool("capped"))
            .unwrap_or(false))
    }

    pub fn group(&mut self, group_spec: Document) -> MdbResult<Document> {
        let mut spec = group_spec;
        spec.insert("ns", self.name.clone());
        self.run_ok(doc! {"group" => spec})
    }

    pub fn map_reduce(&mut self, map_js: &str, reduce_js: &str, mut options: Document) -> MdbResult<Document> {
        options.insert("mapReduce", self.name.clone());
        options.insert("map", Value::JavaScriptCode(map_js.to_owned()));
        options.insert("reduce", Value::JavaScriptCode(reduce_js.to_owned()));
        self.run_ok(options)
    }

    pub fn re_index(&mut self) -> MdbResult<Document> {
        self.run_ok(doc! {"reIndex" => self.name.clone()})
    }

    pub fn validate(&mut self, full: bool) -> MdbResult<Document> {
        self.run_ok(doc! {"validate" => self.name.clone(), "full" => full})
    }
}

fn update_spec(filter: Document, update: Document, multi: bool, upsert: bool) -> Document {
    doc! {
        "q" => filter,
        "u" => update,
        "multi" => multi,
        "upsert" => upsert,
    }
}

fn operational(reply: &Document) -> MdbError {
    MdbError::Operational(reply.errmsg().unwrap_or("command failed").to_owned())
}

fn first_batch(reply: &Document) -> MdbResult<(Vec<Document>, i64)> {
    let cursor = reply
        .get("cursor")
        .and_then(Value::as_document)
        .ok_or_else(|| MdbError::protocol("reply is missing its cursor field"))?;
    let batch = cursor
        .get("firstBatch")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_document().cloned()).collect())
        .unwrap_or_default();
    let next_id = cursor.get("id").and_then(Value::as_i64).unwrap_or(0);
    Ok((batch, next_id))
}

/// Builds the default index name derived from a key spec when no
/// `name` option is given: each field and its direction joined with
/// `_`, e.g. `{name: 1, age: -1}` → `"name_1_age_-1"`.
fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .flat_map(|(k, v)| {
            let direction = v.as_f64().map_or_else(|| "1".to_owned(), |d| (d as i64).to_string());
            [k.to_owned(), direction]
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_index_name_joins_field_and_direction() {
        let keys = doc! {"name" => 1_i32, "age" => -1_i32};
        assert_eq!(default_index_name(&keys), "name_1_age_-1");
    }

    #[test]
    fn update_spec_carries_flags() {
        let spec = update_spec(doc! {"a" => 1_i32}, doc! {"$set" => doc!{}}, true, false);
        assert_eq!(spec.get_bool("multi"), Some(true));
        assert_eq!(spec.get_bool("upsert"), Some(false));
    }
}
