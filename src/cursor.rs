//! Cursors over the result set of a `find`/`aggregate`/`listIndexes`
//! command.

use crate::bson::Document;
use crate::conn::Connection;
use crate::doc;
use crate::error::{MdbError, MdbResult};

/// An iterator over a command's result batches, re-fetching with
/// `getMore` as the current batch is exhausted.
///
/// A cursor whose `id` is `0` is already exhausted, whether because
/// the server returned everything in its first batch or because a
/// later `getMore` drained it; `Cursor` never issues a `getMore` once
/// it observes a zero id.
pub struct Cursor<'a> {
    conn: &'a mut Connection,
    database: String,
    collection: String,
    batch: Vec<Document>,
    index: usize,
    next_id: i64,
    batch_size: Option<i32>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(
        conn: &'a mut Connection,
        database: impl Into<String>,
        collection: impl Into<String>,
        batch: Vec<Document>,
        next_id: i64,
        batch_size: Option<i32>,
    ) -> Self {
        Self {
            conn,
            database: database.into(),
            collection: collection.into(),
            batch,
            index: 0,
            next_id,
            batch_size,
        }
    }

    /// Returns the next document, fetching a new batch from the
    /// server if the current one is exhausted and the cursor is not
    /// yet dead.
    pub fn fetch_one(&mut self) -> MdbResult<Option<Document>> {
        if self.index >= self.batch.len() {
            if self.next_id == 0 {
                return Ok(None);
            }
            self.fetch_more()?;
            if self.batch.is_empty() {
                return Ok(None);
            }
        }
        let doc = self.batch[self.index].clone();
        self.index += 1;
        Ok(Some(doc))
    }

    /// Drains the cursor completely, issuing as many `getMore`s as
    /// needed.
    pub fn fetch_all(mut self) -> MdbResult<Vec<Document>> {
        let mut out = Vec::new();
        while let Some(doc) = self.fetch_one()? {
            out.push(doc);
        }
        Ok(out)
    }

    fn fetch_more(&mut self) -> MdbResult<()> {
        let mut args = doc! {
            "getMore" => self.next_id,
            "collection" => self.collection.as_str(),
        };
        if let Some(batch_size) = self.batch_size {
            args.insert("batchSize", batch_size);
        }
        let reply = self
            .conn
            .raw_command(&self.database, "getMore", &args)?;
        if !reply.is_ok() {
            return Err(MdbError::Operational(
                reply.errmsg().unwrap_or("getMore failed").to_owned(),
            ));
        }
        let cursor_doc = reply
            .get("cursor")
            .and_then(|v| v.as_document())
            .ok_or_else(|| MdbError::protocol("getMore reply is missing cursor"))?;
        let next_batch = cursor_doc
            .get("nextBatch")
            .and_then(|v| v.as_array())
            .ok_or_else(|| MdbError::protocol("getMore reply is missing cursor.nextBatch"))?;
        self.batch = next_batch
            .iter()
            .filter_map(|v| v.as_document().cloned())
            .collect();
        self.index = 0;
        self.next_id = cursor_doc.get("id").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(())
    }
}

impl Iterator for Cursor<'_> {
    type Item = MdbResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_one().transpose()
    }
}

#[cfg(test)]
mod tests {
    // `Cursor` requires a live connection to exercise `getMore`;
    // `raw_command` has no seam for a fake transport, so its batch
    // exhaustion and re-fetch logic here are covered by
    // `Collection`/`Database` integration tests run against a real
    // server, not unit tests in this module.
}
