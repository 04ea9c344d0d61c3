//! The database-level command helpers.
//!
//! Covers collection management, `dbStats`/`serverStatus`/`isMaster`
//! and friends, and the error/log introspection commands, with
//! dynamic `db.pets`-style attribute access replaced by an explicit
//! [`Database::collection`] factory method (see `DESIGN.md`).

use crate::bson::{Document, ObjectId, Value};
use crate::collection::Collection;
use crate::conn::Connection;
use crate::doc;
use crate::error::{MdbError, MdbResult};

/// A handle bound to one database name on a connection.
///
/// Borrows the connection for its lifetime; [`Database::collection`]
/// consumes the handle to hand that borrow on to the returned
/// [`Collection`], the same single-owner discipline [`Collection`]
/// itself uses for [`crate::Cursor`].
pub struct Database<'a> {
    conn: &'a mut Connection,
    name: String,
}

impl<'a> Database<'a> {
    pub(crate) fn new(conn: &'a mut Connection, name: impl Into<String>) -> Self {
        Self {
            conn,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a handle bound to the named collection. Does not check
    /// that the collection exists; MongoDB creates collections
    /// implicitly on first write.
    #[must_use]
    pub fn collection(self, name: impl Into<String>) -> Collection<'a> {
        Collection::new(self.conn, self.name, name)
    }

    /// Dispatches `args` as-is; does not branch on the reply's `ok`
    /// field (unlike every other method here, which raises
    /// [`MdbError::Operational`] on failure).
    pub fn run_command(&mut self, args: Document) -> MdbResult<Document> {
        self.conn.run_command(Some(&self.name), &args)
    }

    fn run_ok(&mut self, args: Document) -> MdbResult<Document> {
        let reply = self.run_command(args)?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            Err(MdbError::Operational(
                reply.errmsg().unwrap_or("command failed").to_owned(),
            ))
        }
    }

    pub fn create_collection(&mut self, name: &str, mut options: Document) -> MdbResult<Document> {
        options.insert("create", name);
        self.run_ok(options)
    }

    pub fn create_view(
        &mut self,
        view_name: &str,
        source_collection: &str,
        pipeline: Vec<Document>,
        collation: Option<Document>,
    ) -> MdbResult<Document> {
        let mut args = doc! {
            "create" => view_name,
            "viewOn" => source_collection,
            "pipeline" => pipeline,
        };
        if let Some(collation) = collation {
            args.insert("collation", collation);
        }
        self.run_ok(args)
    }

    pub fn drop_database(&mut self) -> MdbResult<Document> {
        self.run_ok(doc! {"dropDatabase" => 1.0_f64})
    }

    pub fn collection_infos(&mut self) -> MdbResult<Vec<Document>> {
        let reply = self.run_ok(doc! {"listCollections" => 1.0_f64})?;
        let cursor = reply
            .get("cursor")
            .and_then(Value::as_document)
            .ok_or_else(|| MdbError::protocol("listCollections reply is missing its cursor field"))?;
        Ok(cursor
            .get("firstBatch")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_document().cloned()).collect())
            .unwrap_or_default())
    }

    pub fn collection_names(&mut self) -> MdbResult<Vec<String>> {
        Ok(self
            .collection_infos()?
            .iter()
            .filter_map(|d| d.get_str("name").map(ToOwned::to_owned))
            .collect())
    }

    /// Returns the name of every existing collection, the same set
    /// [`Database::collection_names`] reports.
    ///
    /// A per-name live [`Collection`] handle is not offered here: each
    /// one exclusively borrows `&mut Connection` for its lifetime, so
    /// more than one cannot be alive at once. Pass each name from
    /// [`Database::collection_names`] to
    /// [`Connection::database`]/[`Database::collection`] one at a time
    /// instead.
    pub fn collections(&mut self) -> MdbResult<Vec<String>> {
        self.collection_names()
    }

    pub fn get_last_error(&mut self) -> MdbResult<Option<String>> {
        Ok(self
            .get_last_error_obj()?
            .get_str("err")
            .map(ToOwned::to_owned))
    }

    pub fn get_last_error_obj(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"getLastError" => 1.0_f64})
    }

    pub fn get_prev_error(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"getPrevError" => 1.0_f64})
    }

    pub fn host_info(&mut self) -> MdbResult<Document> {
        self.run_ok(doc! {"hostInfo" => 1.0_f64})
    }

    pub fn is_master(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"isMaster" => 1.0_f64})
    }

    pub fn list_commands(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"listCommands" => 1.0_f64})
    }

    pub fn repair_database(&mut self) -> MdbResult<Document> {
        self.run_ok(doc! {"repairDatabase" => 1.0_f64})
    }

    pub fn server_build_info(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"buildInfo" => 1.0_f64})
    }

    pub fn server_status(&mut self) -> MdbResult<Document> {
        self.run_command(doc! {"serverStatus" => 1.0_f64})
    }

    pub fn stats(&mut self, scale: Option<f64>) -> MdbResult<Document> {
        let mut args = doc! {"dbStats" => 1.0_f64};
        if let Some(scale) = scale {
            args.insert("scale", scale);
        }
        self.run_command(args)
    }

    pub fn version(&mut self) -> MdbResult<String> {
        self.server_build_info()?
            .get_str("version")
            .map(ToOwned::to_owned)
            .ok_or_else(|| MdbError::protocol("buildInfo reply is missing its version field"))
    }

    pub fn gen_object_id(&mut self) -> MdbResult<ObjectId> {
        self.conn.gen_object_id()
    }

    pub fn command_help(&mut self, command_name: &str) -> MdbResult<String> {
        let reply = self.run_ok(doc! {"help" => 1.0_f64, command_name => 1.0_f64})?;
        reply
            .get_str("help")
            .map(ToOwned::to_owned)
            .ok_or_else(|| MdbError::protocol("help reply is missing its help field"))
    }

    pub fn get_log_components(&mut self) -> MdbResult<Document> {
        let reply = self.run_ok(doc! {
            "getParameter" => 1.0_f64,
            "logComponentVerbosity" => 1.0_f64,
        })?;
        reply
            .get("logComponentVerbosity")
            .and_then(Value::as_document)
            .cloned()
            .ok_or_else(|| MdbError::protocol("getParameter reply is missing logComponentVerbosity"))
    }
}
