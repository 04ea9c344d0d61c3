use super::authentication;
use super::params::ConnectParams;
use super::tcp_client::TcpClient;
use crate::bson::{Document, ObjectIdGenerator};
use crate::command::select_command_name;
use crate::error::MdbResult;
use crate::wire;

/// A single blocking connection to a MongoDB server.
///
/// Talks `OP_COMMAND`/`OP_COMMANDREPLY` only; there is no pooling and
/// no reconnection. One `Connection` serves one request at a time.
pub struct Connection {
    client: TcpClient,
    default_database: String,
    next_request_id: i32,
    object_ids: Option<ObjectIdGenerator>,
}

impl Connection {
    /// Opens the TCP (or TLS) socket and, if credentials were given,
    /// runs the SCRAM-SHA-1 handshake against the `admin` database.
    pub fn connect(params: &ConnectParams) -> MdbResult<Self> {
        let client = TcpClient::try_new(params)?;
        let mut conn = Self {
            client,
            default_database: params.database().to_owned(),
            next_request_id: 0,
            object_ids: None,
        };

        if let Some(user) = params.user() {
            debug!("Connection: authenticating user {user}");
            let password = params.password().clone();
            authenticate_connection(&mut conn, user, &password)?;
        }

        Ok(conn)
    }

    /// Dispatches `args` by picking its single known command name and
    /// sending it against `database` (the connection's default
    /// database if `None`).
    pub fn run_command(&mut self, database: Option<&str>, args: &Document) -> MdbResult<Document> {
        let command_name = select_command_name(args)?;
        let database = database.unwrap_or(&self.default_database).to_owned();
        self.raw_command(&database, &command_name, args)
    }

    /// Sends `args` under the given, already-known `command_name`,
    /// bypassing name selection. Used where the caller already knows
    /// which key names the command (for example the SCRAM handshake's
    /// `saslStart`/`saslContinue`, which are ambiguous with no other
    /// keys present).
    pub(crate) fn raw_command(
        &mut self,
        database: &str,
        command_name: &str,
        args: &Document,
    ) -> MdbResult<Document> {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let message = wire::pack_op_command(request_id, database, command_name, args)?;
        trace!("Connection: sending {command_name} ({} bytes)", message.len());
        wire::write_message(&mut self.client, &message)?;

        let (header, body) = wire::read_message(&mut self.client)?;
        wire::parse_op_commandreply(&header, &body)
    }

    /// Generates a fresh [`ObjectId`](crate::bson::ObjectId), lazily
    /// seeding the generator with this server's machine identity (via
    /// `whatsmyuri`) the first time it is called.
    pub fn gen_object_id(&mut self) -> MdbResult<crate::bson::ObjectId> {
        if self.object_ids.is_none() {
            let reply = self.run_command(Some("admin"), &crate::doc! {"whatsmyuri" => 1.0_f64})?;
            let you = reply
                .get_str("you")
                .ok_or_else(|| crate::error::MdbError::protocol("whatsmyuri reply is missing you"))?;
            let machine_id = ObjectIdGenerator::machine_id_from_whatsmyuri(you);
            self.object_ids = Some(ObjectIdGenerator::new(machine_id));
        }
        Ok(self.object_ids.as_mut().unwrap().generate())
    }

    #[must_use]
    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Returns a [`crate::Database`] handle bound to this connection's
    /// default database (the one passed to [`crate::connect`] /
    /// [`ConnectParams`]).
    pub fn database(&mut self) -> crate::Database<'_> {
        let name = self.default_database.clone();
        self.database_named(name)
    }

    /// Returns a [`crate::Database`] handle bound to an explicit
    /// database name, independent of the connection's default.
    pub fn database_named(&mut self, name: impl Into<String>) -> crate::Database<'_> {
        crate::Database::new(self, name)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("default_database", &self.default_database)
            .field("next_request_id", &self.next_request_id)
            .finish_non_exhaustive()
    }
}

fn authenticate_connection(conn: &mut Connection, user: &str, password: &secstr::SecUtf8) -> MdbResult<()> {
    authentication::authenticate(user, password, |args| {
        conn.raw_command("admin", &select_command_name(args)?, args)
    })
}
