//! Wire protocol opcode constants.
//!
//! Only [`OP_COMMAND`] and [`OP_COMMANDREPLY`] are ever produced or
//! consumed by this crate; the rest are documented here because they
//! share the same message header and appear in MongoDB's own protocol
//! references.

pub const OP_REPLY: i32 = 1;
pub const OP_UPDATE: i32 = 2001;
pub const OP_INSERT: i32 = 2002;
pub const OP_QUERY: i32 = 2004;
pub const OP_GET_MORE: i32 = 2005;
pub const OP_DELETE: i32 = 2006;
pub const OP_KILL_CURSORS: i32 = 2007;
pub const OP_COMMAND: i32 = 2010;
pub const OP_COMMANDREPLY: i32 = 2011;
pub const OP_MSG: i32 = 1000;
