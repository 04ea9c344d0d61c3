//! Message framing for the `OP_COMMAND` / `OP_COMMANDREPLY` wire
//! protocol generation (MongoDB 3.2 through 3.6).

mod framer;
pub mod opcodes;

pub(crate) use framer::{pack_op_command, parse_op_commandreply, read_message, write_message};
