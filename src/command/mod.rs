//! Command-name dispatch: picking the single command a parameter
//! document describes out of its keys.

mod known_commands;

pub(crate) use known_commands::select_command_name;
