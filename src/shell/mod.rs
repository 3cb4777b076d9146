//! Interactive shell
//!
//! Line parsing, command dispatch, table rendering and the prompt loop.

pub mod command;
pub mod dispatcher;
pub mod render;
pub mod repl;

pub use command::{Command, CommandError, ShowTarget};
pub use dispatcher::{Dispatcher, Flow};
