//! Gravotech wire protocol
//!
//! - [`commands`]: exact wire strings for every machine operation
//! - [`error_decoder`]: `ER <type> <detail>` decoding
//! - [`marking`]: the multi-read start-marking sequence

pub mod commands;
pub mod error_decoder;
pub mod marking;

pub use commands::{is_list_command, Command, LIST_KEYWORD};
pub use error_decoder::{check_reply, decode, ERROR_PREFIX};
pub use marking::{MarkingSequence, MarkingState, ACK_MARKER};
