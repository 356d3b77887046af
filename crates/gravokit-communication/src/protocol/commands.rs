//! Gravotech command builders
//!
//! Every operation of the machine maps to one exact wire string. Builders
//! validate their arguments so nothing malformed reaches the socket.

use gravokit_core::{Error, LoadMode, Result};
use std::fmt;

/// Keyword of the only list-class command
pub const LIST_KEYWORD: &str = "LS";

/// Whether `command` expects a count-prefixed list reply
pub fn is_list_command(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case(LIST_KEYWORD))
}

/// A CR-terminated ASCII command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Build a command from raw text, appending CR if missing
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let mut text = text.into();
        if text.ends_with('\r') {
            text.pop();
        }
        if text.trim().is_empty() {
            return Err(Error::invalid_parameter("empty command"));
        }
        if !text.is_ascii() {
            return Err(Error::invalid_parameter(format!(
                "command is not ASCII: {:?}",
                text
            )));
        }
        if text.contains(['\r', '\n']) {
            return Err(Error::invalid_parameter(
                "command must be a single line".to_string(),
            ));
        }
        text.push('\r');
        Ok(Self(text))
    }

    fn fixed(text: &str) -> Self {
        Self(format!("{}\r", text))
    }

    /// Wire text including the trailing CR
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading command keyword, e.g. `LD`
    pub fn keyword(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or_default()
    }

    pub fn is_list(&self) -> bool {
        is_list_command(&self.0)
    }

    /// `AD`: acknowledge and clear the current fault
    pub fn acknowledge_fault() -> Self {
        Self::fixed("AD")
    }

    /// `AM`: stop the marking in progress
    pub fn stop_marking() -> Self {
        Self::fixed("AM")
    }

    /// `GO`: start marking the loaded file
    pub fn start_marking() -> Self {
        Self::fixed("GO")
    }

    /// `GP "MASTER"`: query whether this session is master
    pub fn query_role() -> Self {
        Self::fixed("GP \"MASTER\"")
    }

    /// `LD "<name>" <count> <mode>`: load a marking file
    ///
    /// A count of 0 marks indefinitely.
    pub fn load_file(name: &str, count: u32, mode: LoadMode) -> Result<Self> {
        validate_quoted("file name", name)?;
        Self::new(format!("LD \"{}\" {} {}", name, count, mode.wire_value()))
    }

    /// `LS` or `LS <mask>`: list stored files
    pub fn list_files(mask: Option<&str>) -> Result<Self> {
        Self::with_mask(LIST_KEYWORD, mask)
    }

    /// `PF "<name>" <hex-data>`: upload a file
    ///
    /// `data` is the raw file content; it is hex-encoded here.
    pub fn push_file(name: &str, data: &[u8]) -> Result<Self> {
        validate_quoted("file name", name)?;
        if data.is_empty() {
            return Err(Error::invalid_parameter("file content is empty"));
        }
        Self::new(format!("PF \"{}\" {}", name, hex::encode_upper(data)))
    }

    /// `RM` or `RM <mask>`: delete stored files
    pub fn remove_files(mask: Option<&str>) -> Result<Self> {
        Self::with_mask("RM", mask)
    }

    /// `SP "MASTER":"<0|1>"`: request or release master control
    pub fn set_role(master: bool) -> Self {
        Self(format!("SP \"MASTER\":\"{}\"\r", u8::from(master)))
    }

    /// `ST`: query the machine status
    pub fn status() -> Self {
        Self::fixed("ST")
    }

    /// `VG <index>`: read a variable
    pub fn get_variable(index: u8) -> Self {
        Self(format!("VG {}\r", index))
    }

    /// `VS <index> "<text>"`: assign a variable
    pub fn set_variable(index: u8, text: &str) -> Result<Self> {
        validate_quoted("variable text", text)?;
        Self::new(format!("VS {} \"{}\"", index, text))
    }

    fn with_mask(keyword: &str, mask: Option<&str>) -> Result<Self> {
        match mask.map(str::trim).filter(|m| !m.is_empty()) {
            Some(mask) => {
                if mask.contains(char::is_whitespace) || mask.contains('"') {
                    return Err(Error::invalid_parameter(format!(
                        "file mask must be a single token: {:?}",
                        mask
                    )));
                }
                Self::new(format!("{} {}", keyword, mask))
            }
            None => Ok(Self::fixed(keyword)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end_matches('\r'))
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_quoted(what: &str, value: &str) -> Result<()> {
    if value.contains(['"', '\r', '\n']) {
        return Err(Error::invalid_parameter(format!(
            "{} must not contain quotes or line breaks: {:?}",
            what, value
        )));
    }
    Ok(())
}
