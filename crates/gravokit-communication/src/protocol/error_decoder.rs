//! Gravotech Error Code Decoder
//! Converts `ER <type> <detail>` reply lines to human-readable messages

use gravokit_core::{Error, ErrorCategory, MachineFault, Result};

/// Prefix of every machine error line
pub const ERROR_PREFIX: &str = "ER";

/// Whether a reply line is a machine error line
pub fn is_error_line(line: &str) -> bool {
    line.starts_with(ERROR_PREFIX)
}

/// Describe a detail code within its category
pub fn describe(category: ErrorCategory, detail: &str) -> Option<&'static str> {
    let description = match (category, detail) {
        (ErrorCategory::Syntax, "1") => "Unknown command",
        (ErrorCategory::Syntax, "2") => "Not enough parameters",
        (ErrorCategory::Syntax, "3") => "Too many parameters",
        (ErrorCategory::Syntax, "4") => "Wrong parameter",
        (ErrorCategory::Syntax, "5") => "Cannot open file",
        (ErrorCategory::Syntax, "6") => "Unknown parameter",
        (ErrorCategory::Syntax, "7") => "Wrong parameter value",
        (ErrorCategory::Syntax, "8") => "File size limit exceeded",
        (ErrorCategory::Syntax, "9") => "Parameter is not a string",

        (ErrorCategory::Context, "1") => "Initialization",
        (ErrorCategory::Context, "2") => "CCU OK (Alive)",
        (ErrorCategory::Context, "4") => "Ready to mark",
        (ErrorCategory::Context, "8") => "Marking in progress",
        (ErrorCategory::Context, "16") => "Pause",
        (ErrorCategory::Context, "32") => "Fault",
        (ErrorCategory::Context, "state") => "graveuse not in correct state",

        (ErrorCategory::Processing, "1") => "Overloaded",
        (ErrorCategory::Processing, "2") => "Internal error TX",
        (ErrorCategory::Processing, "3") => "Internal error RX",
        (ErrorCategory::Processing, "4") => "Memory full",
        (ErrorCategory::Processing, "5") => "No fault to acknowledge",
        (ErrorCategory::Processing, "6") => "Can't acknowledge fault / Origin required",
        (ErrorCategory::Processing, "7") => "Stop marking is open",
        (ErrorCategory::Processing, "8") => "Start marking closed at power on / Out of range",
        (ErrorCategory::Processing, "9") => "AD failed",

        (ErrorCategory::Authorization, "1") => "Command reserved to the master",

        _ => return None,
    };
    Some(description)
}

/// Parse a reply line into a machine fault
///
/// Returns `Ok(None)` for lines without the error prefix. An error line that
/// does not have exactly three fields, or whose codes are not in the tables,
/// is a [`Error::Validation`].
pub fn parse(line: &str) -> Result<Option<MachineFault>> {
    if !is_error_line(line) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(Error::validation(format!("malformed error line: {:?}", line)));
    }

    let category = ErrorCategory::from_code(fields[1])
        .ok_or_else(|| Error::validation(format!("unknown error type: {:?}", line)))?;
    let description = describe(category, fields[2])
        .ok_or_else(|| Error::validation(format!("unknown error detail: {:?}", line)))?;

    Ok(Some(MachineFault::new(category, fields[2], description)))
}

/// Decode an error line to text, passing any other line through unchanged
///
/// Decoded form: `<Category>: <Detail> (code: <type>.<detail>)`.
pub fn decode(line: &str) -> Result<String> {
    Ok(match parse(line)? {
        Some(fault) => fault.to_string(),
        None => line.to_string(),
    })
}

/// Turn a raw reply into a result: error lines become [`Error::Machine`]
pub fn check_reply(reply: String) -> Result<String> {
    match parse(&reply)? {
        Some(fault) => {
            tracing::debug!(code = %fault.code(), reply = %reply, "Machine refused command");
            Err(fault.into())
        }
        None => Ok(reply),
    }
}
