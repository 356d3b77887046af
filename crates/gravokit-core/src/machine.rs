//! Machine data model
//!
//! Typed views over the small set of values the marking machine reports or
//! accepts: the `ST` status triple, the `LD` execution mode, and the terminal
//! states of a marking cycle.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution mode for a loaded marking file (`LD` command)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Real marking
    Normal,
    /// Dry run, no laser emission
    Simulation,
    /// Machine runs the file on its own inputs
    Autonomous,
}

impl LoadMode {
    /// Wire value sent after the marking count
    pub fn wire_value(&self) -> &'static str {
        match self {
            Self::Normal => "N",
            Self::Simulation => "S",
            Self::Autonomous => "A",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

impl FromStr for LoadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NORMAL" => Ok(Self::Normal),
            "S" | "SIMULATION" => Ok(Self::Simulation),
            "A" | "AUTONOMOUS" | "AUTONOME" => Ok(Self::Autonomous),
            other => Err(Error::invalid_parameter(format!(
                "unknown load mode '{}', expected N, S or A",
                other
            ))),
        }
    }
}

/// Terminal state of a marking cycle started with `GO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkingOutcome {
    /// `GO P`: waiting for an interlock or the operator
    Paused,
    /// `GO S`: stopped because a fault occurred
    Stopped,
    /// `GO F`: finished successfully
    Finished,
}

impl MarkingOutcome {
    /// Match a reply line against the terminal markers
    pub fn from_line(line: &str) -> Option<Self> {
        match line.trim() {
            "GO P" => Some(Self::Paused),
            "GO S" => Some(Self::Stopped),
            "GO F" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Wire form of the terminal line
    pub fn as_line(&self) -> &'static str {
        match self {
            Self::Paused => "GO P",
            Self::Stopped => "GO S",
            Self::Finished => "GO F",
        }
    }
}

impl fmt::Display for MarkingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_line())
    }
}

/// Machine state reported as the first field of `ST`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineState {
    Init,
    Alive,
    Ready,
    Marking,
    Pause,
    Fault,
}

impl MachineState {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Init),
            2 => Some(Self::Alive),
            4 => Some(Self::Ready),
            8 => Some(Self::Marking),
            16 => Some(Self::Pause),
            32 => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Safety chain state reported as the second field of `ST`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RearmState {
    Ok,
    EmergencyStop,
    Interlock,
    ShutterError,
}

impl RearmState {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::EmergencyStop),
            2 => Some(Self::Interlock),
            3 => Some(Self::ShutterError),
            _ => None,
        }
    }
}

/// Marking mode reported as the third field of `ST`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkMode {
    Normal,
    Autonomous,
    Simulation,
}

impl MarkMode {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Autonomous),
            2 => Some(Self::Simulation),
            _ => None,
        }
    }
}

/// Parsed `ST <state> <rearm> <markmode>` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub state: MachineState,
    pub rearm: RearmState,
    pub mark_mode: MarkMode,
}

impl MachineStatus {
    /// Parse a status reply line
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 || fields[0] != "ST" {
            return Err(Error::protocol(format!(
                "expected 'ST <state> <rearm> <markmode>', got '{}'",
                line
            )));
        }

        let code = |index: usize| -> Result<u32> {
            fields[index].parse::<u32>().map_err(|_| {
                Error::protocol(format!("non-numeric status field in '{}'", line))
            })
        };
        let unknown = |what: &str| Error::protocol(format!("unknown {} in '{}'", what, line));

        Ok(Self {
            state: MachineState::from_code(code(1)?).ok_or_else(|| unknown("machine state"))?,
            rearm: RearmState::from_code(code(2)?).ok_or_else(|| unknown("rearm state"))?,
            mark_mode: MarkMode::from_code(code(3)?).ok_or_else(|| unknown("mark mode"))?,
        })
    }

    /// Whether a `GO` would be accepted right now
    pub fn is_ready(&self) -> bool {
        self.state == MachineState::Ready && self.rearm == RearmState::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_mode_wire_values() {
        assert_eq!(LoadMode::Normal.to_string(), "N");
        assert_eq!(LoadMode::Simulation.wire_value(), "S");
        assert_eq!(LoadMode::Autonomous.wire_value(), "A");
        assert_eq!("s".parse::<LoadMode>().unwrap(), LoadMode::Simulation);
        assert_eq!("normal".parse::<LoadMode>().unwrap(), LoadMode::Normal);
        assert!("X".parse::<LoadMode>().is_err());
    }

    #[test]
    fn test_marking_outcome_from_line() {
        assert_eq!(MarkingOutcome::from_line("GO F"), Some(MarkingOutcome::Finished));
        assert_eq!(MarkingOutcome::from_line("GO S"), Some(MarkingOutcome::Stopped));
        assert_eq!(MarkingOutcome::from_line("GO P"), Some(MarkingOutcome::Paused));
        assert_eq!(MarkingOutcome::from_line("GO M"), None);
        assert_eq!(MarkingOutcome::from_line("GO 42%"), None);
    }

    #[test]
    fn test_parse_ready_status() {
        let status = MachineStatus::parse("ST 4 0 0").unwrap();
        assert_eq!(status.state, MachineState::Ready);
        assert_eq!(status.rearm, RearmState::Ok);
        assert_eq!(status.mark_mode, MarkMode::Normal);
        assert!(status.is_ready());
    }

    #[test]
    fn test_parse_fault_status() {
        let status = MachineStatus::parse("ST 32 2 2").unwrap();
        assert_eq!(status.state, MachineState::Fault);
        assert_eq!(status.rearm, RearmState::Interlock);
        assert_eq!(status.mark_mode, MarkMode::Simulation);
        assert!(!status.is_ready());
    }

    #[test]
    fn test_parse_malformed_status() {
        assert!(MachineStatus::parse("ST 4 0").is_err());
        assert!(MachineStatus::parse("XX 4 0 0").is_err());
        assert!(MachineStatus::parse("ST 5 0 0").is_err());
        assert!(MachineStatus::parse("ST a 0 0").unwrap_err().is_protocol_error());
    }

    #[test]
    fn test_status_serializes() {
        let status = MachineStatus::parse("ST 8 0 1").unwrap();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"Marking\""));
        assert!(json.contains("\"Autonomous\""));
    }
}
