//! # Instrument command input.
//!
//! Commands arrive as JSON on the `instrument-commands` topic and are
//! applied to the probe registry by
//! [`Embedder::handle_command`](crate::probes::Embedder::handle_command).
//!
//! ## Wire shape
//! ```json
//! {"action": "enable", "instrumentId": "probe-cpu"}
//! {"action": "update_config", "instrumentId": "probe-cpu", "payload": {"intervalMs": 500}}
//! ```
//!
//! Unknown actions deserialize to [`CommandAction::Unknown`] and are logged
//! and ignored rather than rejected.

use serde::{Deserialize, Deserializer};

use crate::error::EngineError;

/// Action verb of an instrument command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandAction {
    /// Enable the probe.
    Enable,
    /// Disable the probe.
    Disable,
    /// Drop the probe's cached last result so the next measurement starts
    /// fresh.
    Reload,
    /// Apply a configuration payload to the probe.
    UpdateConfig,
    /// Any unrecognized verb; logged and ignored.
    Unknown,
}

impl<'de> Deserialize<'de> for CommandAction {
    /// Unrecognized verbs map to [`CommandAction::Unknown`] rather than a
    /// deserialization error, so a malformed producer cannot poison the
    /// command stream.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let verb = String::deserialize(deserializer)?;
        Ok(match verb.as_str() {
            "enable" => CommandAction::Enable,
            "disable" => CommandAction::Disable,
            "reload" => CommandAction::Reload,
            "update_config" => CommandAction::UpdateConfig,
            _ => CommandAction::Unknown,
        })
    }
}

/// A command addressed to one registered probe.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentCommand {
    /// What to do.
    pub action: CommandAction,
    /// Target probe id.
    pub instrument_id: String,
    /// Optional action payload (used by `update_config`).
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Parses a command from its JSON bytes.
pub fn parse_command(bytes: &[u8]) -> Result<InstrumentCommand, EngineError> {
    serde_json::from_slice(bytes).map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        let cmd = parse_command(br#"{"action": "enable", "instrumentId": "p1"}"#).unwrap();
        assert_eq!(cmd.action, CommandAction::Enable);
        assert_eq!(cmd.instrument_id, "p1");
        assert!(cmd.payload.is_none());

        let cmd = parse_command(
            br#"{"action": "update_config", "instrumentId": "p1", "payload": {"n": 1}}"#,
        )
        .unwrap();
        assert_eq!(cmd.action, CommandAction::UpdateConfig);
        assert!(cmd.payload.is_some());
    }

    #[test]
    fn unknown_action_maps_to_unknown_variant() {
        let cmd = parse_command(br#"{"action": "explode", "instrumentId": "p1"}"#).unwrap();
        assert_eq!(cmd.action, CommandAction::Unknown);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_command(b"{nope").unwrap_err();
        assert_eq!(err.as_label(), "engine_parse");
    }
}
