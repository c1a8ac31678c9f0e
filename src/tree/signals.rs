//! Widget signals: hook commands fired on interaction events.
//!
//! ```yaml
//! signals:
//!   selected: enable-feature --now
//!   deselected: disable-feature
//! ```
//!
//! The hook name is resolved relative to the directory of the command the
//! argument belongs to.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ConfigError;

/// A parsed hook: executable name plus its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalAction {
    name: String,
    args: Vec<String>,
}

impl SignalAction {
    /// Parses a raw hook string. An empty string is a no-op action.
    pub fn parse(action: &str) -> Result<Self, ConfigError> {
        if action.is_empty() {
            return Ok(Self::default());
        }

        let mut tokens = action.split(' ').map(str::trim).filter(|t| !t.is_empty());
        let name = tokens
            .next()
            .ok_or_else(|| ConfigError::declaration("could not parse signal action"))?;

        Ok(Self {
            name: name.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Name of the hook executable. Empty for an undefined action.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments passed to the hook.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns `true` if nothing should be executed.
    pub fn is_noop(&self) -> bool {
        self.name.is_empty()
    }
}

/// All signals declared for one argument, keyed by event name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    sigs: HashMap<String, SignalAction>,
}

static NOOP: SignalAction = SignalAction {
    name: String::new(),
    args: Vec::new(),
};

impl Signals {
    /// Parses the `signals` mapping of an argument declaration.
    pub fn from_value(value: Option<&Value>) -> Result<Self, ConfigError> {
        let mut signals = Self::default();
        let Some(value) = value else {
            return Ok(signals);
        };

        let Value::Object(map) = value else {
            return Err(ConfigError::declaration(format!(
                "signals should be a mapping of event to command, got: {value}"
            )));
        };

        for (event, action) in map {
            let raw = match action {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            signals.set(event, SignalAction::parse(&raw)?);
        }
        Ok(signals)
    }

    /// Sets an action for an event. An already defined event keeps its first action.
    pub fn set(&mut self, event: &str, action: SignalAction) -> &mut Self {
        self.sigs.entry(event.to_string()).or_insert(action);
        self
    }

    /// Action for an event, or a no-op action when undefined.
    pub fn get(&self, event: &str) -> &SignalAction {
        self.sigs.get(event).unwrap_or(&NOOP)
    }

    /// Names of all defined events.
    pub fn events(&self) -> Vec<&str> {
        self.sigs.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_action_splits_name_and_args() {
        let act = SignalAction::parse("  enable-feature   --now  -q").unwrap();
        assert_eq!(act.name(), "enable-feature");
        assert_eq!(act.args(), ["--now", "-q"]);
        assert!(!act.is_noop());
    }

    #[test]
    fn test_empty_action_is_noop() {
        assert!(SignalAction::parse("").unwrap().is_noop());
    }

    #[test]
    fn test_blank_action_is_error() {
        assert!(SignalAction::parse("   ").is_err());
    }

    #[test]
    fn test_first_definition_wins() {
        let mut sigs = Signals::default();
        sigs.set("selected", SignalAction::parse("first").unwrap());
        sigs.set("selected", SignalAction::parse("second").unwrap());
        assert_eq!(sigs.get("selected").name(), "first");
    }

    #[test]
    fn test_undefined_event_is_noop() {
        let sigs = Signals::from_value(Some(&json!({"selected": "on.sh 1"}))).unwrap();
        assert_eq!(sigs.get("selected").args(), ["1"]);
        assert!(sigs.get("deselected").is_noop());
        assert_eq!(sigs.events(), vec!["selected"]);
    }

    #[test]
    fn test_non_mapping_is_error() {
        assert!(Signals::from_value(Some(&json!(["a"]))).is_err());
    }
}
