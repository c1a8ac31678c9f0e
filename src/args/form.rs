//! Field mutations pushed by a running module.
//!
//! `field.{set,add,reset}.by-{label,ord}` calls edit the active form. The
//! call key addresses the argument, by label or by position:
//!
//! ```text
//! field.set.by-label:string:{Target}/mnt/data
//! field.add.by-ord:string:{2}xfs|btrfs
//! field.set.by-ord:json:{3}[["pkg","1.0"],["other","2.1"]]
//! field.set.by-label:bool:{Force}yes
//! ```

use std::collections::HashMap;

use serde_json::Value;

use super::ArgumentState;
use crate::protocol::{ApiCall, DataType, Route};
use crate::tree::{Argument, Command, OptionValue, SignalAction, WidgetType};

/// Signal event fired when a toggle is switched on.
pub const EVENT_SELECTED: &str = "selected";

/// Signal event fired when a toggle is switched off.
pub const EVENT_DESELECTED: &str = "deselected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOp {
    Set,
    Add,
    Reset,
}

#[derive(Debug, Clone, Copy)]
enum Address {
    Label,
    Ordinal,
}

impl FieldOp {
    fn from_route(route: Route) -> Option<(Self, Address)> {
        Some(match route {
            Route::FieldSetByLabel => (Self::Set, Address::Label),
            Route::FieldSetByOrd => (Self::Set, Address::Ordinal),
            Route::FieldAddByLabel => (Self::Add, Address::Label),
            Route::FieldAddByOrd => (Self::Add, Address::Ordinal),
            Route::FieldResetByLabel => (Self::Reset, Address::Label),
            Route::FieldResetByOrd => (Self::Reset, Address::Ordinal),
            _ => return None,
        })
    }
}

/// A signal an applied mutation asks the caller to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSignal {
    /// Name of the argument that changed.
    pub argument: String,
    /// Event name, [`EVENT_SELECTED`] or [`EVENT_DESELECTED`].
    pub event: &'static str,
    /// Hook declared for the event; a no-op when none is.
    pub action: SignalAction,
}

/// An active argument form: the command schema, its argument state and the
/// dynamic choices of list-like widgets.
#[derive(Debug, Clone)]
pub struct FormState {
    command: Command,
    state: ArgumentState,
    choices: HashMap<String, Vec<String>>,
    rows: HashMap<String, Vec<Vec<String>>>,
}

impl FormState {
    /// Opens a form for a command, seeded with its defaults.
    pub fn new(form_id: impl Into<String>, command: &Command) -> Self {
        let mut choices = HashMap::new();
        let mut rows = HashMap::new();
        for arg in command.arguments() {
            match arg.widget() {
                WidgetType::Dropdown => {
                    let opts = arg.options().iter().map(|o| o.value_as_string()).collect();
                    choices.insert(arg.name().to_string(), opts);
                }
                WidgetType::Tabular => {
                    let table = arg
                        .options()
                        .iter()
                        .filter_map(|o| match o.value() {
                            OptionValue::Row(r) => Some(r.labels.clone()),
                            _ => None,
                        })
                        .collect();
                    rows.insert(arg.name().to_string(), table);
                }
                _ => {}
            }
        }

        Self {
            state: ArgumentState::for_command(form_id, command),
            command: command.clone(),
            choices,
            rows,
        }
    }

    /// Command behind the form.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Current argument state.
    pub fn state(&self) -> &ArgumentState {
        &self.state
    }

    /// Mutable argument state, for user edits.
    pub fn state_mut(&mut self) -> &mut ArgumentState {
        &mut self.state
    }

    /// Current choices of a dropdown argument.
    pub fn choices(&self, name: &str) -> &[String] {
        self.choices.get(name).map_or(&[], Vec::as_slice)
    }

    /// Current rows of a tabular argument.
    pub fn rows(&self, name: &str) -> &[Vec<String>] {
        self.rows.get(name).map_or(&[], Vec::as_slice)
    }

    /// Applies a `field.*` call. Other calls, unknown fields and payloads of
    /// the wrong type are ignored.
    pub fn apply(&mut self, call: &ApiCall) -> Option<FieldSignal> {
        let (op, address) = call.route().and_then(FieldOp::from_route)?;

        let arg = match address {
            Address::Label => call
                .key()
                .and_then(|label| self.command.argument_by_label(label)),
            Address::Ordinal => usize::try_from(call.key_as_int())
                .ok()
                .and_then(|idx| self.command.arguments().get(idx)),
        };
        let Some(arg) = arg.cloned() else {
            log::debug!(
                "[Form] {} addresses no field (key {:?})",
                call.class(),
                call.key()
            );
            return None;
        };

        match arg.widget() {
            WidgetType::Text | WidgetType::Password | WidgetType::Silent => {
                self.apply_text(&arg, op, call.raw());
                None
            }
            WidgetType::Toggle => self.apply_toggle(&arg, op, call),
            WidgetType::Dropdown => {
                self.apply_choices(&arg, op, call.as_str());
                None
            }
            WidgetType::Tabular => {
                self.apply_table(&arg, op, call);
                None
            }
        }
    }

    fn apply_text(&mut self, arg: &Argument, op: FieldOp, value: &str) {
        let name = arg.name();
        let text = match op {
            FieldOp::Set => value.to_string(),
            FieldOp::Add => format!("{}{value}", self.state.value(name).unwrap_or_default()),
            FieldOp::Reset => String::new(),
        };
        self.state.add_argument(name, &text);
    }

    fn apply_toggle(&mut self, arg: &Argument, op: FieldOp, call: &ApiCall) -> Option<FieldSignal> {
        let name = arg.name();
        if op == FieldOp::Reset {
            self.state.remove_argument(name);
            return None;
        }

        let event = if call.as_bool() {
            let label = arg.options().first().map_or("", |o| o.label());
            self.state.add_argument(name, label);
            EVENT_SELECTED
        } else {
            self.state.remove_argument(name);
            EVENT_DESELECTED
        };

        Some(FieldSignal {
            argument: name.to_string(),
            event,
            action: arg.signals().get(event).clone(),
        })
    }

    fn apply_choices(&mut self, arg: &Argument, op: FieldOp, payload: &str) {
        let name = arg.name();
        let incoming: Vec<String> = payload
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let slot = self.choices.entry(name.to_string()).or_default();
        match op {
            FieldOp::Set => {
                let Some(first) = incoming.first().cloned() else {
                    return;
                };
                *slot = incoming;
                self.state.add_argument(name, &first);
            }
            FieldOp::Add => slot.extend(incoming),
            FieldOp::Reset => {
                slot.clear();
                self.state.remove_argument(name);
            }
        }
    }

    fn apply_table(&mut self, arg: &Argument, op: FieldOp, call: &ApiCall) {
        let name = arg.name();
        if op == FieldOp::Reset {
            self.rows.entry(name.to_string()).or_default().clear();
            self.state.remove_argument(name);
            return;
        }

        if call.data_type() != DataType::Json {
            log::warn!(
                "[Form] Tabular field \"{}\" requires a JSON two-dimensional array, got {}",
                arg.label(),
                call.data_type()
            );
            return;
        }
        let Some(incoming) = call.as_json().and_then(table_rows) else {
            log::warn!(
                "[Form] Unable to parse tabular data for \"{}\": {}",
                arg.label(),
                call.raw()
            );
            return;
        };

        let slot = self.rows.entry(name.to_string()).or_default();
        if op == FieldOp::Set {
            slot.clear();
        }
        slot.extend(incoming);

        let column = arg.value_column();
        if let Some(value) = slot.first().and_then(|row| row.get(column)).cloned() {
            self.state.add_argument(name, &value);
        }
    }
}

/// Reads a two-dimensional array into string rows.
fn table_rows(data: &Value) -> Option<Vec<Vec<String>>> {
    data.as_array()?
        .iter()
        .map(|row| {
            row.as_array().map(|cells| {
                cells
                    .iter()
                    .map(|c| match c {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> FormState {
        let raw = json!({
            "path": "/opt/m/run.sh",
            "title": "Install",
            "args": [
                {"type": "text", "label": "Target", "name": "--target", "options": ["/mnt"]},
                {"type": "toggle", "label": "Force", "name": "--force",
                 "options": [["", "bool", "false"]],
                 "signals": {"selected": "on.sh now", "deselected": "off.sh"}},
                {"type": "dropdown", "label": "FS", "name": "--fs", "options": ["ext4"]},
                {"type": "tabular", "label": "Package", "name": "--pkg",
                 "attributes": ["dynamic"], "options": [["Name", "value:Version"]]},
            ],
        });
        FormState::new("install", &Command::from_value(&raw).unwrap())
    }

    fn call(raw: &str) -> ApiCall {
        ApiCall::decode(raw.as_bytes())
    }

    #[test]
    fn test_text_set_add_reset() {
        let mut f = form();
        f.apply(&call("field.set.by-label::{Target}/data"));
        assert_eq!(f.state().value("--target"), Some("/data"));
        f.apply(&call("field.add.by-ord::{0}/sub"));
        assert_eq!(f.state().value("--target"), Some("/data/sub"));
        f.apply(&call("field.reset.by-label::{Target}"));
        assert_eq!(f.state().value("--target"), Some(""));
    }

    #[test]
    fn test_toggle_returns_signal() {
        let mut f = form();
        let sig = f.apply(&call("field.set.by-label:bool:{Force}yes")).unwrap();
        assert_eq!(sig.event, EVENT_SELECTED);
        assert_eq!(sig.action.name(), "on.sh");
        assert_eq!(sig.action.args(), ["now"]);
        assert!(f.state().serialize().contains(&"--force".to_string()));

        let sig = f.apply(&call("field.set.by-label:bool:{Force}no")).unwrap();
        assert_eq!(sig.event, EVENT_DESELECTED);
        assert_eq!(f.state().value("--force"), None);
    }

    #[test]
    fn test_dropdown_choices() {
        let mut f = form();
        assert_eq!(f.state().value("--fs"), Some("ext4"));
        f.apply(&call("field.set.by-ord::{2}xfs | btrfs"));
        assert_eq!(f.choices("--fs"), ["xfs", "btrfs"]);
        assert_eq!(f.state().value("--fs"), Some("xfs"));

        f.apply(&call("field.add.by-label::{FS}zfs"));
        assert_eq!(f.choices("--fs").len(), 3);

        f.apply(&call("field.reset.by-label::{FS}"));
        assert!(f.choices("--fs").is_empty());
        assert_eq!(f.state().value("--fs"), None);
    }

    #[test]
    fn test_tabular_requires_json() {
        let mut f = form();
        f.apply(&call("field.set.by-ord::{3}nope"));
        assert_eq!(f.state().value("--pkg"), None);

        f.apply(&call(r#"field.set.by-ord:json:{3}[["vim","9.1"],["git","2.4"]]"#));
        assert_eq!(f.rows("--pkg").len(), 2);
        assert_eq!(f.state().value("--pkg"), Some("9.1"));

        f.apply(&call(r#"field.add.by-label:json:{Package}[["zsh","5.9"]]"#));
        assert_eq!(f.rows("--pkg").len(), 3);

        f.apply(&call("field.reset.by-label::{Package}"));
        assert!(f.rows("--pkg").is_empty());
        assert_eq!(f.state().value("--pkg"), None);
    }

    #[test]
    fn test_unknown_field_and_foreign_class_ignored() {
        let mut f = form();
        let before = f.state().serialize();
        assert!(f.apply(&call("field.set.by-label::{Nope}x")).is_none());
        assert!(f.apply(&call("field.set.by-ord::{99}x")).is_none());
        assert!(f.apply(&call("logger.status::{Target}x")).is_none());
        assert_eq!(f.state().serialize(), before);
    }
}
