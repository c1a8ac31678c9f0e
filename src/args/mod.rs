//! Per-form argument state and its command-line serialization.
//!
//! Every active form owns one [`ArgumentState`]: an ordered set of flags and
//! an ordered set of named arguments. [`ArgumentState::serialize`] turns it
//! into the argv passed to the module command:
//!
//! 1. flags, in insertion order
//! 2. named arguments, in first-insertion order
//!
//! A named argument with an empty value serializes as its bare name (toggle
//! widgets encode their state by presence); a non-empty value serializes as
//! `name=value`. `view-only` arguments never serialize and `skip-empty`
//! arguments disappear when empty.

mod form;

use std::collections::HashMap;

pub use form::{FieldSignal, FormState};

use crate::tree::{Argument, Attributes, Command, OptionValue, WidgetType};

/// Attribute excluding an argument from the command line.
pub const ATTR_VIEW_ONLY: &str = "view-only";

/// Attribute dropping an argument whose value is empty.
pub const ATTR_SKIP_EMPTY: &str = "skip-empty";

/// Flags and named arguments of one form.
#[derive(Debug, Clone, Default)]
pub struct ArgumentState {
    form_id: String,
    flags: Vec<String>,
    arg_index: Vec<String>,
    arg_values: HashMap<String, String>,
    arg_attrs: HashMap<String, Attributes>,
}

impl ArgumentState {
    /// Creates an empty state for the given form.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            ..Self::default()
        }
    }

    /// Creates a state seeded with the command's static flags and the
    /// defaults of its arguments.
    pub fn for_command(form_id: impl Into<String>, command: &Command) -> Self {
        let mut state = Self::new(form_id);
        for flag in command.static_flags() {
            state.add_flag(flag);
        }
        for arg in command.arguments() {
            state.declare(arg.name(), arg.attrs().clone());
            if let Some(value) = default_value(arg) {
                state.add_argument(arg.name(), &value);
            }
        }
        log::debug!(
            "[Args] Form \"{}\" seeded: {:?}",
            state.form_id,
            state.serialize()
        );
        state
    }

    /// Form this state belongs to.
    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    /// Records the attributes of a named argument without adding it.
    pub fn declare(&mut self, name: &str, attrs: Attributes) {
        self.arg_attrs.insert(name.to_string(), attrs);
    }

    /// Sets a named argument. A known name keeps its position.
    pub fn add_argument(&mut self, name: &str, value: &str) {
        if self
            .arg_values
            .insert(name.to_string(), value.to_string())
            .is_none()
        {
            self.arg_index.push(name.to_string());
        }
    }

    /// Removes a named argument.
    pub fn remove_argument(&mut self, name: &str) {
        if self.arg_values.remove(name).is_some() {
            self.arg_index.retain(|n| n != name);
        }
    }

    /// Adds a flag. Empty and duplicate flags are ignored.
    pub fn add_flag(&mut self, flag: &str) {
        if flag.is_empty() || self.flags.iter().any(|f| f == flag) {
            return;
        }
        self.flags.push(flag.to_string());
    }

    /// Removes a flag.
    pub fn remove_flag(&mut self, flag: &str) {
        self.flags.retain(|f| f != flag);
    }

    /// Current value of a named argument.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.arg_values.get(name).map(String::as_str)
    }

    /// Flags in insertion order.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Argument names in first-insertion order.
    pub fn names(&self) -> &[String] {
        &self.arg_index
    }

    /// Builds the argv for the module command.
    pub fn serialize(&self) -> Vec<String> {
        let mut out = self.flags.clone();
        for name in &self.arg_index {
            let attrs = self.arg_attrs.get(name);
            let has = |opt| attrs.is_some_and(|a| a.has_option(opt));
            if has(ATTR_VIEW_ONLY) {
                continue;
            }

            let value = self.arg_values.get(name).map_or("", String::as_str);
            if value.is_empty() {
                if !has(ATTR_SKIP_EMPTY) {
                    out.push(name.clone());
                }
            } else {
                out.push(format!("{name}={value}"));
            }
        }
        out
    }
}

/// Initial value of an argument in a fresh form, `None` if it starts unset.
fn default_value(arg: &Argument) -> Option<String> {
    let first = arg.options().first();
    match arg.widget() {
        WidgetType::Text | WidgetType::Password => first
            .map(|o| o.value_as_string())
            .filter(|v| !v.is_empty()),
        WidgetType::Toggle => first
            .filter(|o| o.as_bool() == Some(true))
            .map(|o| o.label().to_string()),
        WidgetType::Dropdown => arg
            .options()
            .iter()
            .map(|o| o.value_as_string())
            .find(|v| !v.is_empty()),
        WidgetType::Tabular => {
            let column = arg.value_column();
            arg.options().iter().find_map(|o| match o.value() {
                OptionValue::Row(r) => r.labels.get(column).cloned(),
                _ => None,
            })
        }
        WidgetType::Silent => Some(first.map(|o| o.value_as_string()).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with_path(attrs: &[&str]) -> ArgumentState {
        let mut state = ArgumentState::new("form");
        state.add_flag("-x");
        state.add_flag("-y");
        state.declare("--path", Attributes::from_strs(attrs.iter().copied()));
        state.add_argument("--path", "");
        state
    }

    #[test]
    fn test_skip_empty_omits_argument() {
        assert_eq!(state_with_path(&["skip-empty"]).serialize(), vec!["-x", "-y"]);
    }

    #[test]
    fn test_empty_value_is_bare_name() {
        assert_eq!(state_with_path(&[]).serialize(), vec!["-x", "-y", "--path"]);
    }

    #[test]
    fn test_value_form_and_view_only() {
        let mut state = state_with_path(&["skip-empty"]);
        state.add_argument("--path", "/etc");
        state.declare("--note", Attributes::from_strs(["view-only"]));
        state.add_argument("--note", "hello");
        assert_eq!(state.serialize(), vec!["-x", "-y", "--path=/etc"]);
    }

    #[test]
    fn test_update_keeps_first_insertion_order() {
        let mut state = ArgumentState::new("f");
        state.add_argument("--a", "1");
        state.add_argument("--b", "2");
        state.add_argument("--a", "3");
        assert_eq!(state.serialize(), vec!["--a=3", "--b=2"]);

        state.remove_argument("--a");
        state.add_argument("--a", "4");
        assert_eq!(state.serialize(), vec!["--b=2", "--a=4"]);
        assert_eq!(state.names(), ["--b", "--a"]);
    }

    #[test]
    fn test_names_never_duplicate() {
        let mut state = ArgumentState::new("f");
        let ops = ["--a", "--b", "--a", "--c", "--b", "--a"];
        for (i, name) in ops.iter().enumerate() {
            if i % 3 == 2 {
                state.remove_argument(name);
            } else {
                state.add_argument(name, "v");
            }
        }
        let out = state.serialize();
        let mut dedup = out.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(out.len(), dedup.len());
        assert_eq!(state.names().len(), state.arg_values.len());
    }

    #[test]
    fn test_flags_dedup_and_ignore_empty() {
        let mut state = ArgumentState::new("f");
        state.add_flag("-v");
        state.add_flag("");
        state.add_flag("-v");
        state.add_flag("-q");
        state.remove_flag("-v");
        assert_eq!(state.flags(), ["-q"]);
    }

    #[test]
    fn test_for_command_seeds_defaults() {
        let raw = json!({
            "path": "run.sh",
            "title": "Run",
            "flags": ["--yes"],
            "args": [
                {"type": "text", "label": "Target", "name": "--target", "options": ["/mnt"]},
                {"type": "text", "label": "Empty", "name": "--empty", "options": [""]},
                {"type": "toggle", "label": "Force", "name": "--force", "options": [["", "bool", "true"]]},
                {"type": "toggle", "label": "Off", "name": "--off", "options": [["", "bool", "false"]]},
                {"type": "dropdown", "label": "FS", "name": "--fs", "options": ["", "ext4", "xfs"]},
                {"type": "silent", "name": "--batch"},
            ],
        });
        let command = Command::from_value(&raw).unwrap();
        let state = ArgumentState::for_command("f", &command);
        assert_eq!(
            state.serialize(),
            vec!["--yes", "--target=/mnt", "--force", "--fs=ext4", "--batch"]
        );
    }

    #[test]
    fn test_tabular_default_follows_value_attribute() {
        let raw = json!({
            "path": "run.sh",
            "title": "Run",
            "args": [{
                "type": "tabular", "label": "Packages", "name": "--pkg",
                "attributes": ["value=1"],
                "options": [["Name", "Version", "value:Id"], ["vim", "9.0", "pkg-1"]],
            }],
        });
        let command = Command::from_value(&raw).unwrap();
        let state = ArgumentState::for_command("f", &command);
        assert_eq!(state.value("--pkg"), Some("9.0"));

        // A form update reads the same column.
        let mut form = FormState::new("f", &command);
        form.apply(&crate::protocol::ApiCall::decode(
            br#"field.set.by-label:json:{Packages}[["git","2.4","pkg-2"]]"#,
        ));
        assert_eq!(form.state().value("--pkg"), Some("2.4"));
    }
}
