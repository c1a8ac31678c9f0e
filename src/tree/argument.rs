//! Command arguments, their widget types and preset options.
//!
//! An argument declaration:
//!
//! ```yaml
//! - type: dropdown
//!   label: Architecture
//!   name: --arch
//!   options:
//!     - [x86_64]
//!     - [aarch64]
//!   attributes: [skip-empty]
//!   signals:
//!     selected: refresh-arch
//! ```

use std::fmt;

use serde_json::{Map, Value};

use super::attributes::Attributes;
use super::signals::Signals;
use crate::error::ConfigError;

/// Attribute that allows an argument to start with no options.
pub const ATTR_DYNAMIC: &str = "dynamic";

/// Widget used to edit an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetType {
    /// Free text input.
    Text,
    /// Choice from a list (`dropdown` or `list`).
    Dropdown,
    /// On/off checkbox; state is encoded by presence on the command line.
    Toggle,
    /// Multi-column table of rows.
    Tabular,
    /// Masked text input (`password` or `masked`).
    Password,
    /// Not displayed; passes its preset value through.
    Silent,
}

impl WidgetType {
    /// Parses a declared widget type.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "dropdown" | "list" => Some(Self::Dropdown),
            "toggle" => Some(Self::Toggle),
            "tabular" => Some(Self::Tabular),
            "password" | "masked" => Some(Self::Password),
            "silent" => Some(Self::Silent),
            _ => None,
        }
    }
}

/// Declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Plain string (also the fallback for unknown types).
    String,
    /// Boolean, true for `yes`/`true`.
    Bool,
    /// Integer.
    Int,
    /// Header of a tabular argument.
    TabularHeader,
    /// Row of a tabular argument.
    TabularRow,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::TabularHeader => write!(f, "tabular:header"),
            Self::TabularRow => write!(f, "tabular:row"),
        }
    }
}

/// Header of a tabular argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularHeader {
    /// Column labels with attribute prefixes stripped.
    pub labels: Vec<String>,
    /// Column whose cell is the row value, if one was marked.
    pub value_column: Option<usize>,
    /// Whether the value column is hidden from display.
    pub value_hidden: bool,
}

/// One row of a tabular argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRow {
    /// Cells as displayed.
    pub labels: Vec<String>,
    /// Cell of the value column.
    pub value: String,
    /// Whether the value column is hidden from display.
    pub value_hidden: bool,
}

/// Option value, resolved once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// String value; also holds integers that failed to parse.
    Text(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Tabular header.
    Header(TabularHeader),
    /// Tabular row.
    Row(TabularRow),
}

/// A preset option of an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgOption {
    label: String,
    kind: OptionKind,
    value: OptionValue,
}

impl ArgOption {
    /// Parses an option written as `[LABEL, TYPE, VALUE]` or as a whitespace
    /// separated scalar. Shorter forms drop leading fields:
    ///
    /// - `[]` - empty untyped option (a bare toggle)
    /// - `[VALUE]` - string value
    /// - `[TYPE, VALUE]` - typed value
    pub fn parse(raw: &Value) -> Result<Self, ConfigError> {
        let tokens: Vec<String> = match raw {
            Value::Array(items) => items.iter().map(cell_to_string).collect(),
            other => cell_to_string(other)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        };

        let (label, type_raw, value_raw) = match tokens.as_slice() {
            [] => (String::new(), String::new(), String::new()),
            [v] => (String::new(), "string".to_string(), v.clone()),
            [t, v] => (String::new(), t.clone(), v.clone()),
            [l, t, v] => (l.clone(), t.clone(), v.clone()),
            _ => {
                return Err(ConfigError::declaration(format!(
                    "unknown format to the option: {raw}"
                )))
            }
        };

        let (kind, value) = match type_raw.as_str() {
            "bool" => (
                OptionKind::Bool,
                OptionValue::Bool(value_raw == "yes" || value_raw == "true"),
            ),
            "int" => match value_raw.parse::<i64>() {
                Ok(n) => (OptionKind::Int, OptionValue::Int(n)),
                Err(_) => (OptionKind::Int, OptionValue::Text(value_raw)),
            },
            _ => (OptionKind::String, OptionValue::Text(value_raw)),
        };

        Ok(Self { label, kind, value })
    }

    /// Builds a plain string option.
    pub fn text(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: OptionKind::String,
            value: OptionValue::Text(value.to_string()),
        }
    }

    /// Label of the option.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared type of the option.
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Typed value of the option.
    pub fn value(&self) -> &OptionValue {
        &self.value
    }

    /// Boolean state, `None` unless the option is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            OptionValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Value forced to a string. Tabular rows yield their value cell.
    pub fn value_as_string(&self) -> String {
        match &self.value {
            OptionValue::Text(s) => s.clone(),
            OptionValue::Bool(b) => b.to_string(),
            OptionValue::Int(n) => n.to_string(),
            OptionValue::Header(h) => h.value_column.map_or(-1, |c| c as i64).to_string(),
            OptionValue::Row(r) => r.value.clone(),
        }
    }
}

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds header and row options out of a tabular `options` table.
///
/// The first row is the header. The first header cell containing `:` carries
/// up to two attributes before its label, e.g. `value:hidden:Package`.
fn parse_tabular(table: &[Value]) -> Result<Vec<ArgOption>, ConfigError> {
    let Some((header, rows)) = table.split_first() else {
        return Ok(Vec::new());
    };

    let Value::Array(header) = header else {
        return Err(ConfigError::declaration("wrong type of tabular header"));
    };

    let mut labels = Vec::with_capacity(header.len());
    let mut marked: Option<(usize, Vec<String>)> = None;
    for (idx, cell) in header.iter().enumerate() {
        let label = cell_to_string(cell);
        if marked.is_none() && label.contains(':') {
            let mut parts: Vec<String> = label.splitn(3, ':').map(str::to_string).collect();
            let clean = parts.pop().unwrap_or_default();
            labels.push(clean);
            marked = Some((idx, parts));
        } else {
            labels.push(label);
        }
    }

    let mut value_column = None;
    let mut value_hidden = false;
    if let Some((idx, attrs)) = marked {
        for attr in attrs {
            match attr.as_str() {
                "hidden" => value_hidden = true,
                "value" => value_column = Some(idx),
                _ => {}
            }
        }
    }

    let mut options = vec![ArgOption {
        label: String::new(),
        kind: OptionKind::TabularHeader,
        value: OptionValue::Header(TabularHeader {
            labels,
            value_column,
            value_hidden,
        }),
    }];

    let column = value_column.unwrap_or(0);
    for row in rows {
        let Value::Array(cells) = row else {
            return Err(ConfigError::declaration(
                "wrong tabular data: should be an array",
            ));
        };
        let labels: Vec<String> = cells.iter().map(cell_to_string).collect();
        let value = labels.get(column).cloned().ok_or_else(|| {
            ConfigError::declaration(format!(
                "tabular row has no value column {column}: {row}"
            ))
        })?;
        options.push(ArgOption {
            label: String::new(),
            kind: OptionKind::TabularRow,
            value: OptionValue::Row(TabularRow {
                labels,
                value,
                value_hidden,
            }),
        });
    }

    Ok(options)
}

/// An argument of a command: the CLI token, its widget and presets.
#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    widget: WidgetType,
    label: String,
    attrs: Attributes,
    options: Vec<ArgOption>,
    signals: Signals,
}

impl Argument {
    /// Parses and validates an argument declaration.
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        let Value::Object(decl) = raw else {
            return Err(ConfigError::declaration(format!(
                "argument should be a mapping, got: {raw}"
            )));
        };

        let widget_raw = str_field(decl, "type")?;
        if widget_raw.is_empty() {
            return Err(ConfigError::declaration(format!(
                "no type found for argument: {raw}"
            )));
        }
        let widget = WidgetType::parse(&widget_raw).ok_or_else(|| {
            ConfigError::declaration(format!("unknown widget definition \"{widget_raw}\""))
        })?;

        let label = str_field(decl, "label")?;
        if label.is_empty() && widget != WidgetType::Silent {
            return Err(ConfigError::declaration(format!(
                "no label found for argument: {raw}"
            )));
        }

        let name = str_field(decl, "name")?;
        let attrs = Attributes::from_value(decl.get("attributes"));
        let signals = Signals::from_value(decl.get("signals"))?;

        let raw_options: &[Value] = match decl.get("options") {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ConfigError::declaration(format!(
                    "options of argument \"{name}\" should be a list, got: {other}"
                )))
            }
        };
        let options = if widget == WidgetType::Tabular {
            parse_tabular(raw_options)?
        } else {
            raw_options
                .iter()
                .map(ArgOption::parse)
                .collect::<Result<Vec<_>, _>>()?
        };

        let needs_default = widget != WidgetType::Silent && !attrs.has_option(ATTR_DYNAMIC);
        if options.is_empty() && needs_default {
            return Err(ConfigError::declaration(format!(
                "no default options found for argument \"{label}\", but the widget is not dynamic"
            )));
        }
        if name.is_empty() {
            return Err(ConfigError::declaration(format!(
                "no name found for argument \"{label}\""
            )));
        }

        Ok(Self {
            name,
            widget,
            label,
            attrs,
            options,
            signals,
        })
    }

    /// The CLI token, passed as-is (e.g. `--path` or `-v`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Widget used to edit the argument.
    pub fn widget(&self) -> WidgetType {
        self.widget
    }

    /// Label on the form.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Extra attributes.
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Preset options.
    pub fn options(&self) -> &[ArgOption] {
        &self.options
    }

    /// Interaction hooks.
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Column of a tabular row carrying the value, from the `value` keyword
    /// attribute, the marked header column, or 0.
    pub fn value_column(&self) -> usize {
        let from_attr = self.attrs.keyword_int("value");
        if let Ok(col) = usize::try_from(from_attr) {
            return col;
        }
        self.options
            .iter()
            .find_map(|o| match o.value() {
                OptionValue::Header(h) => h.value_column,
                _ => None,
            })
            .unwrap_or(0)
    }
}

/// Reads an optional string field. Scalars are stringified, other shapes are an error.
pub(crate) fn str_field(decl: &Map<String, Value>, key: &str) -> Result<String, ConfigError> {
    match decl.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Bool(_) | Value::Number(_))) => Ok(v.to_string()),
        Some(other) => Err(ConfigError::declaration(format!(
            "field \"{key}\" should be a string, got: {other}"
        ))),
    }
}
