//! Module and command declarations.
//!
//! A module directory holds an `init.conf`:
//!
//! ```yaml
//! title: Disk Setup
//! group: system
//! landing: progress
//! setup: populate.sh --fast
//! conditions:
//!   - present: /dev/sda
//!     message: No disk found
//! commands:
//!   - path: partition.sh
//!     title: Partition
//!     option: Really wipe the disk?
//!     flags: [-v]
//!     args:
//!       - type: text
//!         label: Mount point
//!         name: --mount
//!         options: [[/mnt]]
//! ```

// Rust guideline compliant 2026-02

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::argument::{str_field, Argument};
use crate::conditions::{ConditionEvaluator, ConditionRule};
use crate::error::ConfigError;

/// Surface a running module's output is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandingPage {
    /// Plain output dump with a title and status bar.
    #[default]
    Logger,
    /// Progress bar, checklist and info panel.
    Progress,
    /// Checklist-centric variant of the progress page.
    List,
}

impl LandingPage {
    /// Parses a declared landing ID. An empty ID is the logger.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "logger" => Some(Self::Logger),
            "progress" => Some(Self::Progress),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

impl fmt::Display for LandingPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logger => write!(f, "logger"),
            Self::Progress => write!(f, "progress"),
            Self::List => write!(f, "list"),
        }
    }
}

/// A command within a module: an executable plus its argument schema.
#[derive(Debug, Clone)]
pub struct Command {
    path: PathBuf,
    title: String,
    option_label: Option<String>,
    static_flags: Vec<String>,
    arguments: Vec<Argument>,
}

impl Command {
    /// Parses a command declaration.
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        let Value::Object(decl) = raw else {
            return Err(ConfigError::declaration(format!(
                "wrong configuration of command: {raw}"
            )));
        };

        let mut cmd = Self {
            path: PathBuf::new(),
            title: String::new(),
            option_label: None,
            static_flags: Vec::new(),
            arguments: Vec::new(),
        };

        for (key, value) in decl {
            match (key.as_str(), value) {
                ("path", Value::String(s)) => cmd.path = PathBuf::from(s),
                ("title", Value::String(s)) => cmd.title.clone_from(s),
                ("option", Value::String(s)) => {
                    cmd.option_label = Some(s.clone()).filter(|s| !s.is_empty());
                }
                ("flags", Value::Array(flags)) => {
                    for flag in flags {
                        let Value::String(flag) = flag else {
                            return Err(ConfigError::declaration(format!(
                                "flag {flag} of command \"{}\" should be a string",
                                cmd.title
                            )));
                        };
                        cmd.static_flags.push(flag.clone());
                    }
                }
                ("args", Value::Array(args)) => {
                    for arg in args {
                        cmd.arguments.push(Argument::from_value(arg)?);
                    }
                }
                (_, Value::String(_) | Value::Array(_)) => {
                    log::debug!("[Discover] Ignoring command key \"{key}\"");
                }
                _ => {
                    return Err(ConfigError::declaration(format!(
                        "unknown syntax on commands configuration near \"{key}\" of command \"{}\": {value}",
                        cmd.title
                    )));
                }
            }
        }

        if cmd.path.as_os_str().is_empty() {
            return Err(ConfigError::declaration(format!(
                "command \"{}\" has no path",
                cmd.title
            )));
        }

        Ok(cmd)
    }

    /// Resolves a relative command path against the module directory.
    fn resolve_path(&mut self, module_path: &Path) {
        if self.path.is_relative() {
            self.path = module_path.join(&self.path);
        }
    }

    /// Path of the executable (absolute after discovery).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Title of the command.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Confirmation message. `Some` marks the command as requiring a yes/no.
    pub fn option_label(&self) -> Option<&str> {
        self.option_label.as_deref()
    }

    /// Flags always passed first.
    pub fn static_flags(&self) -> &[String] {
        &self.static_flags
    }

    /// Declared arguments, in declaration order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Looks up an argument by its form label.
    pub fn argument_by_label(&self, label: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.label() == label)
    }

    /// Looks up an argument by its CLI name.
    pub fn argument_by_name(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name() == name)
    }
}

/// A declared module: a form-backed set of commands plus its gates.
#[derive(Debug)]
pub struct Module {
    title: String,
    group: Option<String>,
    module_path: PathBuf,
    landing: LandingPage,
    setup: Vec<String>,
    callback_path: PathBuf,
    conditions: ConditionEvaluator,
    commands: Vec<Command>,
}

impl Module {
    /// Parses a module declaration read from `<module_path>/init.conf`.
    ///
    /// Returns `Ok(None)` when the declaration has no title: such modules are
    /// skipped, not fatal. `callback` is the application-wide socket path used
    /// unless the module declares its own.
    pub fn from_value(
        raw: &Value,
        module_path: &Path,
        callback: &Path,
    ) -> Result<Option<Self>, ConfigError> {
        let Value::Object(decl) = raw else {
            return Err(ConfigError::declaration("module declaration should be a mapping"));
        };

        let title = str_field(decl, "title")?;
        if title.is_empty() {
            return Ok(None);
        }

        let group = Some(str_field(decl, "group")?).filter(|g| !g.is_empty());

        let landing_raw = str_field(decl, "landing")?;
        let landing = LandingPage::parse(&landing_raw).ok_or_else(|| {
            ConfigError::declaration(format!(
                "unknown landing page ID \"{landing_raw}\" in module \"{title}\""
            ))
        })?;

        let mut setup: Vec<String> = str_field(decl, "setup")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(exe) = setup.first_mut() {
            if Path::new(exe.as_str()).is_relative() {
                *exe = module_path.join(exe.as_str()).to_string_lossy().into_owned();
            }
        }

        let callback_path = match str_field(decl, "callback")? {
            own if !own.is_empty() => module_path.join(own),
            _ => callback.to_path_buf(),
        };

        let rules = parse_conditions(decl.get("conditions"), &title)?;
        let conditions = ConditionEvaluator::new(&rules)?;

        let mut commands = match decl.get("commands") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(cmds)) => cmds
                .iter()
                .map(Command::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ConfigError::declaration(format!(
                    "wrong configuration of commands at module {title}"
                )))
            }
        };
        for cmd in &mut commands {
            cmd.resolve_path(module_path);
        }

        Ok(Some(Self {
            title,
            group,
            module_path: module_path.to_path_buf(),
            landing,
            setup,
            callback_path,
            conditions,
            commands,
        }))
    }

    /// Title shown in menus.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Group key the module is attached to, if any.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Directory holding the module's `init.conf`.
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    /// Identifier used to scope session storage: the module directory name.
    pub fn id(&self) -> String {
        self.module_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.title.clone())
    }

    /// Landing page the module output is routed to.
    pub fn landing(&self) -> LandingPage {
        self.landing
    }

    /// Setup executable (absolute), if declared.
    pub fn setup_command(&self) -> Option<&str> {
        self.setup.first().map(String::as_str)
    }

    /// Arguments of the setup executable.
    pub fn setup_args(&self) -> &[String] {
        self.setup.get(1..).unwrap_or(&[])
    }

    /// Unix socket path the callback channel binds while the module runs.
    pub fn callback_path(&self) -> &Path {
        &self.callback_path
    }

    /// Availability gate of the module.
    pub fn conditions(&self) -> &ConditionEvaluator {
        &self.conditions
    }

    /// Declared commands.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Looks up a command by title.
    pub fn command(&self, title: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.title() == title)
    }
}

/// Converts the raw `conditions` list into clause → targets rules.
///
/// Each value may be a single string or a list of strings.
fn parse_conditions(raw: Option<&Value>, title: &str) -> Result<Vec<ConditionRule>, ConfigError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ConfigError::declaration(format!(
                "wrong configuration of conditions at module {title}"
            )))
        }
    };

    let mut rules = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            return Err(ConfigError::declaration(format!(
                "condition of module {title} should be a mapping: {item}"
            )));
        };

        let mut rule = BTreeMap::new();
        for (key, value) in map {
            let targets = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(list) => list
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        other => Err(ConfigError::declaration(format!(
                            "condition value {other} of module {title} is not a string"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Value::Number(n) => vec![n.to_string()],
                other => {
                    return Err(ConfigError::declaration(format!(
                        "condition value {other} of module {title} is not a string"
                    )))
                }
            };
            rule.insert(key.clone(), targets);
        }
        rules.push(rule);
    }
    Ok(rules)
}
