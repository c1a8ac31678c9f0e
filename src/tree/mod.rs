//! Module tree: groups, modules and commands discovered from a content root.
//!
//! # Layout
//!
//! ```text
//! content/
//! ├── init.conf            # shell title
//! ├── disk/
//! │   ├── init.conf        # module (optionally `group: system`)
//! │   └── partition.sh
//! └── net/
//!     └── init.conf
//! ```
//!
//! # Discovery
//!
//! [`discover`] walks the content root and loads every `init.conf` except the
//! root one. Modules with a `group` key are attached to the group with that
//! exact ID, created on first reference. The top level is sorted by title and
//! a synthetic exit entry is pinned last.
//!
//! A malformed module aborts the whole discovery: a partially built tree is
//! worse than failing closed.

pub mod argument;
pub mod attributes;
pub mod module;
pub mod signals;

use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

pub use argument::{ArgOption, Argument, OptionKind, OptionValue, TabularHeader, TabularRow, WidgetType};
pub use attributes::Attributes;
pub use module::{Command, LandingPage, Module};
pub use signals::{SignalAction, Signals};

use crate::constants::{EXIT_ID, INIT_CONF, LABEL_EXIT};
use crate::error::ConfigError;

/// Common view over every tree node.
pub trait Node {
    /// Title shown in menus.
    fn title(&self) -> &str;

    /// Child nodes, in display order.
    fn children(&self) -> &[Component];

    /// Returns `true` if the node opens a submenu rather than a form.
    fn is_container(&self) -> bool {
        !self.children().is_empty()
    }
}

/// A container of modules sharing a group ID.
#[derive(Debug)]
pub struct Group {
    id: String,
    children: Vec<Component>,
}

impl Group {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            children: Vec::new(),
        }
    }

    /// Group key modules refer to.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Node for Group {
    fn title(&self) -> &str {
        &self.id
    }

    fn children(&self) -> &[Component] {
        &self.children
    }

    fn is_container(&self) -> bool {
        true
    }
}

/// A plain menu command with no form, such as the exit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuCommand {
    id: String,
    title: String,
}

impl MenuCommand {
    /// The synthetic exit entry.
    pub fn exit() -> Self {
        Self {
            id: EXIT_ID.to_string(),
            title: LABEL_EXIT.to_string(),
        }
    }

    /// Identifier of the command.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A node of the tree.
#[derive(Debug)]
pub enum Component {
    /// Container of modules.
    Group(Group),
    /// A launchable module.
    Module(Module),
    /// A plain menu command.
    Command(MenuCommand),
}

impl Node for Component {
    fn title(&self) -> &str {
        match self {
            // Groups are titled by their key.
            Self::Group(g) => &g.id,
            Self::Module(m) => m.title(),
            Self::Command(c) => &c.title,
        }
    }

    fn children(&self) -> &[Component] {
        match self {
            Self::Group(g) => &g.children,
            Self::Module(_) | Self::Command(_) => &[],
        }
    }

    fn is_container(&self) -> bool {
        matches!(self, Self::Group(_)) || !self.children().is_empty()
    }
}

impl Component {
    /// Declared type name: `group`, `module` or `command`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Module(_) => "module",
            Self::Command(_) => "command",
        }
    }

    /// The module, if this node is one.
    pub fn as_module(&self) -> Option<&Module> {
        match self {
            Self::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` for the synthetic exit entry.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Command(c) if c.id == EXIT_ID)
    }
}

/// Sorts by title, keeping the exit entry last.
fn sort_components(items: &mut [Component]) {
    items.sort_by(|a, b| {
        a.is_exit()
            .cmp(&b.is_exit())
            .then_with(|| a.title().cmp(b.title()))
    });
}

/// The discovered, ordered module hierarchy.
#[derive(Debug)]
pub struct ConfigTree {
    title: String,
    content_root: PathBuf,
    components: Vec<Component>,
}

impl ConfigTree {
    /// Shell title from the root `init.conf`.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Content root the tree was discovered from.
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Top-level components; the exit entry is always last.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Every module in the tree, depth first in display order.
    pub fn modules(&self) -> Vec<&Module> {
        fn collect<'a>(items: &'a [Component], out: &mut Vec<&'a Module>) {
            for item in items {
                match item {
                    Component::Module(m) => out.push(m),
                    Component::Group(g) => collect(&g.children, out),
                    Component::Command(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.components, &mut out);
        out
    }

    /// Finds a module by title.
    pub fn find_module(&self, title: &str) -> Option<&Module> {
        self.modules().into_iter().find(|m| m.title() == title)
    }

    /// Finds a top-level group by its ID.
    pub fn find_group(&self, id: &str) -> Option<&Group> {
        self.components.iter().find_map(|c| match c {
            Component::Group(g) if g.id == id => Some(g),
            _ => None,
        })
    }
}

/// Reads a YAML declaration into the generic tree.
pub fn read_declaration(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_yaml::from_str::<Value>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Discovers the module tree under `content_root`.
///
/// `callback` is the application-wide socket path handed to modules that do
/// not declare their own.
pub fn discover(content_root: &Path, callback: &Path) -> Result<ConfigTree, ConfigError> {
    let root_conf = content_root.join(INIT_CONF);
    for required in [content_root, root_conf.as_path()] {
        if !required.exists() {
            return Err(ConfigError::Missing(required.to_path_buf()));
        }
    }

    let root_decl = read_declaration(&root_conf)?;
    let title = match &root_decl {
        Value::Object(map) => argument::str_field(map, "title")?,
        _ => String::new(),
    };

    let mut components: Vec<Component> = Vec::new();
    let walker = WalkDir::new(content_root).sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if path == root_conf || entry.file_name() != INIT_CONF || !entry.file_type().is_file() {
            continue;
        }

        let module_path = path.parent().unwrap_or(content_root);
        let module = read_declaration(path)
            .and_then(|decl| Module::from_value(&decl, module_path, callback))
            .map_err(|e| {
                log::error!("[Discover] Error loading {}: {e}", path.display());
                ConfigError::Module {
                    path: path.to_path_buf(),
                    source: Box::new(e),
                }
            })?;

        let Some(module) = module else {
            log::warn!(
                "[Discover] Skipping module: {} (insufficient configuration)",
                path.display()
            );
            continue;
        };

        log::debug!("[Discover] Loaded module \"{}\" from {}", module.title(), path.display());
        match module.group().map(str::to_string) {
            Some(group_id) => group_entry(&mut components, &group_id)
                .children
                .push(Component::Module(module)),
            None => components.push(Component::Module(module)),
        }
    }

    for component in &mut components {
        if let Component::Group(g) = component {
            sort_components(&mut g.children);
        }
    }
    sort_components(&mut components);
    components.push(Component::Command(MenuCommand::exit()));

    log::info!(
        "[Discover] {} top-level entries from {}",
        components.len(),
        content_root.display()
    );

    Ok(ConfigTree {
        title,
        content_root: content_root.to_path_buf(),
        components,
    })
}

/// Returns the group with exactly this ID, creating it on first reference.
fn group_entry<'a>(components: &'a mut Vec<Component>, id: &str) -> &'a mut Group {
    let pos = components
        .iter()
        .position(|c| matches!(c, Component::Group(g) if g.id == id));

    let idx = match pos {
        Some(idx) => idx,
        None => {
            components.push(Component::Group(Group::new(id)));
            components.len() - 1
        }
    };

    match &mut components[idx] {
        Component::Group(g) => g,
        _ => unreachable!("index points at a group"),
    }
}
