//! File presence conditions.
//!
//! ```yaml
//! - absent: /etc/configured
//!   message: Already configured
//! - all-present: [/dev/sda, /dev/sdb]
//!   message: Both disks are required
//! ```

use std::path::{Path, PathBuf};

use super::{Condition, SystemProbe};
use crate::error::ConditionError;

/// File presence clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClause {
    /// At least one target exists.
    Present,
    /// Every target exists.
    AllPresent,
    /// At least one target is missing.
    Absent,
    /// Every target is missing.
    AllAbsent,
}

impl FileClause {
    /// Parses a clause key.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "present" => Some(Self::Present),
            "all-present" => Some(Self::AllPresent),
            "absent" => Some(Self::Absent),
            "all-absent" => Some(Self::AllAbsent),
            _ => None,
        }
    }
}

/// Condition on files being present or absent.
///
/// Access rights count: a file the user cannot see is absent in this context.
#[derive(Debug, Clone)]
pub struct FileCondition {
    clause: FileClause,
    targets: Vec<PathBuf>,
    message: String,
}

impl FileCondition {
    /// Builds a file condition. Targets must be absolute paths.
    pub fn new(message: String, clause: FileClause, targets: &[String]) -> Result<Self, ConditionError> {
        if targets.is_empty() {
            let key = match clause {
                FileClause::Present => "present",
                FileClause::AllPresent => "all-present",
                FileClause::Absent => "absent",
                FileClause::AllAbsent => "all-absent",
            };
            return Err(ConditionError::NoTargets(key.to_string()));
        }

        let targets = targets
            .iter()
            .map(|t| {
                if t.starts_with('/') {
                    Ok(PathBuf::from(t))
                } else {
                    Err(ConditionError::RelativeTarget(t.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            clause,
            targets,
            message,
        })
    }

    /// The clause of this condition.
    pub fn clause(&self) -> FileClause {
        self.clause
    }

    /// Targets checked by this condition.
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }
}

impl Condition for FileCondition {
    fn is_satisfied(&self, probe: &dyn SystemProbe) -> bool {
        let exists = |p: &PathBuf| probe.exists(Path::new(p));
        match self.clause {
            FileClause::Present => self.targets.iter().any(exists),
            FileClause::AllPresent => self.targets.iter().all(exists),
            FileClause::Absent => !self.targets.iter().all(exists),
            FileClause::AllAbsent => !self.targets.iter().any(exists),
        }
    }

    fn message(&self) -> &str {
        &self.message
    }
}
