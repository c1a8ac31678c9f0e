//! Module availability conditions.
//!
//! A module may declare an ordered list of conditions. Each condition is a
//! mapping with exactly one clause key and a `message` shown when the clause
//! does not hold:
//!
//! ```yaml
//! conditions:
//!   - all-present: [/etc/fstab, /etc/hosts]
//!     message: System files are missing
//!   - uid: root
//!     message: Must run as root
//! ```
//!
//! # Evaluation
//!
//! [`ConditionEvaluator::satisfied`] walks the list left to right and stops
//! at the first unsatisfied condition, whose message becomes
//! [`ConditionEvaluator::message`]. The verdict is computed at most once and
//! cached; later calls never touch the filesystem again.
//!
//! # Probes
//!
//! Filesystem and identity lookups go through [`SystemProbe`] so tests can
//! substitute a counting or fake implementation.

mod file;
mod permission;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub use file::{FileClause, FileCondition};
pub use permission::{PermissionClause, PermissionCondition};

use crate::error::ConditionError;

/// A raw condition rule: clause (and `message`) key → target values.
pub type ConditionRule = BTreeMap<String, Vec<String>>;

/// Identity of the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Real user ID.
    pub uid: u32,
    /// Primary and supplementary group IDs.
    pub gids: Vec<u32>,
}

/// Access to the facts conditions are evaluated against.
pub trait SystemProbe: fmt::Debug + Send + Sync {
    /// Returns `true` if the path exists and is visible to the process.
    fn exists(&self, path: &Path) -> bool;

    /// Identity of the current process.
    fn identity(&self) -> Identity;

    /// Resolves a user name to its UID.
    fn user_id(&self, name: &str) -> Option<u32>;

    /// Resolves a group name to its GID.
    fn group_id(&self, name: &str) -> Option<u32>;
}

/// Probe backed by the real filesystem and process credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProbe;

impl SystemProbe for OsProbe {
    fn exists(&self, path: &Path) -> bool {
        // Unreadable parents make the file absent for this user.
        path.try_exists().unwrap_or(false)
    }

    fn identity(&self) -> Identity {
        permission::current_identity()
    }

    fn user_id(&self, name: &str) -> Option<u32> {
        permission::lookup_uid(name)
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        permission::lookup_gid(name)
    }
}

/// A single gate.
pub trait Condition: fmt::Debug + Send + Sync {
    /// Returns `true` if the gate holds.
    fn is_satisfied(&self, probe: &dyn SystemProbe) -> bool;

    /// Message to display when the gate does not hold.
    fn message(&self) -> &str;
}

#[derive(Debug, Clone)]
struct Verdict {
    satisfied: bool,
    message: String,
}

/// Short-circuiting, caching evaluator over a module's conditions.
pub struct ConditionEvaluator {
    conditions: Vec<Box<dyn Condition>>,
    probe: Arc<dyn SystemProbe>,
    verdict: OnceLock<Verdict>,
}

impl fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("conditions", &self.conditions)
            .field("verdict", &self.verdict.get())
            .finish_non_exhaustive()
    }
}

impl ConditionEvaluator {
    /// Builds an evaluator checking against the real system.
    pub fn new(rules: &[ConditionRule]) -> Result<Self, ConditionError> {
        Self::with_probe(rules, Arc::new(OsProbe))
    }

    /// Builds an evaluator checking against the given probe.
    pub fn with_probe(
        rules: &[ConditionRule],
        probe: Arc<dyn SystemProbe>,
    ) -> Result<Self, ConditionError> {
        let conditions = rules.iter().map(load).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            conditions,
            probe,
            verdict: OnceLock::new(),
        })
    }

    /// Returns `true` if every condition holds.
    pub fn satisfied(&self) -> bool {
        self.verdict().satisfied
    }

    /// Message of the first failed condition; empty when all hold.
    pub fn message(&self) -> &str {
        &self.verdict().message
    }

    /// Number of declared conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Returns `true` if no conditions were declared.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn verdict(&self) -> &Verdict {
        self.verdict.get_or_init(|| {
            let failed = self
                .conditions
                .iter()
                .find(|c| !c.is_satisfied(self.probe.as_ref()));

            match failed {
                Some(c) => {
                    log::debug!("[Conditions] Unsatisfied: {}", c.message());
                    Verdict {
                        satisfied: false,
                        message: c.message().to_string(),
                    }
                }
                None => Verdict {
                    satisfied: true,
                    message: String::new(),
                },
            }
        })
    }
}

/// Builds one condition out of a raw rule.
fn load(rule: &ConditionRule) -> Result<Box<dyn Condition>, ConditionError> {
    let message = rule
        .get("message")
        .and_then(|m| m.first())
        .ok_or(ConditionError::MissingMessage)?
        .clone();

    let clauses: Vec<&String> = rule.keys().filter(|k| *k != "message").collect();
    let clause = match clauses.as_slice() {
        [] => return Err(ConditionError::NoClause),
        [one] => one.as_str(),
        many => {
            return Err(ConditionError::MultipleClauses(
                many.iter().map(|s| (*s).clone()).collect(),
            ))
        }
    };
    let targets = rule.get(clause).map_or(&[][..], Vec::as_slice);

    if let Some(file) = FileClause::parse(clause) {
        return Ok(Box::new(FileCondition::new(message, file, targets)?));
    }
    if let Some(perm) = PermissionClause::parse(clause) {
        return Ok(Box::new(PermissionCondition::new(message, perm, targets)?));
    }
    Err(ConditionError::UnknownClause(clause.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake probe counting filesystem lookups.
    #[derive(Debug, Default)]
    pub(crate) struct CountingProbe {
        pub present: HashSet<String>,
        pub stats: AtomicUsize,
        pub uid: u32,
        pub gids: Vec<u32>,
    }

    impl CountingProbe {
        pub(crate) fn with_files(files: &[&str]) -> Self {
            Self {
                present: files.iter().map(|s| (*s).to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl SystemProbe for CountingProbe {
        fn exists(&self, path: &Path) -> bool {
            self.stats.fetch_add(1, Ordering::SeqCst);
            self.present.contains(path.to_string_lossy().as_ref())
        }

        fn identity(&self) -> Identity {
            Identity {
                uid: self.uid,
                gids: self.gids.clone(),
            }
        }

        fn user_id(&self, name: &str) -> Option<u32> {
            (name == "root").then_some(0)
        }

        fn group_id(&self, name: &str) -> Option<u32> {
            match name {
                "wheel" => Some(10),
                "kvm" => Some(36),
                _ => None,
            }
        }
    }

    pub(crate) fn rule(pairs: &[(&str, &[&str])]) -> ConditionRule {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_missing_file_blocks_with_message() {
        let rules = vec![rule(&[("present", &["/nonexistent"]), ("message", &["missing"])])];
        let eval = ConditionEvaluator::new(&rules).unwrap();
        assert!(!eval.satisfied());
        assert_eq!(eval.message(), "missing");
    }

    #[test]
    fn test_no_conditions_pass() {
        let eval = ConditionEvaluator::new(&[]).unwrap();
        assert!(eval.satisfied());
        assert_eq!(eval.message(), "");
        assert!(eval.is_empty());
    }

    #[test]
    fn test_first_failure_wins_and_short_circuits() {
        let probe = Arc::new(CountingProbe::with_files(&["/a"]));
        let rules = vec![
            rule(&[("present", &["/a"]), ("message", &["a missing"])]),
            rule(&[("absent", &["/a"]), ("message", &["a present"])]),
            rule(&[("present", &["/b"]), ("message", &["b missing"])]),
        ];
        let eval = ConditionEvaluator::with_probe(&rules, probe.clone()).unwrap();
        assert!(!eval.satisfied());
        assert_eq!(eval.message(), "a present");
        assert_eq!(probe.stats.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_verdict_is_cached() {
        let probe = Arc::new(CountingProbe::with_files(&["/a"]));
        let rules = vec![rule(&[("all-present", &["/a"]), ("message", &["m"])])];
        let eval = ConditionEvaluator::with_probe(&rules, probe.clone()).unwrap();

        let first = (eval.satisfied(), eval.message().to_string());
        let second = (eval.satisfied(), eval.message().to_string());
        assert_eq!(first, second);
        assert_eq!(first, (true, String::new()));
        assert_eq!(probe.stats.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_before_satisfied_evaluates() {
        let probe = Arc::new(CountingProbe::default());
        let rules = vec![rule(&[("present", &["/x"]), ("message", &["gone"])])];
        let eval = ConditionEvaluator::with_probe(&rules, probe.clone()).unwrap();
        assert_eq!(eval.message(), "gone");
        assert!(!eval.satisfied());
        assert_eq!(probe.stats.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_construction_errors() {
        let no_msg = vec![rule(&[("present", &["/a"])])];
        assert_eq!(
            ConditionEvaluator::new(&no_msg).unwrap_err(),
            ConditionError::MissingMessage
        );

        let no_clause = vec![rule(&[("message", &["m"])])];
        assert_eq!(
            ConditionEvaluator::new(&no_clause).unwrap_err(),
            ConditionError::NoClause
        );

        let two = vec![rule(&[("present", &["/a"]), ("absent", &["/b"]), ("message", &["m"])])];
        assert!(matches!(
            ConditionEvaluator::new(&two).unwrap_err(),
            ConditionError::MultipleClauses(_)
        ));

        let unknown = vec![rule(&[("exists", &["/a"]), ("message", &["m"])])];
        assert_eq!(
            ConditionEvaluator::new(&unknown).unwrap_err(),
            ConditionError::UnknownClause("exists".into())
        );

        let empty = vec![rule(&[("present", &[]), ("message", &["m"])])];
        assert_eq!(
            ConditionEvaluator::new(&empty).unwrap_err(),
            ConditionError::NoTargets("present".into())
        );
    }
}
