//! Process identity conditions.
//!
//! ```yaml
//! - uid: root
//!   message: Must run as root
//! - gid: [kvm, adm]
//!   message: Must be a member of kvm or adm
//! ```
//!
//! Targets are user/group names or numeric IDs. The condition holds when the
//! process matches any target.

use std::ffi::CString;

use super::{Condition, Identity, SystemProbe};
use crate::error::ConditionError;

/// Identity clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionClause {
    /// Real user ID of the process.
    Uid,
    /// Primary or supplementary group of the process.
    Gid,
}

impl PermissionClause {
    /// Parses a clause key.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "uid" => Some(Self::Uid),
            "gid" => Some(Self::Gid),
            _ => None,
        }
    }
}

/// Condition on the identity of the running process.
#[derive(Debug, Clone)]
pub struct PermissionCondition {
    clause: PermissionClause,
    targets: Vec<String>,
    message: String,
}

impl PermissionCondition {
    /// Builds an identity condition.
    pub fn new(
        message: String,
        clause: PermissionClause,
        targets: &[String],
    ) -> Result<Self, ConditionError> {
        if targets.is_empty() {
            let key = match clause {
                PermissionClause::Uid => "uid",
                PermissionClause::Gid => "gid",
            };
            return Err(ConditionError::NoTargets(key.to_string()));
        }

        Ok(Self {
            clause,
            targets: targets.to_vec(),
            message,
        })
    }

    fn resolve(&self, probe: &dyn SystemProbe, target: &str) -> Option<u32> {
        if let Ok(id) = target.parse::<u32>() {
            return Some(id);
        }
        match self.clause {
            PermissionClause::Uid => probe.user_id(target),
            PermissionClause::Gid => probe.group_id(target),
        }
    }
}

impl Condition for PermissionCondition {
    fn is_satisfied(&self, probe: &dyn SystemProbe) -> bool {
        let identity = probe.identity();
        self.targets.iter().any(|t| {
            let Some(id) = self.resolve(probe, t) else {
                log::debug!("[Conditions] Unknown {:?} target: {t}", self.clause);
                return false;
            };
            match self.clause {
                PermissionClause::Uid => identity.uid == id,
                PermissionClause::Gid => identity.gids.contains(&id),
            }
        })
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Real UID plus primary and supplementary GIDs of this process.
pub(super) fn current_identity() -> Identity {
    // SAFETY: getuid/getgid cannot fail and take no pointers.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    let mut gids = vec![gid];

    // SAFETY: with a zero size getgroups only returns the group count.
    let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
    if let Ok(len) = usize::try_from(count) {
        let mut buf: Vec<libc::gid_t> = vec![0; len];
        // SAFETY: buf holds exactly `count` entries.
        let got = unsafe { libc::getgroups(count, buf.as_mut_ptr()) };
        if let Ok(got) = usize::try_from(got) {
            buf.truncate(got);
            gids.extend(buf.into_iter().filter(|g| *g != gid));
        }
    }

    Identity { uid, gids }
}

const LOOKUP_BUF: usize = 16 * 1024;

pub(super) fn lookup_uid(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF];
    let mut pwd = std::mem::MaybeUninit::<libc::passwd>::uninit();
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: every pointer is valid for the call and buf.len() is the real buffer size.
    let rc = unsafe {
        libc::getpwnam_r(
            cname.as_ptr(),
            pwd.as_mut_ptr(),
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    // SAFETY: a non-null result points at `pwd`, filled in by getpwnam_r.
    Some(unsafe { (*result).pw_uid })
}

pub(super) fn lookup_gid(name: &str) -> Option<u32> {
    let cname = CString::new(name).ok()?;
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF];
    let mut grp = std::mem::MaybeUninit::<libc::group>::uninit();
    let mut result: *mut libc::group = std::ptr::null_mut();

    // SAFETY: every pointer is valid for the call and buf.len() is the real buffer size.
    let rc = unsafe {
        libc::getgrnam_r(
            cname.as_ptr(),
            grp.as_mut_ptr(),
            buf.as_mut_ptr(),
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    // SAFETY: a non-null result points at `grp`, filled in by getgrnam_r.
    Some(unsafe { (*result).gr_gid })
}
