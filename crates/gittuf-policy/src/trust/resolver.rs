//! Delegation resolution.
//!
//! Walks are breadth-first over an explicit queue. Each queued delegation
//! carries the trust database of the role that declared it, so sibling
//! branches never see each other's keys. Only rules whose patterns match
//! the target are queued, in declared order; visiting a terminating rule
//! drops everything else still queued.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::rc::Rc;

use super::builder::{build_top_level, load_targets};
use super::database::TrustDatabase;
use crate::config::VerifierConfig;
use crate::error::{PolicyError, Result};
use crate::metadata::{DelegatedRole, Targets, TARGETS_ROLE};
use crate::policy::PolicySnapshot;
use crate::store::ObjectStore;

/// The role whose metadata records a target.
#[derive(Debug, Clone)]
pub struct GoverningRole {
    pub name: String,
    pub targets: Targets,
    /// Ids of the keys whose signatures on the role verified.
    pub signers: BTreeSet<String>,
}

struct Delegation {
    rule: DelegatedRole,
    db: Rc<TrustDatabase>,
}

struct DelegationWalk<'a> {
    target: &'a str,
    queue: VecDeque<Delegation>,
    visited: HashSet<String>,
    max_visited: usize,
}

impl<'a> DelegationWalk<'a> {
    fn new(target: &'a str, config: &VerifierConfig) -> Self {
        Self {
            target,
            queue: VecDeque::new(),
            visited: HashSet::new(),
            max_visited: config.max_roles_visited,
        }
    }

    /// Queue the rules `targets` delegates that match the target.
    fn add(&mut self, targets: &Targets) -> Result<()> {
        let Some(delegations) = &targets.delegations else {
            return Ok(());
        };
        let db = Rc::new(TrustDatabase::from_delegations(delegations)?);
        for rule in &delegations.roles {
            if rule.matches_path(self.target) {
                self.queue.push_back(Delegation {
                    rule: rule.clone(),
                    db: Rc::clone(&db),
                });
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Option<Delegation> {
        while let Some(delegation) = self.queue.pop_front() {
            if !self.visited.insert(delegation.rule.name.clone()) {
                continue;
            }
            if self.visited.len() > self.max_visited {
                log::warn!(
                    "delegation walk for {} exceeded {} roles",
                    self.target,
                    self.max_visited
                );
                return None;
            }
            if delegation.rule.terminating {
                self.queue.clear();
            }
            return Some(delegation);
        }
        None
    }
}

fn top_level_targets(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    config: &VerifierConfig,
) -> Result<(Targets, BTreeSet<String>)> {
    let db = build_top_level(store, snapshot, config)?;
    load_targets(store, snapshot, TARGETS_ROLE, &db, config)
}

/// Find the role that records `target`.
///
/// The top-level `targets` role wins if it records the target itself.
/// Otherwise the first delegated role, in walk order, that records it.
pub fn resolve_governing_role(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    target: &str,
    config: &VerifierConfig,
) -> Result<GoverningRole> {
    let (top, signers) = top_level_targets(store, snapshot, config)?;
    if top.contains(target) {
        return Ok(GoverningRole {
            name: TARGETS_ROLE.to_string(),
            targets: top,
            signers,
        });
    }

    let mut walk = DelegationWalk::new(target, config);
    walk.add(&top)?;
    while let Some(delegation) = walk.next() {
        let name = delegation.rule.name;
        if !snapshot.has_role(&name) {
            log::debug!("role {name} has no metadata, skipping");
            continue;
        }
        let (targets, signers) = load_targets(store, snapshot, &name, &delegation.db, config)?;
        if targets.contains(target) {
            log::debug!("{target} is recorded by role {name}");
            return Ok(GoverningRole {
                name,
                targets,
                signers,
            });
        }
        walk.add(&targets)?;
    }

    Err(PolicyError::NoDelegationFound(target.to_string()))
}

/// Find the first delegated rule, in walk order, whose patterns match
/// `path`. The rule applies whether or not its role records the path.
pub fn resolve_matching_rule(
    store: &dyn ObjectStore,
    snapshot: &PolicySnapshot,
    path: &str,
    config: &VerifierConfig,
) -> Result<DelegatedRole> {
    let (top, _) = top_level_targets(store, snapshot, config)?;
    let mut walk = DelegationWalk::new(path, config);
    walk.add(&top)?;
    walk.next()
        .map(|delegation| delegation.rule)
        .ok_or_else(|| PolicyError::NoDelegationFound(path.to_string()))
}

/// True for the reserved rule that authorizes any signer.
pub fn is_catch_all(rule: &DelegatedRole, config: &VerifierConfig) -> bool {
    rule.name == config.catch_all_rule
}
