//! Reconcile the manifest against the local inventory
//!
//! The plan is derived from what is on disk right now and nothing else: no
//! timestamps, no record of earlier runs. Re-planning after a crash at any
//! point therefore yields a correct plan without manual cleanup.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;

use crate::inventory::{DirScan, LocalInventory, snapshot_name};
use crate::manifest::Manifest;

/// Why a name is in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanReason {
    /// Listed by the manifest, no local package
    Missing,
    /// Local package hash differs from the manifest (or could not be read)
    Stale,
    /// Package is current but its snapshot output is absent
    Undecoded,
}

impl PlanReason {
    /// Whether the package must be (re)downloaded
    pub fn needs_download(self) -> bool {
        !matches!(self, Self::Undecoded)
    }
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "missing",
            Self::Stale => "stale",
            Self::Undecoded => "undecoded",
        })
    }
}

/// Minimal set of manifest names needing a fetch+decode cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    items: BTreeMap<String, PlanReason>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn reason(&self, name: &str) -> Option<PlanReason> {
        self.items.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PlanReason)> {
        self.items.iter().map(|(n, r)| (n.as_str(), *r))
    }

    /// Count of names per reason
    pub fn count(&self, reason: PlanReason) -> usize {
        self.items.values().filter(|r| **r == reason).count()
    }
}

/// Pure reconciliation step.
///
/// `local_hashes` maps each local package name to its computed hash, or `None`
/// when hashing failed. `derived` is the scan of snapshot outputs.
pub fn compute_plan(
    manifest: &Manifest,
    local_hashes: &BTreeMap<String, Option<String>>,
    derived: &DirScan,
) -> Plan {
    let mut items = BTreeMap::new();
    for entry in manifest.iter() {
        let reason = match local_hashes.get(&entry.name) {
            None => Some(PlanReason::Missing),
            Some(None) => Some(PlanReason::Stale),
            Some(Some(hash)) if !finsync_core::digests_match(hash, &entry.content_hash) => {
                Some(PlanReason::Stale)
            }
            Some(Some(_)) if !derived.contains(&snapshot_name(&entry.name)) => {
                Some(PlanReason::Undecoded)
            }
            Some(Some(_)) => None,
        };
        if let Some(reason) = reason {
            items.insert(entry.name.clone(), reason);
        }
    }
    Plan { items }
}

/// Scan the inventory, hash the packages the manifest cares about, and plan.
pub fn plan(manifest: &Manifest, inventory: &LocalInventory) -> anyhow::Result<Plan> {
    let packages = inventory.list_packages()?;
    let derived = inventory.list_derived()?;
    if derived.is_missing() {
        log::info!(
            "No snapshot directory at {} yet (first run)",
            inventory.snapshot_dir().display()
        );
    }

    // Packages the manifest no longer lists are left alone and never hashed
    let local_hashes: BTreeMap<String, Option<String>> = packages
        .par_iter()
        .filter(|p| manifest.get(&p.name).is_some())
        .map(|p| {
            let hash = match p.content_hash() {
                Ok(h) => Some(h),
                Err(e) => {
                    log::warn!("{}: cannot hash package: {e}", p.name);
                    None
                }
            };
            (p.name.clone(), hash)
        })
        .collect();

    let plan = compute_plan(manifest, &local_hashes, &derived);
    log::debug!(
        "Plan: {} missing, {} stale, {} undecoded",
        plan.count(PlanReason::Missing),
        plan.count(PlanReason::Stale),
        plan.count(PlanReason::Undecoded)
    );
    Ok(plan)
}
