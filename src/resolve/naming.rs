//! Target names for same-named source records
//!
//! Records are grouped by name. In a group with exactly one live record
//! that record keeps the original name and every other member is renamed to
//! `Duplicate_{name}`, or `Duplicate_{n}_{name}` (n = 2, 3, ...) when that is
//! taken. A group without a single live record renames every member, unless
//! it has only one member. Names are probed against rows already inserted,
//! so names must be assigned and inserted one record at a time.

use crate::error::{Error, Result};
use crate::source::SourceDataset;
use crate::target::{dataset_exists, DatasetType};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::debug;

pub const DUPLICATE_PREFIX: &str = "Duplicate_";

/// Name given to records that have none
pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// Counters carried through a naming run
#[derive(Debug, Default)]
pub struct NamingState {
    unknown_names: u32,
}

impl NamingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `UNKNOWN` for the first nameless record, `UNKNOWN-{n}` for the n-th
    pub fn next_unknown_name(&mut self) -> String {
        self.unknown_names += 1;
        if self.unknown_names == 1 {
            UNKNOWN_NAME.to_string()
        } else {
            format!("{}-{}", UNKNOWN_NAME, self.unknown_names)
        }
    }

    pub fn unknown_names(&self) -> u32 {
        self.unknown_names
    }
}

#[derive(Debug, Clone)]
pub struct GroupMember<'a> {
    pub source: &'a SourceDataset,
    /// The name was generated because the record had none
    pub synthesized: bool,
}

/// Source records sharing one name
#[derive(Debug, Clone)]
pub struct NameGroup<'a> {
    pub name: String,
    pub members: Vec<GroupMember<'a>>,
}

/// Group records by name, in order of first appearance
pub fn group_by_name<'a>(records: &'a [SourceDataset], state: &mut NamingState) -> Vec<NameGroup<'a>> {
    let mut groups: Vec<NameGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for source in records {
        let (name, synthesized) = match &source.name {
            Some(name) => (name.clone(), false),
            None => (state.next_unknown_name(), true),
        };

        let member = GroupMember {
            source,
            synthesized,
        };

        match index.get(&name) {
            Some(&i) => groups[i].members.push(member),
            None => {
                index.insert(name.clone(), groups.len());
                groups.push(NameGroup {
                    name,
                    members: vec![member],
                });
            }
        }
    }

    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameDecision {
    /// Insert under the group's name
    Original,
    /// Insert under the first free duplicate name
    Duplicate,
}

/// Decide which members of a group keep the original name.
///
/// Takes the deletion status of each member and returns (member index,
/// decision) pairs in insertion order: the member keeping the name first,
/// then the rest in their original order.
pub fn plan_group(deleted: &[bool]) -> Vec<(usize, NameDecision)> {
    if deleted.len() == 1 {
        return vec![(0, NameDecision::Original)];
    }

    let live: Vec<usize> = (0..deleted.len()).filter(|&i| !deleted[i]).collect();

    match live.as_slice() {
        [keeper] => std::iter::once((*keeper, NameDecision::Original))
            .chain(
                (0..deleted.len())
                    .filter(|i| i != keeper)
                    .map(|i| (i, NameDecision::Duplicate)),
            )
            .collect(),
        _ => (0..deleted.len())
            .map(|i| (i, NameDecision::Duplicate))
            .collect(),
    }
}

/// The `attempt`-th duplicate name for `name` (attempts count from 1)
pub fn duplicate_name(name: &str, attempt: u32) -> String {
    if attempt <= 1 {
        format!("{}{}", DUPLICATE_PREFIX, name)
    } else {
        format!("{}{}_{}", DUPLICATE_PREFIX, attempt, name)
    }
}

/// First duplicate name not yet used by a row with the same type and status
pub async fn assign_duplicate_name(
    conn: &mut SqliteConnection,
    name: &str,
    dataset_type: DatasetType,
    is_deleted: bool,
    max_attempts: u32,
) -> Result<String> {
    for attempt in 1..=max_attempts {
        let candidate = duplicate_name(name, attempt);
        if !dataset_exists(conn, &candidate, dataset_type, is_deleted).await? {
            return Ok(candidate);
        }
        debug!("Name '{}' taken, probing further", candidate);
    }

    Err(Error::NameProbeExhausted {
        name: name.to_string(),
        attempts: max_attempts,
    })
}

/// Name a member is inserted under
pub async fn resolve_name(
    conn: &mut SqliteConnection,
    group_name: &str,
    decision: NameDecision,
    dataset_type: DatasetType,
    is_deleted: bool,
    max_attempts: u32,
) -> Result<String> {
    match decision {
        NameDecision::Original => Ok(group_name.to_string()),
        NameDecision::Duplicate => {
            assign_duplicate_name(conn, group_name, dataset_type, is_deleted, max_attempts).await
        }
    }
}

/// Whether `candidate` is `original` or a duplicate name generated from it
pub fn names_correspond(candidate: &str, original: &str) -> bool {
    candidate == original || duplicate_bases(candidate).any(|base| base == original)
}

/// Whether `candidate` is a synthesized `UNKNOWN` name or a duplicate of one
pub fn is_synthesized_name(candidate: &str) -> bool {
    std::iter::once(candidate)
        .chain(duplicate_bases(candidate))
        .any(|base| match base.strip_prefix(UNKNOWN_NAME) {
            Some("") => true,
            Some(rest) => rest.strip_prefix('-').is_some_and(is_counter),
            None => false,
        })
}

/// Names a duplicate name may have been generated from.
///
/// `Duplicate_2_x` is either the second duplicate of `x` or the first
/// duplicate of `2_x`, so both readings are returned.
fn duplicate_bases(candidate: &str) -> impl Iterator<Item = &str> {
    let rest = candidate.strip_prefix(DUPLICATE_PREFIX);
    let counted = rest
        .and_then(|r| r.split_once('_'))
        .filter(|(n, _)| is_counter(n))
        .map(|(_, tail)| tail);
    rest.into_iter().chain(counted)
}

fn is_counter(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
