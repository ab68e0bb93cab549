//! Board grouping: which leads sit in which stage column.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::models::{Lead, LeadId, Stage, StageId};

/// One board column.
#[derive(Debug, Clone, Serialize)]
pub struct StageGroup {
    pub stage: Stage,
    pub leads: Vec<Lead>,
}

/// Leads grouped by stage, in stage registry order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StageGroups {
    groups: Vec<StageGroup>,
}

impl StageGroups {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Look a column up by its display name.
    pub fn get(&self, stage_name: &str) -> Option<&[Lead]> {
        self.groups
            .iter()
            .find(|g| g.stage.name == stage_name)
            .map(|g| g.leads.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageGroup> {
        self.groups.iter()
    }

    pub fn total_leads(&self) -> usize {
        self.groups.iter().map(|g| g.leads.len()).sum()
    }

    /// Order every column by creation time, newest first.
    pub fn sort_recent_first(&mut self) {
        for group in &mut self.groups {
            sort_recent_first(&mut group.leads);
        }
    }

    pub fn into_vec(self) -> Vec<StageGroup> {
        self.groups
    }
}

impl IntoIterator for StageGroups {
    type Item = StageGroup;
    type IntoIter = std::vec::IntoIter<StageGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Index of the stage that collects leads with an unknown stage: the one
/// named "New" (any case), else the first stage.
pub fn fallback_stage_index(stages: &[Stage]) -> Option<usize> {
    if stages.is_empty() {
        return None;
    }
    Some(
        stages
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case("new"))
            .unwrap_or(0),
    )
}

/// Partition `leads` into one group per stage.
///
/// Leads are matched to stages by id; the first matching stage wins and a
/// lead id is never grouped twice. Leads whose stage is unknown are appended
/// to the fallback stage after the directly matched leads. Within a group the
/// input order is preserved.
pub fn group_leads_by_stage(leads: &[Lead], stages: &[Stage]) -> StageGroups {
    let Some(fallback) = fallback_stage_index(stages) else {
        return StageGroups::default();
    };

    let mut index: HashMap<StageId, usize> = HashMap::with_capacity(stages.len());
    for (i, stage) in stages.iter().enumerate() {
        index.entry(stage.id.clone()).or_insert(i);
    }

    let mut buckets: Vec<Vec<Lead>> = vec![Vec::new(); stages.len()];
    let mut unresolved: Vec<Lead> = Vec::new();
    let mut assigned: HashSet<&LeadId> = HashSet::with_capacity(leads.len());

    for lead in leads {
        if !assigned.insert(&lead.lead_id) {
            continue;
        }
        match index.get(&lead.stage_id) {
            Some(&i) => buckets[i].push(lead.clone()),
            None => unresolved.push(lead.clone()),
        }
    }

    if !unresolved.is_empty() {
        tracing::warn!(
            count = unresolved.len(),
            stage = %stages[fallback].name,
            "Leads with unknown stage placed in fallback column"
        );
        buckets[fallback].extend(unresolved);
    }

    let groups = stages
        .iter()
        .cloned()
        .zip(buckets)
        .map(|(stage, leads)| StageGroup { stage, leads })
        .collect();
    StageGroups { groups }
}

/// Newest leads first.
pub fn sort_recent_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
