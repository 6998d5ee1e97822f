use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use serde::Serialize;

use crate::methodology::{Methodology, Phase};
use crate::model::{ChecklistEntry, PhasePercentages};

/// Completion flags aligned position-by-position with a [`Methodology`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistState {
    flags: BTreeMap<Phase, Vec<bool>>,
}

impl ChecklistState {
    /// Every document starts not-done.
    pub fn new(methodology: &Methodology) -> Self {
        let flags = methodology
            .phases()
            .iter()
            .map(|entry| (entry.phase, vec![false; entry.documents.len()]))
            .collect();
        Self { flags }
    }

    /// Builds state from checklist file entries keyed by phase key or label.
    ///
    /// Entries that repeat a document name bind to that name's successive
    /// occurrences within the phase.
    pub fn from_entries(
        methodology: &Methodology,
        phases: &BTreeMap<String, Vec<ChecklistEntry>>,
    ) -> Result<Self> {
        let mut state = Self::new(methodology);
        let mut seen_phases = HashMap::<Phase, &str>::new();

        for (phase_name, entries) in phases {
            let Some(phase) = Phase::resolve(phase_name) else {
                bail!("unknown phase in checklist: {phase_name}");
            };
            if let Some(previous) = seen_phases.insert(phase, phase_name) {
                bail!(
                    "phase {} listed twice in checklist ({previous:?} and {phase_name:?})",
                    phase.key()
                );
            }

            let documents = methodology.documents(phase);
            let mut consumed = HashMap::<&str, usize>::new();

            for entry in entries {
                let name = entry.document.trim();
                let skip = consumed.entry(name).or_insert(0);
                let Some(position) = documents
                    .iter()
                    .enumerate()
                    .filter(|(_, doc)| doc.as_str() == name)
                    .map(|(index, _)| index)
                    .nth(*skip)
                else {
                    if *skip == 0 {
                        bail!("unknown document in phase {}: {name:?}", phase.label());
                    }
                    bail!(
                        "document {name:?} appears {} times in phase {} but the checklist lists it more often",
                        *skip,
                        phase.label()
                    );
                };
                *skip += 1;
                state.set(phase, position, entry.done)?;
            }
        }

        Ok(state)
    }

    pub fn set(&mut self, phase: Phase, index: usize, done: bool) -> Result<()> {
        let Some(slot) = self.flags.get_mut(&phase).and_then(|flags| flags.get_mut(index)) else {
            bail!("phase {} has no document at position {index}", phase.key());
        };
        *slot = done;
        Ok(())
    }

    /// Positions outside the methodology read as not-done.
    pub fn is_done(&self, phase: Phase, index: usize) -> bool {
        self.flags
            .get(&phase)
            .and_then(|flags| flags.get(index))
            .copied()
            .unwrap_or(false)
    }

    /// Checklist entries for every document, suitable for writing back to disk.
    pub fn to_entries(&self, methodology: &Methodology) -> BTreeMap<String, Vec<ChecklistEntry>> {
        methodology
            .phases()
            .iter()
            .map(|entry| {
                let rows = entry
                    .documents
                    .iter()
                    .enumerate()
                    .map(|(index, document)| ChecklistEntry {
                        document: document.clone(),
                        done: self.is_done(entry.phase, index),
                    })
                    .collect();
                (entry.phase.key().to_string(), rows)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseScore {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl PhaseScore {
    pub fn new(phase: Phase, completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else if completed >= total {
            100.0
        } else {
            100.0 * completed as f64 / total as f64
        };

        Self {
            phase,
            completed,
            total,
            percent,
        }
    }

    /// False for phases without documents.
    pub fn is_applicable(&self) -> bool {
        self.total > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub phases: Vec<PhaseScore>,
    pub global_percent: f64,
}

impl ScoreCard {
    pub fn percentages(&self) -> PhasePercentages {
        self.phases
            .iter()
            .map(|score| (score.phase, score.percent))
            .collect()
    }

    #[cfg(test)]
    pub fn phase(&self, phase: Phase) -> Option<&PhaseScore> {
        self.phases.iter().find(|score| score.phase == phase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasePending {
    pub phase: Phase,
    pub percent: f64,
    pub documents: Vec<String>,
}

pub fn score(methodology: &Methodology, state: &ChecklistState) -> ScoreCard {
    let phases: Vec<PhaseScore> = methodology
        .phases()
        .iter()
        .map(|entry| {
            let total = entry.documents.len();
            let completed = (0..total)
                .filter(|index| state.is_done(entry.phase, *index))
                .count();
            PhaseScore::new(entry.phase, completed, total)
        })
        .collect();

    let global_percent = if phases.is_empty() {
        0.0
    } else {
        phases.iter().map(|score| score.percent).sum::<f64>() / phases.len() as f64
    };

    ScoreCard {
        phases,
        global_percent,
    }
}

/// Not-done documents for every phase that is below 100 %.
pub fn pending_documents(methodology: &Methodology, state: &ChecklistState) -> Vec<PhasePending> {
    let card = score(methodology, state);

    methodology
        .phases()
        .iter()
        .zip(&card.phases)
        .filter_map(|(entry, phase_score)| {
            let documents: Vec<String> = entry
                .documents
                .iter()
                .enumerate()
                .filter(|(index, _)| !state.is_done(entry.phase, *index))
                .map(|(_, document)| document.clone())
                .collect();

            if documents.is_empty() {
                return None;
            }

            Some(PhasePending {
                phase: entry.phase,
                percent: phase_score.percent,
                documents,
            })
        })
        .collect()
}
