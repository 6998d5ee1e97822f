use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::methodology::Phase;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    #[default]
    Implantacao,
    Migracao,
    Revitalizacao,
    Upgrade,
    Consultoria,
}

impl ScopeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Implantacao => "implantacao",
            Self::Migracao => "migracao",
            Self::Revitalizacao => "revitalizacao",
            Self::Upgrade => "upgrade",
            Self::Consultoria => "consultoria",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Implantacao => "Implantação",
            Self::Migracao => "Migração",
            Self::Revitalizacao => "Revitalização",
            Self::Upgrade => "Upgrade",
            Self::Consultoria => "Consultoria",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::value_variants().iter().copied().find(|scope| {
            scope.as_str().eq_ignore_ascii_case(trimmed)
                || scope.label().to_lowercase() == trimmed.to_lowercase()
        })
    }
}

const SCOPE_KEYS: &[&str] = &[
    "implantacao",
    "migracao",
    "revitalizacao",
    "upgrade",
    "consultoria",
];

/// Accepts the storage key or the display label, like [`ScopeType::parse`].
impl<'de> Deserialize<'de> for ScopeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| de::Error::unknown_variant(&raw, SCOPE_KEYS))
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub name: String,
    pub manager: String,
    pub opportunity: String,
    pub contracted_hours: f64,
    pub scope_type: ScopeType,
    pub start_date: String,
    pub end_date: String,
    pub production_date: String,
    pub verifier: String,
    pub notes: Option<String>,
}

impl ProjectMetadata {
    /// Rejects input the store must never see. Returns soft warnings for
    /// fields that are accepted but look wrong.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.name.trim().is_empty() {
            bail!("project name is required");
        }
        if !self.contracted_hours.is_finite() || self.contracted_hours < 0.0 {
            bail!(
                "contracted hours must be a non-negative number, got {}",
                self.contracted_hours
            );
        }

        let mut warnings = Vec::new();
        for (field, value) in [
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("production_date", &self.production_date),
        ] {
            if !value.trim().is_empty()
                && NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).is_err()
            {
                warnings.push(format!("{field} {value:?} is not in DD/MM/YYYY format"));
            }
        }

        Ok(warnings)
    }

    pub fn notes_text(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}

/// One percentage per phase, keyed by [`Phase`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePercentages(BTreeMap<Phase, f64>);

impl PhasePercentages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, phase: Phase, percent: f64) {
        self.0.insert(phase, percent);
    }

    pub fn get(&self, phase: Phase) -> Option<f64> {
        self.0.get(&phase).copied()
    }

    /// Missing phases read as 0.
    pub fn get_or_zero(&self, phase: Phase) -> f64 {
        self.get(phase).unwrap_or(0.0)
    }

    /// Unweighted mean over every phase of the methodology.
    pub fn mean(&self) -> f64 {
        let total: f64 = Phase::ALL.iter().map(|phase| self.get_or_zero(*phase)).sum();
        total / Phase::COUNT as f64
    }

    pub fn ensure_complete(&self) -> Result<()> {
        for phase in Phase::ALL {
            let Some(percent) = self.get(phase) else {
                bail!("missing percentage for phase {}", phase.key());
            };
            if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                bail!(
                    "percentage for phase {} must be within 0..=100, got {percent}",
                    phase.key()
                );
            }
        }
        Ok(())
    }
}

impl FromIterator<(Phase, f64)> for PhasePercentages {
    fn from_iter<I: IntoIterator<Item = (Phase, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub i64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSnapshot {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub project: ProjectMetadata,
    pub percentages: PhasePercentages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub document: String,
    #[serde(default)]
    pub done: bool,
}

/// On-disk checklist: project metadata plus document flags per phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistFile {
    #[serde(default)]
    pub project: ProjectMetadata,
    #[serde(default)]
    pub phases: BTreeMap<String, Vec<ChecklistEntry>>,
}
