use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Implementation phases, in methodology order.
///
/// Display labels, chart labels, machine keys and storage columns are all
/// static per variant; renaming a label never touches persistence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialization,
    Planning,
    ProcessWorkshop,
    Construction,
    GoLive,
    AssistedOperation,
    Finalization,
}

impl Phase {
    pub const COUNT: usize = 7;

    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Initialization,
        Phase::Planning,
        Phase::ProcessWorkshop,
        Phase::Construction,
        Phase::GoLive,
        Phase::AssistedOperation,
        Phase::Finalization,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Planning => "planning",
            Self::ProcessWorkshop => "process_workshop",
            Self::Construction => "construction",
            Self::GoLive => "go_live",
            Self::AssistedOperation => "assisted_operation",
            Self::Finalization => "finalization",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Initialization => "Inicialização",
            Self::Planning => "Planejamento",
            Self::ProcessWorkshop => "Workshop de Processos",
            Self::Construction => "Construção",
            Self::GoLive => "Go Live",
            Self::AssistedOperation => "Operação Assistida",
            Self::Finalization => "Finalização",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::Initialization => "Ini",
            Self::Planning => "Plan",
            Self::ProcessWorkshop => "Work",
            Self::Construction => "Const",
            Self::GoLive => "Live",
            Self::AssistedOperation => "Op",
            Self::Finalization => "Fin",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Initialization => "initialization_percent",
            Self::Planning => "planning_percent",
            Self::ProcessWorkshop => "process_workshop_percent",
            Self::Construction => "construction_percent",
            Self::GoLive => "go_live_percent",
            Self::AssistedOperation => "assisted_operation_percent",
            Self::Finalization => "finalization_percent",
        }
    }

    /// Accepts either the machine key or the display label, ignoring case.
    pub fn resolve(value: &str) -> Option<Phase> {
        let trimmed = value.trim();
        Self::ALL.into_iter().find(|phase| {
            phase.key().eq_ignore_ascii_case(trimmed)
                || phase.label().to_lowercase() == trimmed.to_lowercase()
        })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDocuments {
    pub phase: Phase,
    pub documents: Vec<String>,
}

/// Ordered phase → document table. Always holds every [`Phase`] exactly once,
/// in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Methodology {
    phases: Vec<PhaseDocuments>,
}

const STANDARD_TABLE: [(Phase, &[&str]); Phase::COUNT] = [
    (
        Phase::Initialization,
        &[
            "Proposta Técnica",
            "Contrato assinado",
            "Orçamento Inicial",
            "Alinhamento time MV",
            "Ata de reunião",
            "Alinhamento Cliente",
            "TAP",
            "DEP",
        ],
    ),
    (
        Phase::Planning,
        &[
            "Evidência de Kick Off",
            "Ata de Reunião",
            "Cronograma do Projeto",
            "Plano de Projeto",
        ],
    ),
    (
        Phase::ProcessWorkshop,
        &[
            "Análise de Gaps Críticos",
            "Business Blue Print",
            "Configuração do Sistema",
            "Apresentação da Solução",
            "Termo de Aceite",
        ],
    ),
    (
        Phase::Construction,
        &[
            "Plano de Cutover",
            "Avaliação de Treinamento",
            "Lista de Presença",
            "Treinamento de Tabelas",
            "Carga Precursora",
            "Homologação Integração",
        ],
    ),
    (
        Phase::GoLive,
        &[
            "Carga Final de Dados",
            "Escala Apoio Go Live",
            "Metas de Simulação",
            "Testes Integrados",
            "Reunião Go/No Go",
            "Ata de Reunião",
        ],
    ),
    (
        Phase::AssistedOperation,
        &[
            "Suporte In Loco",
            "Pré-Onboarding",
            "Ata de Reunião",
            "Identificação de Gaps",
            "Termo de Aceite",
        ],
    ),
    (
        Phase::Finalization,
        &[
            "Reunião de Finalização",
            "Ata de Reunião",
            "TEP",
            "Lições Aprendidas",
        ],
    ),
];

impl Methodology {
    pub fn standard() -> Self {
        let phases = STANDARD_TABLE
            .iter()
            .map(|(phase, documents)| PhaseDocuments {
                phase: *phase,
                documents: documents.iter().map(|doc| doc.to_string()).collect(),
            })
            .collect();

        Self { phases }
    }

    pub fn new(phases: Vec<PhaseDocuments>) -> Result<Self> {
        if phases.len() != Phase::COUNT {
            bail!(
                "methodology must define {} phases, found {}",
                Phase::COUNT,
                phases.len()
            );
        }

        for (expected, entry) in Phase::ALL.iter().zip(&phases) {
            if entry.phase != *expected {
                bail!(
                    "methodology phase out of order: expected {}, found {}",
                    expected.key(),
                    entry.phase.key()
                );
            }
            if let Some(blank) = entry.documents.iter().find(|doc| doc.trim().is_empty()) {
                bail!(
                    "methodology phase {} has a blank document name: {blank:?}",
                    entry.phase.key()
                );
            }
        }

        Ok(Self { phases })
    }

    /// Loads a JSON object mapping phase keys (or labels) to document lists.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read methodology {}", path.display()))?;
        let table: BTreeMap<String, Vec<String>> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse methodology {}", path.display()))?;

        let mut by_phase = BTreeMap::<Phase, Vec<String>>::new();
        for (name, documents) in table {
            let Some(phase) = Phase::resolve(&name) else {
                bail!("unknown phase in methodology {}: {name}", path.display());
            };
            if by_phase.insert(phase, documents).is_some() {
                bail!("phase {} defined twice in {}", phase.key(), path.display());
            }
        }

        let mut phases = Vec::with_capacity(Phase::COUNT);
        for phase in Phase::ALL {
            let documents = by_phase.remove(&phase).with_context(|| {
                format!("methodology {} is missing phase {}", path.display(), phase.key())
            })?;
            phases.push(PhaseDocuments { phase, documents });
        }

        Self::new(phases)
    }

    pub fn load_or_standard(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::standard()),
        }
    }

    pub fn phases(&self) -> &[PhaseDocuments] {
        &self.phases
    }

    pub fn documents(&self, phase: Phase) -> &[String] {
        self.phases
            .iter()
            .find(|entry| entry.phase == phase)
            .map(|entry| entry.documents.as_slice())
            .unwrap_or(&[])
    }

    pub fn document_count(&self) -> usize {
        self.phases.iter().map(|entry| entry.documents.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_every_phase_in_order() {
        let methodology = Methodology::standard();
        let phases: Vec<Phase> = methodology.phases().iter().map(|entry| entry.phase).collect();
        assert_eq!(phases, Phase::ALL.to_vec());
        assert_eq!(methodology.documents(Phase::Initialization).len(), 8);
        assert_eq!(methodology.documents(Phase::GoLive).len(), 6);
        assert_eq!(methodology.document_count(), 38);
    }

    #[test]
    fn storage_columns_are_unique_and_independent_of_labels() {
        let mut columns: Vec<&str> = Phase::ALL.iter().map(|phase| phase.column()).collect();
        columns.sort();
        columns.dedup();
        assert_eq!(columns.len(), Phase::COUNT);
        assert!(columns.iter().all(|column| column.is_ascii()));
    }

    #[test]
    fn resolve_accepts_keys_and_labels() {
        assert_eq!(Phase::resolve("go_live"), Some(Phase::GoLive));
        assert_eq!(Phase::resolve("Go Live"), Some(Phase::GoLive));
        assert_eq!(Phase::resolve("CONSTRUÇÃO"), Some(Phase::Construction));
        assert_eq!(Phase::resolve(" planning "), Some(Phase::Planning));
        assert_eq!(Phase::resolve("Deployment"), None);
    }

    #[test]
    fn new_rejects_out_of_order_phases() {
        let mut phases = Methodology::standard().phases().to_vec();
        phases.swap(0, 1);
        let err = Methodology::new(phases).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn load_reads_override_file_and_keeps_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("methodology.json");
        let mut table = serde_json::Map::new();
        for phase in Phase::ALL {
            table.insert(phase.key().to_string(), serde_json::json!(["Ata", "Ata"]));
        }
        table.insert("Go Live".to_string(), serde_json::json!([]));
        table.remove("go_live");
        std::fs::write(&path, serde_json::to_vec(&table).expect("json")).expect("write");

        let methodology = Methodology::load(&path).expect("override should load");
        assert_eq!(methodology.documents(Phase::Planning), ["Ata", "Ata"]);
        assert!(methodology.documents(Phase::GoLive).is_empty());
    }
}
