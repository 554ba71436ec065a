//! # normalize: study structures to flat program entries
//!
//! Ladok returns a student's program participation as a forest
//! (`Studiestrukturer`): a program node whose `Barn` hold tracks, which may
//! hold further sessions. Only leaves describe an actual admission, so each
//! tree is flattened into one [`ProgramEntry`] per leaf, depth-first and
//! left-to-right. The program code is the leaf's own code; the code of the
//! tree's top-level node is kept alongside as [`ProgramEntry::root_code`].
//!
//! [`retain_current`] is the filtering policy the report drivers apply
//! afterwards.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

/// Body of `/studiedeltagande/studiestruktur/student/{uid}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyStructure {
    #[serde(rename = "Studiestrukturer", default)]
    pub structures: Vec<RawStructureNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStructureNode {
    #[serde(rename = "Utbildningsinformation", default)]
    pub info: Option<RawEducationInfo>,
    #[serde(rename = "Tillfallesdeltagande", default)]
    pub participation: Option<RawOccasionParticipation>,
    #[serde(rename = "Barn", default)]
    pub children: Vec<RawStructureNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOccasionParticipation {
    #[serde(rename = "Utbildningsinformation", default)]
    pub info: Option<RawEducationInfo>,
    #[serde(rename = "Aterbud", default)]
    pub cancelled: bool,
    #[serde(rename = "Avklarad", default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEducationInfo {
    #[serde(rename = "Utbildningskod", default)]
    pub code: Option<String>,
    #[serde(rename = "Benamning", default)]
    pub name: HashMap<String, String>,
    #[serde(rename = "Studieperiod", default)]
    pub period: Option<RawStudyPeriod>,
    #[serde(rename = "Utbildningstillfalleskod", default)]
    pub session_code: Option<String>,
    #[serde(rename = "Utbildningstillfallestyp", default)]
    pub session_type: Option<RawCode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStudyPeriod {
    #[serde(rename = "Startdatum", default)]
    pub start: Option<NaiveDate>,
    #[serde(rename = "Slutdatum", default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCode {
    #[serde(rename = "Kod", default)]
    pub code: Option<String>,
}

/// Program participation as a tagged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramNode {
    Leaf(ProgramLeaf),
    Branch {
        code: Option<String>,
        children: Vec<ProgramNode>,
    },
}

/// What a leaf says about one admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLeaf {
    pub code: Option<String>,
    pub name_en: Option<String>,
    pub name_sv: Option<String>,
    pub study_period_start: Option<NaiveDate>,
    pub study_period_end: Option<NaiveDate>,
    pub session_code: Option<String>,
    pub session_type_code: Option<String>,
    pub cancelled: bool,
    pub completed: bool,
}

impl From<&RawStructureNode> for ProgramNode {
    fn from(raw: &RawStructureNode) -> Self {
        if !raw.children.is_empty() {
            return ProgramNode::Branch {
                code: raw.info.as_ref().and_then(|i| i.code.clone()),
                children: raw.children.iter().map(ProgramNode::from).collect(),
            };
        }
        // Occasion data lives under Tillfallesdeltagande; fall back to the node itself.
        let participation = raw.participation.as_ref();
        let info = participation
            .and_then(|p| p.info.as_ref())
            .or(raw.info.as_ref());
        let mut leaf = ProgramLeaf {
            cancelled: participation.is_some_and(|p| p.cancelled),
            completed: participation.is_some_and(|p| p.completed),
            ..ProgramLeaf::default()
        };
        if let Some(info) = info {
            leaf.code = info.code.clone();
            leaf.name_en = info.name.get("en").cloned();
            leaf.name_sv = info.name.get("sv").cloned();
            leaf.study_period_start = info.period.as_ref().and_then(|p| p.start);
            leaf.study_period_end = info.period.as_ref().and_then(|p| p.end);
            leaf.session_code = info.session_code.clone();
            leaf.session_type_code = info.session_type.as_ref().and_then(|t| t.code.clone());
        }
        ProgramNode::Leaf(leaf)
    }
}

impl ProgramNode {
    fn code(&self) -> Option<&str> {
        match self {
            ProgramNode::Leaf(leaf) => leaf.code.as_deref(),
            ProgramNode::Branch { code, .. } => code.as_deref(),
        }
    }

    fn leaves<'a>(&'a self, out: &mut Vec<&'a ProgramLeaf>) {
        match self {
            ProgramNode::Leaf(leaf) => out.push(leaf),
            ProgramNode::Branch { children, .. } => {
                for child in children {
                    child.leaves(out);
                }
            }
        }
    }
}

/// One flat row per leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEntry {
    /// Code of the leaf itself (program, track or session).
    pub program_code: String,
    /// Code of the top-level node of the tree the leaf belongs to.
    pub root_code: Option<String>,
    pub program_name: String,
    /// The English name was missing and the Swedish one is used.
    pub name_is_swedish: bool,
    pub study_period_start: Option<NaiveDate>,
    pub study_period_end: Option<NaiveDate>,
    pub session_code: Option<String>,
    pub session_type_code: Option<String>,
    pub cancelled: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentPrograms {
    /// Self-contained courses only.
    NoProgram,
    Enrolled(Vec<ProgramEntry>),
}

pub const NO_PROGRAM: &str = "Self-contained courses - no program";

/// Flatten every tree of a study structure.
pub fn flatten(structure: &StudyStructure) -> StudentPrograms {
    if structure.structures.is_empty() {
        return StudentPrograms::NoProgram;
    }
    let trees: Vec<ProgramNode> = structure.structures.iter().map(ProgramNode::from).collect();
    StudentPrograms::Enrolled(trees.iter().flat_map(flatten_tree).collect())
}

/// Flatten one tree, depth-first, left to right.
pub fn flatten_tree(root: &ProgramNode) -> Vec<ProgramEntry> {
    let root_code = root.code().map(str::to_string);
    let mut leaves = Vec::new();
    root.leaves(&mut leaves);
    leaves
        .into_iter()
        .map(|leaf| {
            let program_code = leaf.code.clone().unwrap_or_default();
            let (program_name, name_is_swedish) = match (&leaf.name_en, &leaf.name_sv) {
                (Some(en), _) => (en.clone(), false),
                (None, Some(sv)) => {
                    warn!(program_code = %program_code, name = %sv, "No English program name, using Swedish");
                    (sv.clone(), true)
                }
                (None, None) => (String::new(), false),
            };
            ProgramEntry {
                program_code,
                root_code: root_code.clone(),
                program_name,
                name_is_swedish,
                study_period_start: leaf.study_period_start,
                study_period_end: leaf.study_period_end,
                session_code: leaf.session_code.clone(),
                session_type_code: leaf.session_type_code.clone(),
                cancelled: leaf.cancelled,
                completed: leaf.completed,
            }
        })
        .collect()
}

/// Drop cancelled entries; when more than one is left, also drop the ones
/// whose study period ended on or before `today`. A missing end date counts
/// as 1900-01-01.
pub fn retain_current(entries: Vec<ProgramEntry>, today: NaiveDate) -> Vec<ProgramEntry> {
    let remaining: Vec<ProgramEntry> = entries.into_iter().filter(|e| !e.cancelled).collect();
    if remaining.len() <= 1 {
        return remaining;
    }
    let missing = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
    remaining
        .into_iter()
        .filter(|e| e.study_period_end.unwrap_or(missing) > today)
        .collect()
}
