//! Grade scales loaded once per session, and the pre-flight grade checks.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub id: i64,
    pub code: String,
    /// Valid as a final course grade.
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeScale {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub grades: Vec<Grade>,
}

impl GradeScale {
    pub fn grade(&self, code: &str) -> Option<&Grade> {
        self.grades.iter().find(|g| g.code == code)
    }
}

/// Every grade scale of the installation, indexed by scale code, scale id and grade id.
#[derive(Debug, Clone, Default)]
pub struct GradeScaleSet {
    scales: Vec<GradeScale>,
    by_code: HashMap<String, usize>,
    by_id: HashMap<i64, usize>,
    grade_by_id: HashMap<i64, (usize, usize)>,
}

impl GradeScaleSet {
    /// Index `scales`, rejecting duplicate scale codes, scale ids or grade ids.
    pub fn new(scales: Vec<GradeScale>) -> Result<Self> {
        let mut set = GradeScaleSet::default();
        for (si, scale) in scales.iter().enumerate() {
            if set.by_code.insert(scale.code.clone(), si).is_some() {
                return Err(duplicate("grade scale code", &scale.code));
            }
            if set.by_id.insert(scale.id, si).is_some() {
                return Err(duplicate("grade scale id", &scale.id.to_string()));
            }
            for (gi, grade) in scale.grades.iter().enumerate() {
                if set.grade_by_id.insert(grade.id, (si, gi)).is_some() {
                    return Err(duplicate("grade id", &grade.id.to_string()));
                }
            }
        }
        set.scales = scales;
        Ok(set)
    }

    /// Decode the `/resultat/grunddata/betygsskala` response.
    pub fn from_reference_data(body: &RawGradeScales) -> Result<Self> {
        let scales = body
            .scales
            .iter()
            .map(|raw| GradeScale {
                id: raw.id,
                code: raw.code.clone(),
                name: raw.name.get("sv").cloned().unwrap_or_default(),
                grades: raw
                    .grades
                    .iter()
                    .map(|g| Grade {
                        id: g.id,
                        code: g.code.clone(),
                        accepted: g.accepted,
                    })
                    .collect(),
            })
            .collect();
        Self::new(scales)
    }

    pub fn all(&self) -> &[GradeScale] {
        &self.scales
    }

    pub fn by_code(&self, code: &str) -> Option<&GradeScale> {
        self.by_code.get(code).map(|&i| &self.scales[i])
    }

    pub fn by_id(&self, id: i64) -> Option<&GradeScale> {
        self.by_id.get(&id).map(|&i| &self.scales[i])
    }

    pub fn grade_by_id(&self, id: i64) -> Option<(&GradeScale, &Grade)> {
        self.grade_by_id.get(&id).map(|&(si, gi)| {
            let scale = &self.scales[si];
            (scale, &scale.grades[gi])
        })
    }

    /// The checks a grade must pass before anything is sent to Ladok.
    pub fn check(&self, grade: &str, scale_code: &str) -> Result<(&GradeScale, &Grade)> {
        let mismatch = || Error::GradeScaleMismatch {
            grade: grade.to_string(),
            scale: scale_code.to_string(),
        };
        if grade == "AF" || grade == "PF" {
            return Err(mismatch());
        }
        let letter = matches!(grade, "A" | "B" | "C" | "D" | "E");
        if (grade == "P" && scale_code == "AF") || (letter && scale_code == "PF") {
            return Err(mismatch());
        }
        let scale = self.by_code(scale_code).ok_or_else(mismatch)?;
        let found = scale.grade(grade).ok_or_else(mismatch)?;
        Ok((scale, found))
    }
}

fn duplicate(what: &str, value: &str) -> Error {
    Error::remote(
        "/resultat/grunddata/betygsskala",
        format!("duplicate {what} {value} in reference data"),
    )
}

#[derive(Debug, Deserialize)]
pub struct RawGradeScales {
    #[serde(rename = "Betygsskala", default)]
    pub scales: Vec<RawGradeScale>,
}

#[derive(Debug, Deserialize)]
pub struct RawGradeScale {
    #[serde(rename = "ID", deserialize_with = "int_or_string")]
    pub id: i64,
    #[serde(rename = "Kod")]
    pub code: String,
    #[serde(rename = "Benamning", default)]
    pub name: HashMap<String, String>,
    #[serde(rename = "Betygsgrad", default)]
    pub grades: Vec<RawGrade>,
}

#[derive(Debug, Deserialize)]
pub struct RawGrade {
    #[serde(rename = "ID", deserialize_with = "int_or_string")]
    pub id: i64,
    #[serde(rename = "Kod")]
    pub code: String,
    #[serde(rename = "GiltigSomSlutbetyg", default)]
    pub accepted: bool,
}

/// Ladok sends numeric ids either as JSON numbers or as strings.
pub(crate) fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(i) => Ok(i),
        IntOrString::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
