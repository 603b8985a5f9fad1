//! Document kinds

use crate::catalog::StepId;
use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five partnership document categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Kind {
    /// Minutes of meeting
    Mom,
    /// Non-disclosure agreement
    Nda,
    /// Needs justification
    Jik,
    /// Master service agreement
    Msa,
    /// Memorandum of understanding
    Mou,
}

/// Where a kind keeps its artifact and how it comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactPolicy {
    /// The file is uploaded by a user and stored on a separate entity
    Uploaded,
    /// The file is rendered on demand by the document generator
    Generated,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::Mom, Kind::Nda, Kind::Jik, Kind::Msa, Kind::Mou];

    /// Catalog step for this kind
    pub fn step(self) -> StepId {
        match self {
            Kind::Mom => StepId(1),
            Kind::Nda => StepId(2),
            Kind::Jik => StepId(3),
            Kind::Msa => StepId(4),
            Kind::Mou => StepId(5),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Mom => "MOM",
            Kind::Nda => "NDA",
            Kind::Jik => "JIK",
            Kind::Msa => "MSA",
            Kind::Mou => "MOU",
        }
    }

    pub fn artifact_policy(self) -> ArtifactPolicy {
        match self {
            Kind::Mom | Kind::Jik => ArtifactPolicy::Generated,
            Kind::Nda | Kind::Msa | Kind::Mou => ArtifactPolicy::Uploaded,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOM" => Ok(Kind::Mom),
            "NDA" => Ok(Kind::Nda),
            "JIK" => Ok(Kind::Jik),
            "MSA" => Ok(Kind::Msa),
            "MOU" => Ok(Kind::Mou),
            _ => Err(TypeError::UnknownKind(s.to_string())),
        }
    }
}
