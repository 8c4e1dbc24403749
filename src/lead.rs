use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => bail!("Unknown plan: {other}. Expected free or premium"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum University {
    Imperial,
    Ucl,
    Lse,
    Oxford,
    Cambridge,
    Other,
}

impl University {
    pub const ALL: [University; 6] = [
        Self::Imperial,
        Self::Ucl,
        Self::Lse,
        Self::Oxford,
        Self::Cambridge,
        Self::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Imperial => "imperial",
            Self::Ucl => "ucl",
            Self::Lse => "lse",
            Self::Oxford => "oxford",
            Self::Cambridge => "cambridge",
            Self::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Imperial => "Imperial College London",
            Self::Ucl => "University College London (UCL)",
            Self::Lse => "London School of Economics (LSE)",
            Self::Oxford => "University of Oxford",
            Self::Cambridge => "University of Cambridge",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for University {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for University {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|university| university.code() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown university: {normalized}"))
    }
}

/// A stored signup record. `created_at` is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub university: University,
    pub selected_plan: Plan,
    pub created_at: DateTime<Utc>,
}

/// A validated signup waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLead {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub university: University,
    pub selected_plan: Plan,
}

impl NewLead {
    pub fn into_lead(self, id: Option<String>, created_at: DateTime<Utc>) -> Lead {
        Lead {
            id,
            email: self.email,
            name: self.name,
            phone: self.phone,
            university: self.university,
            selected_plan: self.selected_plan,
            created_at,
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
