// src/models/payload.rs

//! Typed views of the course outline API responses.
//!
//! The API is loosely typed: counts arrive as numbers or strings, lists may be
//! `null`, and most fields are optional. Every field here is either optional or
//! defaults to empty so that decoding a JSON object never fails.

use serde::{Deserialize, Serialize};

/// One entry of the semester-root listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentStub {
    /// Department code as displayed (e.g. "CMPT")
    pub text: String,

    /// URL form of the code (e.g. "cmpt")
    #[serde(default, deserialize_with = "de::text")]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "de::text")]
    pub name: Option<String>,
}

impl DepartmentStub {
    pub fn code(&self) -> &str {
        self.text.trim()
    }

    pub fn path_segment(&self) -> &str {
        self.value.as_deref().unwrap_or_else(|| self.code())
    }
}

/// One entry of a department's course listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStub {
    /// Course number as displayed (e.g. "120", "105W")
    pub text: String,

    #[serde(default, deserialize_with = "de::text")]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "de::text")]
    pub title: Option<String>,
}

impl CourseStub {
    pub fn number(&self) -> &str {
        self.text.trim()
    }

    pub fn path_segment(&self) -> &str {
        self.value.as_deref().unwrap_or_else(|| self.number())
    }
}

/// One entry of a course's section listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStub {
    /// Section code as displayed (e.g. "D100")
    pub text: String,

    #[serde(default, deserialize_with = "de::text")]
    pub value: Option<String>,

    #[serde(default, deserialize_with = "de::text")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "de::text")]
    pub class_type: Option<String>,

    /// Component kind (e.g. "LEC", "LAB")
    #[serde(default, deserialize_with = "de::text")]
    pub section_code: Option<String>,

    /// Groups a lecture with its labs and tutorials
    #[serde(default, deserialize_with = "de::text")]
    pub associated_class: Option<String>,
}

impl SectionStub {
    pub fn code(&self) -> &str {
        self.text.trim()
    }

    pub fn path_segment(&self) -> &str {
        self.value.as_deref().unwrap_or_else(|| self.code())
    }
}

/// Per-section detail payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionDetail {
    #[serde(deserialize_with = "de::text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub units: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub class_number: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub prerequisites: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub corequisites: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub designation: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub short_note: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub delivery_method: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub class_type: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub associated_class: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub enrollment_capacity: Option<u32>,
    #[serde(deserialize_with = "de::count")]
    pub enrollment_total: Option<u32>,
    #[serde(deserialize_with = "de::list")]
    pub instructor: Vec<InstructorEntry>,
    /// One entry per source element; position is the meeting ordinal.
    #[serde(deserialize_with = "de::positional")]
    pub meeting_times: Vec<MeetingEntry>,
}

/// Instructor entries are bare names in some semesters and objects in others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstructorEntry {
    Name(String),
    Detailed {
        #[serde(default, deserialize_with = "de::text")]
        name: Option<String>,
    },
}

impl InstructorEntry {
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Self::Name(name) => name.as_str(),
            Self::Detailed { name } => name.as_deref()?,
        };
        let name = name.trim();
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingEntry {
    #[serde(deserialize_with = "de::text")]
    pub days: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub start_time: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub end_time: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub campus: Option<String>,
    #[serde(deserialize_with = "de::text")]
    pub schedule_type: Option<String>,
}

/// Lenient field decoders.
mod de {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Strings and scalars as trimmed text; blanks and containers as absent.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Non-negative integers given as numbers or numeric strings.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Arrays with undecodable elements replaced by `T::default()`, so every
    /// element keeps its position; `null` or non-arrays as empty.
    pub fn positional<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Arrays with undecodable elements dropped; `null` or non-arrays as empty.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}
