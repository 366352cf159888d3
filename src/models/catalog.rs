// src/models/catalog.rs

//! Normalized catalog entities and their table bindings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// A persisted row as a JSON object keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// The five logical tables of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Departments,
    Courses,
    Sections,
    Instructors,
    Meetings,
}

impl Table {
    /// All tables, parents before children.
    pub const ALL: [Table; 5] = [
        Table::Departments,
        Table::Courses,
        Table::Sections,
        Table::Instructors,
        Table::Meetings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Departments => "departments",
            Table::Courses => "courses",
            Table::Sections => "sections",
            Table::Instructors => "instructors",
            Table::Meetings => "meetings",
        }
    }

    /// Columns forming the natural key, in key order.
    pub fn key_columns(self) -> &'static [&'static str] {
        match self {
            Table::Departments => &["dept_code"],
            Table::Courses => &["dept_code", "course_number"],
            Table::Sections => &["dept_code", "course_number", "section_code"],
            Table::Instructors => &["dept_code", "course_number", "section_code", "name"],
            Table::Meetings => &["dept_code", "course_number", "section_code", "ordinal"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Natural key of a row, one string per key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(pub Vec<String>);

impl RowKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Read the key columns of `table` out of a stored row.
    pub fn from_row(table: Table, row: &Row) -> Result<Self> {
        table
            .key_columns()
            .iter()
            .map(|column| match row.get(*column) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                Some(Value::Bool(b)) => Ok(b.to_string()),
                _ => Err(AppError::store(format!(
                    "{table} row is missing key column {column}"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether this key belongs to the given department.
    pub fn department(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// An entity stored in one of the catalog tables.
pub trait Record: Serialize + Clone + Send + Sync {
    const TABLE: Table;

    fn key(&self) -> RowKey;

    fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            other => Err(AppError::store(format!(
                "{} record serialized to {other}, expected an object",
                Self::TABLE
            ))),
        }
    }
}

/// Hierarchical position of a section in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionRef {
    pub dept_code: String,
    pub course_number: String,
    pub section_code: String,
}

impl SectionRef {
    pub fn new(
        dept_code: impl Into<String>,
        course_number: impl Into<String>,
        section_code: impl Into<String>,
    ) -> Self {
        Self {
            dept_code: dept_code.into(),
            course_number: course_number.into(),
            section_code: section_code.into(),
        }
    }
}

impl fmt::Display for SectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.dept_code, self.course_number, self.section_code
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub dept_code: String,
}

impl Record for Department {
    const TABLE: Table = Table::Departments;

    fn key(&self) -> RowKey {
        RowKey::new([self.dept_code.as_str()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub dept_code: String,
    pub course_number: String,
    pub title: Option<String>,
    pub units: Option<String>,
    pub prerequisites: Option<String>,
    pub corequisites: Option<String>,
    pub designation: Option<String>,
    pub delivery_method: Option<String>,
    pub short_note: Option<String>,
}

impl Record for Course {
    const TABLE: Table = Table::Courses;

    fn key(&self) -> RowKey {
        RowKey::new([self.dept_code.as_str(), self.course_number.as_str()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub dept_code: String,
    pub course_number: String,
    pub section_code: String,
    pub class_type: Option<String>,
    pub class_number: Option<String>,
    pub associated_class: Option<String>,
    pub enrollment_capacity: Option<u32>,
    pub enrollment_total: Option<u32>,
}

impl Section {
    pub fn course_key(&self) -> RowKey {
        RowKey::new([self.dept_code.as_str(), self.course_number.as_str()])
    }
}

impl Record for Section {
    const TABLE: Table = Table::Sections;

    fn key(&self) -> RowKey {
        RowKey::new([
            self.dept_code.as_str(),
            self.course_number.as_str(),
            self.section_code.as_str(),
        ])
    }
}

/// One instructor named on one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorAssignment {
    pub dept_code: String,
    pub course_number: String,
    pub section_code: String,
    pub name: String,
}

impl InstructorAssignment {
    pub fn section_key(&self) -> RowKey {
        section_key(&self.dept_code, &self.course_number, &self.section_code)
    }
}

impl Record for InstructorAssignment {
    const TABLE: Table = Table::Instructors;

    fn key(&self) -> RowKey {
        RowKey::new([
            self.dept_code.as_str(),
            self.course_number.as_str(),
            self.section_code.as_str(),
            self.name.as_str(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub dept_code: String,
    pub course_number: String,
    pub section_code: String,
    /// Position in the source's meeting list
    pub ordinal: u32,
    pub days: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub campus: Option<String>,
    pub meeting_type: Option<String>,
}

impl Meeting {
    pub fn section_key(&self) -> RowKey {
        section_key(&self.dept_code, &self.course_number, &self.section_code)
    }
}

impl Record for Meeting {
    const TABLE: Table = Table::Meetings;

    fn key(&self) -> RowKey {
        RowKey::new([
            self.dept_code.clone(),
            self.course_number.clone(),
            self.section_code.clone(),
            self.ordinal.to_string(),
        ])
    }
}

fn section_key(dept_code: &str, course_number: &str, section_code: &str) -> RowKey {
    RowKey::new([dept_code, course_number, section_code])
}

/// Everything extracted from one section detail payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecords {
    pub course: Course,
    pub section: Section,
    pub instructors: Vec<InstructorAssignment>,
    pub meetings: Vec<Meeting>,
}
