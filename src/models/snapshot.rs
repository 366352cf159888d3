// src/models/snapshot.rs

//! The full normalized result of one sweep.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    Course, Department, InstructorAssignment, Meeting, Record, RowKey, Section, SectionRecords,
};

/// All entities fetched in one sweep, accumulated before reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub departments: Vec<Department>,
    pub courses: Vec<Course>,
    pub sections: Vec<Section>,
    pub instructors: Vec<InstructorAssignment>,
    pub meetings: Vec<Meeting>,
}

impl CatalogSnapshot {
    /// Start a snapshot from the fetched department codes.
    pub fn with_departments<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            departments: codes
                .into_iter()
                .map(|code| Department {
                    dept_code: code.into(),
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Append the records extracted from one section.
    pub fn push(&mut self, records: SectionRecords) {
        self.courses.push(records.course);
        self.sections.push(records.section);
        self.instructors.extend(records.instructors);
        self.meetings.extend(records.meetings);
    }

    /// Collapse repeated department and course keys to their first occurrence.
    ///
    /// Every section payload carries its course, so repeated course keys are
    /// expected. Sections are not touched here: a repeated section must be
    /// dropped together with its instructors and meetings before `push`.
    pub fn dedup(&mut self) {
        dedup_by_key(&mut self.departments);
        dedup_by_key(&mut self.courses);
    }

    /// Check that every child row has its parent in this snapshot.
    pub fn validate(&self) -> Result<()> {
        let departments: HashSet<RowKey> = self.departments.iter().map(Record::key).collect();
        let courses: HashSet<RowKey> = self.courses.iter().map(Record::key).collect();
        let sections: HashSet<RowKey> = self.sections.iter().map(Record::key).collect();

        if sections.len() != self.sections.len() {
            let mut seen = HashSet::new();
            if let Some(section) = self.sections.iter().find(|s| !seen.insert(s.key())) {
                return Err(AppError::validation(format!(
                    "section {} appears more than once in this snapshot",
                    section.key()
                )));
            }
        }

        if let Some(course) = self
            .courses
            .iter()
            .find(|c| !departments.contains(&RowKey::new([c.dept_code.as_str()])))
        {
            return Err(orphan("course", &course.key(), "department"));
        }
        if let Some(section) = self
            .sections
            .iter()
            .find(|s| !courses.contains(&s.course_key()))
        {
            return Err(orphan("section", &section.key(), "course"));
        }
        if let Some(instructor) = self
            .instructors
            .iter()
            .find(|i| !sections.contains(&i.section_key()))
        {
            return Err(orphan("instructor", &instructor.key(), "section"));
        }
        if let Some(meeting) = self
            .meetings
            .iter()
            .find(|m| !sections.contains(&m.section_key()))
        {
            return Err(orphan("meeting", &meeting.key(), "section"));
        }
        Ok(())
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.departments.len()
            + self.courses.len()
            + self.sections.len()
            + self.instructors.len()
            + self.meetings.len()
    }
}

fn orphan(kind: &str, key: &RowKey, parent: &str) -> AppError {
    AppError::validation(format!("{kind} {key} has no {parent} in this snapshot"))
}

fn dedup_by_key<R: Record>(items: &mut Vec<R>) -> usize {
    let before = items.len();
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.key()));
    before - items.len()
}
