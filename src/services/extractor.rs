// src/services/extractor.rs

//! Section detail extraction.
//!
//! Turns one raw section detail payload into normalized course, section,
//! instructor, and meeting records. No I/O happens here.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    Course, InstructorAssignment, Meeting, Section, SectionDetail, SectionRecords, SectionRef,
};

/// Stateless converter from raw detail payloads to catalog records.
pub struct CatalogExtractor;

impl CatalogExtractor {
    /// Decode a raw payload into its typed form.
    ///
    /// Fails only when the payload is not a JSON object.
    pub fn decode(payload: &Value, context: &SectionRef) -> Result<SectionDetail> {
        if !payload.is_object() {
            return Err(AppError::malformed(
                context.to_string(),
                format!("expected an object, got {}", kind(payload)),
            ));
        }
        SectionDetail::deserialize(payload).map_err(|e| AppError::malformed(context.to_string(), e))
    }

    /// Extract all four record kinds from one payload.
    pub fn extract(payload: &Value, section: &SectionRef) -> Result<SectionRecords> {
        let detail = Self::decode(payload, section)?;
        Ok(SectionRecords {
            course: course_from(&detail, &section.dept_code, &section.course_number),
            section: section_from(&detail, section),
            instructors: instructors_from(&detail, section),
            meetings: meetings_from(&detail, section),
        })
    }

    pub fn extract_course(payload: &Value, dept_code: &str, course_number: &str) -> Result<Course> {
        let context = SectionRef::new(dept_code, course_number, "");
        let detail = Self::decode(payload, &context)?;
        Ok(course_from(&detail, dept_code, course_number))
    }

    pub fn extract_section(
        payload: &Value,
        dept_code: &str,
        course_number: &str,
        section_code: &str,
    ) -> Result<Section> {
        let section = SectionRef::new(dept_code, course_number, section_code);
        let detail = Self::decode(payload, &section)?;
        Ok(section_from(&detail, &section))
    }

    /// One record per named instructor, in source order. Repeated names are
    /// kept.
    pub fn extract_instructors(
        payload: &Value,
        dept_code: &str,
        course_number: &str,
        section_code: &str,
    ) -> Result<Vec<InstructorAssignment>> {
        let section = SectionRef::new(dept_code, course_number, section_code);
        let detail = Self::decode(payload, &section)?;
        Ok(instructors_from(&detail, &section))
    }

    /// One record per meeting entry; `ordinal` is the position in the list.
    pub fn extract_meetings(
        payload: &Value,
        dept_code: &str,
        course_number: &str,
        section_code: &str,
    ) -> Result<Vec<Meeting>> {
        let section = SectionRef::new(dept_code, course_number, section_code);
        let detail = Self::decode(payload, &section)?;
        Ok(meetings_from(&detail, &section))
    }
}

fn course_from(detail: &SectionDetail, dept_code: &str, course_number: &str) -> Course {
    Course {
        dept_code: dept_code.to_string(),
        course_number: course_number.to_string(),
        title: detail.title.clone(),
        units: detail.units.clone(),
        prerequisites: detail.prerequisites.clone(),
        corequisites: detail.corequisites.clone(),
        designation: detail.designation.clone(),
        delivery_method: detail.delivery_method.clone(),
        short_note: detail.short_note.clone(),
    }
}

fn section_from(detail: &SectionDetail, section: &SectionRef) -> Section {
    Section {
        dept_code: section.dept_code.clone(),
        course_number: section.course_number.clone(),
        section_code: section.section_code.clone(),
        class_type: detail.class_type.clone(),
        class_number: detail.class_number.clone(),
        associated_class: detail.associated_class.clone(),
        enrollment_capacity: detail.enrollment_capacity,
        enrollment_total: detail.enrollment_total,
    }
}

fn instructors_from(detail: &SectionDetail, section: &SectionRef) -> Vec<InstructorAssignment> {
    detail
        .instructor
        .iter()
        .filter_map(|entry| entry.name())
        .map(|name| InstructorAssignment {
            dept_code: section.dept_code.clone(),
            course_number: section.course_number.clone(),
            section_code: section.section_code.clone(),
            name: name.to_string(),
        })
        .collect()
}

fn meetings_from(detail: &SectionDetail, section: &SectionRef) -> Vec<Meeting> {
    detail
        .meeting_times
        .iter()
        .zip(0u32..)
        .map(|(entry, ordinal)| Meeting {
            dept_code: section.dept_code.clone(),
            course_number: section.course_number.clone(),
            section_code: section.section_code.clone(),
            ordinal,
            days: entry.days.clone(),
            start_time: entry.start_time.clone(),
            end_time: entry.end_time.clone(),
            location: entry.location.clone(),
            campus: entry.campus.clone(),
            meeting_type: entry.schedule_type.clone(),
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
