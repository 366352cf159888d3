// src/services/client.rs

//! Course outline API client.
//!
//! Walks the four levels of the catalog (departments, courses, sections,
//! section detail). Filtering happens at the level where the filtered field
//! first appears so that discarded items never cost a request further down.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    Config, CourseStub, DepartmentStub, FilterConfig, SectionGroups, SectionStub,
};

/// Read access to the remote catalog, one call per hierarchy level.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Departments offered this semester, minus excluded codes.
    ///
    /// A failed request is an error, never an empty list.
    async fn list_departments(&self) -> Result<Vec<DepartmentStub>>;

    /// Undergraduate courses offered by a department. A 404 is an empty list.
    async fn list_courses(&self, department: &DepartmentStub) -> Result<Vec<CourseStub>>;

    /// Sections of a course grouped by associated class. A 404 is an empty map.
    async fn list_sections(
        &self,
        department: &DepartmentStub,
        course: &CourseStub,
    ) -> Result<SectionGroups>;

    /// Raw detail payload of one section, or an empty object if it could not
    /// be fetched.
    async fn section_detail(
        &self,
        department: &DepartmentStub,
        course: &CourseStub,
        section: &SectionStub,
    ) -> Value;
}

/// HTTP implementation of [`CatalogSource`].
pub struct CatalogClient {
    client: Client,
    base_url: String,
    filters: FilterConfig,
    non_digits: Regex,
}

impl CatalogClient {
    /// Create a client with the configured user agent and timeout.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.crawler.user_agent)
            .timeout(Duration::from_secs(config.crawler.timeout_secs))
            .build()?;

        Self::with_client(client, &config.source.base_url, config.filters.clone())
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        filters: FilterConfig,
    ) -> Result<Self> {
        let non_digits = Regex::new(r"\D").map_err(|e| AppError::config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            filters,
            non_digits,
        })
    }

    /// Build a request URL by appending path segments to the base.
    ///
    /// The base may end in a query (`...?2025/summer`), so segments are
    /// concatenated rather than resolved.
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.trim_end_matches('/').to_string();
        for segment in segments {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }
        url
    }

    /// Whether a department survives the exclusion set.
    pub fn keep_department(&self, department: &DepartmentStub) -> bool {
        let code = department.code();
        !code.is_empty()
            && !self
                .filters
                .excluded_departments
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(code))
    }

    /// Whether a course survives the number cutoff and the title keywords.
    pub fn keep_course(&self, course: &CourseStub) -> bool {
        if let Some(number) = self.course_number_value(course.number()) {
            if number > u64::from(self.filters.course_number_cutoff) {
                return false;
            }
        } else {
            log::debug!("Course number {:?} has no digits; keeping it", course.text);
        }

        match &course.title {
            Some(title) => !self
                .filters
                .excluded_title_keywords
                .iter()
                .any(|keyword| !keyword.is_empty() && title.contains(keyword.as_str())),
            None => true,
        }
    }

    /// Numeric value of a course number ("105W" is 105).
    ///
    /// Digit strings too long for a `u64` saturate, so they stay above any cutoff.
    fn course_number_value(&self, number: &str) -> Option<u64> {
        let digits = self.non_digits.replace_all(number, "");
        if digits.is_empty() {
            return None;
        }
        Some(digits.parse().unwrap_or(u64::MAX))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Like [`get_json`](Self::get_json) but a 404 yields `T::default()`.
    async fn get_json_or_default<T: DeserializeOwned + Default>(&self, url: &str) -> Result<T> {
        match self.get_json(url).await {
            Err(e) if e.is_not_found() => {
                log::debug!("{url} returned 404; treating as empty");
                Ok(T::default())
            }
            other => other,
        }
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn list_departments(&self) -> Result<Vec<DepartmentStub>> {
        let url = self.url(&[]);
        let departments: Vec<DepartmentStub> = self.get_json(&url).await?;
        let total = departments.len();

        let kept: Vec<_> = departments
            .into_iter()
            .filter(|d| self.keep_department(d))
            .collect();

        log::info!("Found {} departments ({} excluded)", kept.len(), total - kept.len());
        Ok(kept)
    }

    async fn list_courses(&self, department: &DepartmentStub) -> Result<Vec<CourseStub>> {
        let url = self.url(&[department.path_segment()]);
        let courses: Vec<CourseStub> = self.get_json_or_default(&url).await?;
        let total = courses.len();

        let kept: Vec<_> = courses.into_iter().filter(|c| self.keep_course(c)).collect();

        log::debug!(
            "{}: {} courses kept of {}",
            department.code(),
            kept.len(),
            total
        );
        Ok(kept)
    }

    async fn list_sections(
        &self,
        department: &DepartmentStub,
        course: &CourseStub,
    ) -> Result<SectionGroups> {
        let url = self.url(&[department.path_segment(), course.path_segment()]);
        let sections: Vec<SectionStub> = self.get_json_or_default(&url).await?;

        let mut groups = SectionGroups::new();
        for section in sections {
            let group = section.associated_class.clone().unwrap_or_default();
            groups.entry(group).or_default().push(section);
        }
        Ok(groups)
    }

    async fn section_detail(
        &self,
        department: &DepartmentStub,
        course: &CourseStub,
        section: &SectionStub,
    ) -> Value {
        let url = self.url(&[
            department.path_segment(),
            course.path_segment(),
            section.path_segment(),
        ]);

        match self.get_json::<Value>(&url).await {
            Ok(detail) => detail,
            Err(e) => {
                log::warn!("Failed to fetch section detail {url}: {e}");
                Value::Object(serde_json::Map::new())
            }
        }
    }
}
