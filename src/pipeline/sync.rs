// src/pipeline/sync.rs

//! Catalog sweep: fetch everything, then reconcile every table.
//!
//! The traversal fans out per department, per course, and per section, each
//! level bounded by `crawler.max_concurrent`. Reconciliation starts only after
//! the whole snapshot has been assembled, so a failed fetch never leads to a
//! partial reconciliation.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{
    CatalogSnapshot, CourseStub, CrawlerConfig, DepartmentStub, Record, SectionRef, SectionStub,
    Table,
};
use crate::pipeline::reconcile::{TableChanges, reconcile};
use crate::services::{CatalogExtractor, CatalogSource};
use crate::storage::CatalogStore;

/// Request counts and skipped sections for one traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub departments: usize,
    pub courses: usize,
    pub sections: usize,
    /// Sections whose detail could not be fetched
    pub details_empty: usize,
    /// Sections whose detail was not a JSON object
    pub details_malformed: usize,
    /// Sections listed more than once; only the first is kept
    pub duplicate_sections: usize,
}

/// Summary of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub dry_run: bool,
    pub fetch: FetchStats,
    pub changes: BTreeMap<Table, TableChanges>,
}

impl SyncReport {
    pub fn total_inserted(&self) -> usize {
        self.changes.values().map(|c| c.inserted).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.changes.values().map(|c| c.deleted).sum()
    }
}

/// Walks the remote catalog and assembles a snapshot.
pub struct CatalogTraversal<'a> {
    source: &'a dyn CatalogSource,
    concurrency: usize,
    delay: Duration,
}

/// Drives the catalog traversal and reconciles the store against it.
pub struct CatalogSynchronizer<'a> {
    traversal: CatalogTraversal<'a>,
    store: &'a dyn CatalogStore,
    dry_run: bool,
}

impl<'a> CatalogSynchronizer<'a> {
    pub fn new(
        source: &'a dyn CatalogSource,
        store: &'a dyn CatalogStore,
        crawler: &CrawlerConfig,
    ) -> Self {
        Self {
            traversal: CatalogTraversal::new(source, crawler),
            store,
            dry_run: false,
        }
    }

    /// Compute and report changes without writing to the store.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fetch the full catalog, then reconcile all five tables.
    pub async fn fetch_and_sync_all(&self) -> Result<SyncReport> {
        let start_time = Utc::now();

        let (snapshot, fetch) = self.fetch_snapshot().await?;
        let changes = self.sync_snapshot(&snapshot).await?;

        let report = SyncReport {
            start_time,
            end_time: Utc::now(),
            dry_run: self.dry_run,
            fetch,
            changes,
        };
        log::info!(
            "Sweep finished in {}s: +{} -{} rows",
            (report.end_time - report.start_time).num_seconds(),
            report.total_inserted(),
            report.total_deleted()
        );
        Ok(report)
    }

    /// Traverse the catalog without reconciling.
    pub async fn fetch_snapshot(&self) -> Result<(CatalogSnapshot, FetchStats)> {
        self.traversal.fetch_snapshot().await
    }

    /// Reconcile every table against a complete snapshot, parents first.
    pub async fn sync_snapshot(
        &self,
        snapshot: &CatalogSnapshot,
    ) -> Result<BTreeMap<Table, TableChanges>> {
        snapshot.validate()?;

        let store = self.store;
        let dry_run = self.dry_run;
        let mut changes = BTreeMap::new();
        changes.insert(
            Table::Departments,
            reconcile(store, &snapshot.departments, dry_run).await?,
        );
        changes.insert(
            Table::Courses,
            reconcile(store, &snapshot.courses, dry_run).await?,
        );
        changes.insert(
            Table::Sections,
            reconcile(store, &snapshot.sections, dry_run).await?,
        );
        changes.insert(
            Table::Instructors,
            reconcile(store, &snapshot.instructors, dry_run).await?,
        );
        changes.insert(
            Table::Meetings,
            reconcile(store, &snapshot.meetings, dry_run).await?,
        );
        Ok(changes)
    }
}

impl<'a> CatalogTraversal<'a> {
    pub fn new(source: &'a dyn CatalogSource, crawler: &CrawlerConfig) -> Self {
        Self {
            source,
            concurrency: crawler.max_concurrent.max(1),
            delay: Duration::from_millis(crawler.request_delay_ms),
        }
    }

    /// Walk departments, courses, and sections and extract every section.
    ///
    /// Fails on the first transport error. Sections whose detail is empty or
    /// malformed are skipped and counted.
    pub async fn fetch_snapshot(&self) -> Result<(CatalogSnapshot, FetchStats)> {
        let departments = self.source.list_departments().await?;
        let mut stats = FetchStats {
            departments: departments.len(),
            ..FetchStats::default()
        };
        let mut snapshot = CatalogSnapshot::with_departments(departments.iter().map(|d| d.code()));

        // Stage 1: course listings per department.
        let course_lists: Vec<(&DepartmentStub, Vec<CourseStub>)> = stream::iter(&departments)
            .map(|dept| async move {
                self.pace().await;
                let courses = self.source.list_courses(dept).await?;
                Ok::<_, AppError>((dept, courses))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let course_jobs: Vec<(&DepartmentStub, &CourseStub)> = course_lists
            .iter()
            .flat_map(|(dept, courses)| courses.iter().map(move |course| (*dept, course)))
            .collect();
        stats.courses = course_jobs.len();
        log::info!(
            "Listing sections for {} courses in {} departments",
            stats.courses,
            stats.departments
        );

        // Stage 2: section listings per course.
        let section_lists: Vec<(&DepartmentStub, &CourseStub, Vec<SectionStub>)> =
            stream::iter(course_jobs)
                .map(|(dept, course)| async move {
                    self.pace().await;
                    let groups = self.source.list_sections(dept, course).await?;
                    let sections = groups.into_values().flatten().collect::<Vec<_>>();
                    Ok::<_, AppError>((dept, course, sections))
                })
                .buffered(self.concurrency)
                .try_collect()
                .await?;

        let section_jobs: Vec<(&DepartmentStub, &CourseStub, &SectionStub)> = section_lists
            .iter()
            .flat_map(|(dept, course, sections)| {
                sections.iter().map(move |section| (*dept, *course, section))
            })
            .collect();
        stats.sections = section_jobs.len();
        log::info!("Fetching detail for {} sections", stats.sections);

        // Stage 3: detail per section. Never fails.
        let mut details = stream::iter(section_jobs)
            .map(|(dept, course, section)| async move {
                self.pace().await;
                let detail = self.source.section_detail(dept, course, section).await;
                let key = SectionRef::new(dept.code(), course.number(), section.code());
                (key, detail)
            })
            .buffered(self.concurrency);

        let mut seen_sections = HashSet::new();
        while let Some((key, detail)) = details.next().await {
            if is_empty_object(&detail) {
                stats.details_empty += 1;
                log::warn!("No usable detail for {key}; skipping section");
                continue;
            }
            match CatalogExtractor::extract(&detail, &key) {
                Ok(records) if !seen_sections.insert(records.section.key()) => {
                    stats.duplicate_sections += 1;
                    log::warn!("Section {key} listed more than once; keeping the first");
                }
                Ok(records) => snapshot.push(records),
                Err(e) => {
                    stats.details_malformed += 1;
                    log::warn!("Skipping section {key}: {e}");
                }
            }
        }

        snapshot.dedup();
        log::info!(
            "Snapshot: {} departments, {} courses, {} sections, {} instructors, {} meetings",
            snapshot.departments.len(),
            snapshot.courses.len(),
            snapshot.sections.len(),
            snapshot.instructors.len(),
            snapshot.meetings.len()
        );
        Ok((snapshot, stats))
    }

    async fn pace(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterConfig, RowKey};
    use crate::services::CatalogClient;
    use crate::storage::LocalStore;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, url_path: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn cmpt_120_d100() -> Value {
        json!({
            "title": "Introduction to Computing Science and Programming I",
            "units": "3",
            "designation": "Quantitative/Breadth-Science",
            "deliveryMethod": "In Person",
            "classType": "e",
            "enrollmentCapacity": "200",
            "enrollmentTotal": "187",
            "instructor": ["Ada Lovelace"],
            "meetingTimes": [
                {"days": "Mo, We", "startTime": "12:30", "endTime": "14:20", "campus": "Burnaby"},
                {"days": "Fr", "startTime": "12:30", "endTime": "13:20", "campus": "Burnaby"},
            ],
        })
    }

    fn cmpt_120_d101() -> Value {
        json!({
            "title": "Introduction to Computing Science and Programming I",
            "units": "3",
            "classType": "n",
            "meetingTimes": [
                {"days": "Tu", "startTime": "09:30", "endTime": "10:20", "scheduleType": "LAB"},
            ],
        })
    }

    /// CMPT offers 120 (two sections) and 999 (graduate). ABCD offers 100.
    async fn mount_catalog(server: &MockServer, with_abcd: bool) {
        let mut departments = vec![json!({"text": "CMPT", "value": "cmpt"})];
        if with_abcd {
            departments.push(json!({"text": "ABCD", "value": "abcd"}));
        }
        mount(server, "/outlines", 200, Value::Array(departments)).await;

        mount(
            server,
            "/outlines/cmpt",
            200,
            json!([
                {"text": "120", "value": "120", "title": "Intro to Computing"},
                {"text": "999", "value": "999", "title": "Thesis"},
            ]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/outlines/cmpt/999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(server)
            .await;
        mount(
            server,
            "/outlines/cmpt/120",
            200,
            json!([
                {"text": "D100", "value": "d100", "associatedClass": "1"},
                {"text": "D101", "value": "d101", "associatedClass": "1"},
            ]),
        )
        .await;
        mount(server, "/outlines/cmpt/120/d100", 200, cmpt_120_d100()).await;
        mount(server, "/outlines/cmpt/120/d101", 200, cmpt_120_d101()).await;

        mount(server, "/outlines/abcd", 200, json!([{"text": "100", "value": "100"}])).await;
        mount(
            server,
            "/outlines/abcd/100",
            200,
            json!([{"text": "D100", "value": "d100", "associatedClass": "1"}]),
        )
        .await;
        mount(
            server,
            "/outlines/abcd/100/d100",
            200,
            json!({"title": "Basics", "instructor": ["Grace Hopper"], "meetingTimes": []}),
        )
        .await;
    }

    fn client(server: &MockServer) -> CatalogClient {
        CatalogClient::with_client(
            reqwest::Client::new(),
            format!("{}/outlines", server.uri()),
            FilterConfig::default(),
        )
        .unwrap()
    }

    async fn all_keys(store: &LocalStore) -> Vec<(Table, RowKey)> {
        let mut keys = Vec::new();
        for table in Table::ALL {
            for key in store.select_keys(table).await.unwrap() {
                keys.push((table, key));
            }
        }
        keys
    }

    #[tokio::test]
    async fn test_sweep_populates_every_table() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);

        let report = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .fetch_and_sync_all()
            .await
            .unwrap();

        assert_eq!(report.fetch.departments, 2);
        assert_eq!(report.fetch.courses, 2);
        assert_eq!(report.fetch.sections, 3);
        assert_eq!(report.changes[&Table::Departments].inserted, 2);
        assert_eq!(report.changes[&Table::Courses].inserted, 2);
        assert_eq!(report.changes[&Table::Sections].inserted, 3);
        assert_eq!(report.changes[&Table::Instructors].inserted, 2);
        assert_eq!(report.changes[&Table::Meetings].inserted, 3);

        let mut courses = store.select_keys(Table::Courses).await.unwrap();
        courses.sort();
        assert_eq!(
            courses,
            vec![RowKey::new(["ABCD", "100"]), RowKey::new(["CMPT", "120"])]
        );

        // 999 is over the cutoff and its sections are never requested.
        server.verify().await;
    }

    #[tokio::test]
    async fn test_second_sweep_is_idempotent() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);
        let sync = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default());

        sync.fetch_and_sync_all().await.unwrap();
        let second = sync.fetch_and_sync_all().await.unwrap();

        assert_eq!(second.total_inserted(), 0);
        assert_eq!(second.total_deleted(), 0);
    }

    #[tokio::test]
    async fn test_dropped_department_leaves_no_rows() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);
        let sync = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default());

        sync.fetch_and_sync_all().await.unwrap();
        assert!(
            all_keys(&store)
                .await
                .iter()
                .any(|(_, key)| key.department() == Some("ABCD"))
        );

        server.reset().await;
        mount_catalog(&server, false).await;
        let report = sync.fetch_and_sync_all().await.unwrap();

        assert_eq!(report.changes[&Table::Departments].deleted, 1);
        assert_eq!(report.changes[&Table::Instructors].deleted, 1);
        let remaining = all_keys(&store).await;
        assert!(!remaining.is_empty());
        assert!(
            remaining
                .iter()
                .all(|(_, key)| key.department() == Some("CMPT"))
        );
        assert_eq!(
            store.select_keys(Table::Departments).await.unwrap(),
            vec![RowKey::new(["CMPT"])]
        );
    }

    #[tokio::test]
    async fn test_department_not_found_yields_no_courses() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/outlines",
            200,
            json!([{"text": "HIST", "value": "hist"}]),
        )
        .await;
        mount(&server, "/outlines/hist", 404, json!({"message": "not found"})).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);

        let report = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .fetch_and_sync_all()
            .await
            .unwrap();

        assert_eq!(report.fetch.courses, 0);
        assert_eq!(
            store.select_keys(Table::Departments).await.unwrap(),
            vec![RowKey::new(["HIST"])]
        );
        assert!(store.select_keys(Table::Courses).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_course_without_section_list_contributes_no_rows() {
        let server = MockServer::start().await;
        mount(&server, "/outlines", 200, json!([{"text": "CMPT", "value": "cmpt"}])).await;
        mount(
            &server,
            "/outlines/cmpt",
            200,
            json!([
                {"text": "120", "value": "120", "title": "Intro to Computing"},
                {"text": "130", "value": "130", "title": "Intro to Programming"},
            ]),
        )
        .await;
        mount(
            &server,
            "/outlines/cmpt/120",
            200,
            json!([{"text": "D100", "value": "d100", "associatedClass": "1"}]),
        )
        .await;
        mount(&server, "/outlines/cmpt/120/d100", 200, cmpt_120_d100()).await;
        mount(&server, "/outlines/cmpt/130", 404, json!({"message": "not found"})).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);

        let report = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .fetch_and_sync_all()
            .await
            .unwrap();

        assert_eq!(report.fetch.courses, 2);
        assert_eq!(report.fetch.sections, 1);
        assert_eq!(
            store.select_keys(Table::Courses).await.unwrap(),
            vec![RowKey::new(["CMPT", "120"])]
        );
        let sections = store.select_keys(Table::Sections).await.unwrap();
        assert!(sections.iter().all(|key| key.parts()[1] == "120"));
    }

    #[tokio::test]
    async fn test_repeated_section_listing_keeps_one_set_of_rows() {
        let server = MockServer::start().await;
        mount(&server, "/outlines", 200, json!([{"text": "CMPT", "value": "cmpt"}])).await;
        mount(
            &server,
            "/outlines/cmpt",
            200,
            json!([{"text": "120", "value": "120", "title": "Intro to Computing"}]),
        )
        .await;
        mount(
            &server,
            "/outlines/cmpt/120",
            200,
            json!([
                {"text": "D100", "value": "d100", "associatedClass": "1"},
                {"text": "D100", "value": "d100", "associatedClass": "2"},
            ]),
        )
        .await;
        mount(&server, "/outlines/cmpt/120/d100", 200, cmpt_120_d100()).await;
        let source = client(&server);

        let (snapshot, stats) = CatalogTraversal::new(&source, &CrawlerConfig::default())
            .fetch_snapshot()
            .await
            .unwrap();

        assert_eq!(stats.sections, 2);
        assert_eq!(stats.duplicate_sections, 1);
        assert_eq!(snapshot.sections.len(), 1);
        assert_eq!(snapshot.instructors.len(), 1);
        let ordinals: Vec<_> = snapshot.meetings.iter().map(|m| m.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert!(snapshot.validate().is_ok());
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_before_reconciling() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);
        let sync = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default());
        sync.fetch_and_sync_all().await.unwrap();
        let before = all_keys(&store).await;

        server.reset().await;
        mount(
            &server,
            "/outlines",
            200,
            json!([{"text": "CMPT", "value": "cmpt"}]),
        )
        .await;
        mount(&server, "/outlines/cmpt", 200, json!([{"text": "120", "value": "120"}])).await;
        mount(&server, "/outlines/cmpt/120", 502, json!({})).await;

        let err = sync.fetch_and_sync_all().await.unwrap_err();
        assert!(matches!(err, AppError::Status { .. }));
        assert_eq!(all_keys(&store).await, before);
    }

    #[tokio::test]
    async fn test_unusable_details_skip_only_their_section() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/outlines",
            200,
            json!([{"text": "CMPT", "value": "cmpt"}]),
        )
        .await;
        mount(&server, "/outlines/cmpt", 200, json!([{"text": "120", "value": "120"}])).await;
        mount(
            &server,
            "/outlines/cmpt/120",
            200,
            json!([
                {"text": "D100", "value": "d100", "associatedClass": "1"},
                {"text": "D101", "value": "d101", "associatedClass": "1"},
                {"text": "D102", "value": "d102", "associatedClass": "1"},
            ]),
        )
        .await;
        mount(&server, "/outlines/cmpt/120/d100", 200, cmpt_120_d100()).await;
        mount(&server, "/outlines/cmpt/120/d101", 500, json!({})).await;
        mount(&server, "/outlines/cmpt/120/d102", 200, json!(["not", "an", "object"])).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);

        let report = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .fetch_and_sync_all()
            .await
            .unwrap();

        assert_eq!(report.fetch.details_empty, 1);
        assert_eq!(report.fetch.details_malformed, 1);
        assert_eq!(
            store.select_keys(Table::Sections).await.unwrap(),
            vec![RowKey::new(["CMPT", "120", "D100"])]
        );
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_writing() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);

        let report = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .dry_run(true)
            .fetch_and_sync_all()
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.changes[&Table::Sections].inserted, 3);
        assert!(all_keys(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_traversal_matches_concurrent() {
        let server = MockServer::start().await;
        mount_catalog(&server, true).await;
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let source = client(&server);
        let sequential = CrawlerConfig {
            max_concurrent: 1,
            ..CrawlerConfig::default()
        };

        let (one, _) = CatalogSynchronizer::new(&source, &store, &sequential)
            .fetch_snapshot()
            .await
            .unwrap();
        let (many, _) = CatalogSynchronizer::new(&source, &store, &CrawlerConfig::default())
            .fetch_snapshot()
            .await
            .unwrap();

        assert_eq!(one, many);
        assert_eq!(one.meetings[1].ordinal, 1);
    }
}
