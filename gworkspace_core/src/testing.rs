//! In-process doubles for the factory, authenticator and service APIs.
//!
//! Stub clients record every operation into a shared [`CallLog`] and answer
//! with a small JSON echo, so tests can assert on routing without Google.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::{AuthenticatedHandle, Authenticator};
use crate::error::WorkspaceError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::services::api::*;
use crate::services::{ClientFactory, ResolvedDependencies, ServiceClient, ServiceKind};
use crate::tools::args::*;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: ServiceKind,
    pub operation: &'static str,
    /// `None` for the default identity.
    pub identity: Option<Fingerprint>,
    pub args: Value,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    fn push(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls().is_empty()
    }
}

/// One stub implementing every service trait. Each instance is a distinct client.
pub struct StubApi {
    service: ServiceKind,
    identity: Option<Fingerprint>,
    log: CallLog,
    calendar: Option<Arc<dyn CalendarApi>>,
}

impl StubApi {
    pub fn new(service: ServiceKind, identity: Option<Fingerprint>, log: CallLog) -> Self {
        Self {
            service,
            identity,
            log,
            calendar: None,
        }
    }

    fn record<A: Serialize>(&self, operation: &'static str, args: &A) -> Result<ToolOutput, WorkspaceError> {
        let args = serde_json::to_value(args)?;
        self.log.push(RecordedCall {
            service: self.service,
            operation,
            identity: self.identity.clone(),
            args: args.clone(),
        });
        Ok(ToolOutput::Json(json!({
            "service": self.service,
            "operation": operation,
            "args": args,
        })))
    }
}

#[async_trait]
impl CalendarApi for StubApi {
    async fn list_calendars(&self, args: &ListCalendarsArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_calendars", args)
    }
    async fn list_events(&self, args: &ListEventsArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_events", args)
    }
    async fn get_event(&self, args: &GetEventArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("get_event", args)
    }
    async fn query_free_busy(&self, args: &FreeBusyArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("query_free_busy", args)
    }
    async fn create_event(&self, args: &CreateEventArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("create_event", args)?;
        Ok(ToolOutput::Text(format!("Created event '{}' (stub-event-1)", args.summary)))
    }
    async fn update_event(&self, args: &UpdateEventArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("update_event", args)
    }
    async fn delete_event(&self, args: &DeleteEventArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("delete_event", args)
    }
    async fn meeting_title(&self, meeting_code: &str) -> Result<Option<String>, WorkspaceError> {
        self.record("meeting_title", &meeting_code)?;
        Ok(Some(format!("Meeting {}", meeting_code)))
    }
}

#[async_trait]
impl GmailApi for StubApi {
    async fn search_messages(&self, args: &SearchMessagesArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("search_messages", args)
    }
    async fn get_message(&self, args: &GetMessageArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("get_message", args)
    }
    async fn list_labels(&self, args: &ListLabelsArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_labels", args)
    }
    async fn send_email(&self, args: &ComposeEmailArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("send_email", args)
    }
    async fn create_draft(&self, args: &ComposeEmailArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("create_draft", args)
    }
    async fn modify_labels(&self, args: &ModifyLabelsArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("modify_labels", args)
    }
    async fn trash_message(&self, args: &TrashMessageArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("trash_message", args)
    }
}

#[async_trait]
impl DriveApi for StubApi {
    async fn search_files(&self, args: &SearchFilesArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("search_files", args)
    }
    async fn get_file(&self, args: &GetFileArgs) -> Result<ToolOutput, WorkspaceError> {
        // Simulates a Google 404 for the sentinel ID.
        if args.file_id == "missing" {
            return Err(WorkspaceError::Upstream("File not found: missing.".to_string()));
        }
        self.record("get_file", args)
    }
    async fn read_file(&self, args: &ReadFileArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("read_file", args)
    }
    async fn create_file(&self, args: &CreateFileArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("create_file", args)
    }
    async fn share_file(&self, args: &ShareFileArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("share_file", args)
    }
}

#[async_trait]
impl TasksApi for StubApi {
    async fn list_task_lists(&self, args: &ListTaskListsArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_task_lists", args)
    }
    async fn list_tasks(&self, args: &ListTasksArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_tasks", args)
    }
    async fn create_task(&self, args: &CreateTaskArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("create_task", args)
    }
    async fn complete_task(&self, args: &TaskRefArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("complete_task", args)
    }
    async fn delete_task(&self, args: &TaskRefArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("delete_task", args)
    }
}

#[async_trait]
impl MeetApi for StubApi {
    async fn list_conference_records(
        &self,
        args: &ListConferenceRecordsArgs,
    ) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_conference_records", args)
    }
    async fn get_conference_record(&self, args: &ConferenceRecordArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("get_conference_record", args)
    }
    async fn list_transcripts(&self, args: &ConferenceRecordArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("list_transcripts", args)
    }
    async fn get_transcript(&self, args: &GetTranscriptArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("get_transcript", args)?;
        let title = match &self.calendar {
            Some(calendar) => calendar.meeting_title("abc-defg-hij").await?,
            None => None,
        };
        Ok(ToolOutput::Text(format!(
            "# {}\n[00:00:01] Stub Speaker: hello",
            title.unwrap_or_else(|| "Untitled meeting".to_string())
        )))
    }
    async fn create_space(&self, args: &CreateSpaceArgs) -> Result<ToolOutput, WorkspaceError> {
        self.record("create_space", args)
    }
}

/// Factory producing [`StubApi`] clients and recording every build attempt.
pub struct StubFactory {
    log: CallLog,
    delay: Option<Duration>,
    builds: Mutex<Vec<(ServiceKind, Option<Fingerprint>)>>,
    failing: Mutex<HashSet<String>>,
    fail_default: AtomicBool,
}

impl Default for StubFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl StubFactory {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            delay: None,
            builds: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            fail_default: AtomicBool::new(false),
        }
    }

    /// Builds sleep for `delay` before completing.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Builds for `credential` fail with an authentication error.
    pub fn fail_for(&self, credential: &str) {
        if let Ok(mut set) = self.failing.lock() {
            set.insert(credential.to_string());
        }
    }

    /// Default-identity builds fail with an authentication error.
    pub fn fail_default(&self) {
        self.fail_default.store(true, Ordering::SeqCst);
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn builds(&self) -> usize {
        self.builds.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn builds_of(&self, kind: ServiceKind) -> usize {
        self.count_builds(|(k, _)| *k == kind)
    }

    /// Builds of `kind` for one caller credential, `None` meaning the default identity.
    pub fn builds_for(&self, kind: ServiceKind, credential: Option<&str>) -> usize {
        let identity = credential.and_then(fingerprint);
        self.count_builds(|(k, id)| *k == kind && *id == identity)
    }

    fn count_builds(&self, pred: impl Fn(&(ServiceKind, Option<Fingerprint>)) -> bool) -> usize {
        self.builds
            .lock()
            .map(|b| b.iter().filter(|entry| pred(entry)).count())
            .unwrap_or(0)
    }

    fn should_fail(&self, credential: Option<&str>) -> bool {
        match credential {
            Some(c) => self.failing.lock().map(|s| s.contains(c)).unwrap_or(false),
            None => self.fail_default.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ClientFactory for StubFactory {
    async fn build(
        &self,
        kind: ServiceKind,
        credential: Option<&str>,
        deps: &ResolvedDependencies,
    ) -> Result<ServiceClient, WorkspaceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let identity = credential.and_then(fingerprint);
        if let Ok(mut builds) = self.builds.lock() {
            builds.push((kind, identity.clone()));
        }
        if self.should_fail(credential) {
            return Err(WorkspaceError::AuthInitialization(
                "Invalid Credentials".to_string(),
            ));
        }
        let mut api = StubApi::new(kind, identity, self.log.clone());
        Ok(match kind {
            ServiceKind::Calendar => ServiceClient::Calendar(Arc::new(api)),
            ServiceKind::Gmail => ServiceClient::Gmail(Arc::new(api)),
            ServiceKind::Drive => ServiceClient::Drive(Arc::new(api)),
            ServiceKind::Tasks => ServiceClient::Tasks(Arc::new(api)),
            ServiceKind::Meet => {
                api.calendar = Some(deps.require_calendar()?);
                ServiceClient::Meet(Arc::new(api))
            }
        })
    }
}

/// Authenticator that accepts any credential and counts exchanges.
#[derive(Default)]
pub struct StubAuthenticator {
    calls: AtomicUsize,
}

impl StubAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedHandle, WorkspaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match credential {
            Some(c) if c.starts_with("bad") => Err(WorkspaceError::AuthInitialization(
                "Invalid Credentials".to_string(),
            )),
            Some(c) => Ok(AuthenticatedHandle::new(c)),
            None => Ok(AuthenticatedHandle::new("default-token")),
        }
    }
}
