// Operation sets exposed by each Google service client.
//
// The dispatcher only talks to these traits; `crate::google` provides the REST
// implementations and tests substitute stubs.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WorkspaceError;
use crate::tools::args::*;

/// Result payload of a service operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Text placed in the response envelope: strings verbatim, JSON pretty-printed.
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(Value::String(text)) => text,
            ToolOutput::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

type ApiResult = Result<ToolOutput, WorkspaceError>;

#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_calendars(&self, args: &ListCalendarsArgs) -> ApiResult;
    async fn list_events(&self, args: &ListEventsArgs) -> ApiResult;
    async fn get_event(&self, args: &GetEventArgs) -> ApiResult;
    async fn query_free_busy(&self, args: &FreeBusyArgs) -> ApiResult;
    async fn create_event(&self, args: &CreateEventArgs) -> ApiResult;
    async fn update_event(&self, args: &UpdateEventArgs) -> ApiResult;
    async fn delete_event(&self, args: &DeleteEventArgs) -> ApiResult;

    /// Title of the calendar event whose Meet conference uses `meeting_code`.
    async fn meeting_title(&self, meeting_code: &str) -> Result<Option<String>, WorkspaceError>;
}

#[async_trait]
pub trait GmailApi: Send + Sync {
    async fn search_messages(&self, args: &SearchMessagesArgs) -> ApiResult;
    async fn get_message(&self, args: &GetMessageArgs) -> ApiResult;
    async fn list_labels(&self, args: &ListLabelsArgs) -> ApiResult;
    async fn send_email(&self, args: &ComposeEmailArgs) -> ApiResult;
    async fn create_draft(&self, args: &ComposeEmailArgs) -> ApiResult;
    async fn modify_labels(&self, args: &ModifyLabelsArgs) -> ApiResult;
    async fn trash_message(&self, args: &TrashMessageArgs) -> ApiResult;
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn search_files(&self, args: &SearchFilesArgs) -> ApiResult;
    async fn get_file(&self, args: &GetFileArgs) -> ApiResult;
    async fn read_file(&self, args: &ReadFileArgs) -> ApiResult;
    async fn create_file(&self, args: &CreateFileArgs) -> ApiResult;
    async fn share_file(&self, args: &ShareFileArgs) -> ApiResult;
}

#[async_trait]
pub trait TasksApi: Send + Sync {
    async fn list_task_lists(&self, args: &ListTaskListsArgs) -> ApiResult;
    async fn list_tasks(&self, args: &ListTasksArgs) -> ApiResult;
    async fn create_task(&self, args: &CreateTaskArgs) -> ApiResult;
    async fn complete_task(&self, args: &TaskRefArgs) -> ApiResult;
    async fn delete_task(&self, args: &TaskRefArgs) -> ApiResult;
}

#[async_trait]
pub trait MeetApi: Send + Sync {
    async fn list_conference_records(&self, args: &ListConferenceRecordsArgs) -> ApiResult;
    async fn get_conference_record(&self, args: &ConferenceRecordArgs) -> ApiResult;
    async fn list_transcripts(&self, args: &ConferenceRecordArgs) -> ApiResult;
    async fn get_transcript(&self, args: &GetTranscriptArgs) -> ApiResult;
    async fn create_space(&self, args: &CreateSpaceArgs) -> ApiResult;
}
