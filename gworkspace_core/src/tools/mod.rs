//! Tool registry.
//!
//! Every tool is declared once in the `tools!` table below: its wire name,
//! owning service, typed argument struct and the service operation it runs.
//! The table expands into [`ToolId`] (static metadata) and
//! [`ToolInvocation`] (a validated call, one variant per tool).

pub mod args;
pub mod catalog;
pub mod scopes;
pub mod validate;

use jsonschema::Validator;
use once_cell::sync::Lazy;
use rmcp::model::{JsonObject, Tool};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::error::WorkspaceError;
use crate::services::{ServiceClient, ServiceKind, ToolOutput};
use args::*;

pub use catalog::ToolCatalog;

/// JSON schema advertised as a tool's `inputSchema`, with subschemas inlined.
pub fn schema_of<T: JsonSchema>() -> JsonObject {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut schema = match serde_json::to_value(root) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    };
    schema.remove("$schema");
    schema.remove("title");
    schema.remove("definitions");
    schema.insert("type".into(), Value::String("object".into()));
    schema
        .entry("properties")
        .or_insert_with(|| Value::Object(JsonObject::new()));
    schema
}

macro_rules! tools {
    ($(
        $variant:ident {
            name: $name:literal,
            service: $service:ident => $accessor:ident,
            args: $args:ty,
            call: $method:ident,
            description: $desc:literal $(,)?
        }
    ),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ToolId {
            $($variant),*
        }

        impl ToolId {
            /// Every tool in registration order.
            pub const ALL: &'static [ToolId] = &[$(ToolId::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(ToolId::$variant => $name),*
                }
            }

            pub fn service(self) -> ServiceKind {
                match self {
                    $(ToolId::$variant => ServiceKind::$service),*
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $(ToolId::$variant => $desc),*
                }
            }

            pub fn from_name(name: &str) -> Option<ToolId> {
                match name {
                    $($name => Some(ToolId::$variant),)*
                    _ => None,
                }
            }

            fn generate_schema(self) -> JsonObject {
                match self {
                    $(ToolId::$variant => schema_of::<$args>()),*
                }
            }
        }

        /// A tool call whose arguments passed validation.
        #[derive(Debug, Clone)]
        pub enum ToolInvocation {
            $($variant($args)),*
        }

        impl ToolInvocation {
            pub fn tool(&self) -> ToolId {
                match self {
                    $(ToolInvocation::$variant(_) => ToolId::$variant),*
                }
            }

            /// Validate `args` against `tool`'s schema and argument checks.
            pub fn for_tool(tool: ToolId, args: &JsonObject) -> Result<Self, WorkspaceError> {
                match tool {
                    $(ToolId::$variant => {
                        validate::validate::<$args>(tool, args).map(ToolInvocation::$variant)
                    }),*
                }
            }

            /// Run the operation against a client of the tool's service.
            pub async fn execute(&self, client: &ServiceClient) -> Result<ToolOutput, WorkspaceError> {
                match self {
                    $(ToolInvocation::$variant(args) => client.$accessor()?.$method(args).await),*
                }
            }
        }
    };
}

tools! {
    // Calendar
    CalendarListCalendars {
        name: "google_calendar_list_calendars",
        service: Calendar => calendar,
        args: ListCalendarsArgs,
        call: list_calendars,
        description: "List the calendars on the user's calendar list.",
    },
    CalendarListEvents {
        name: "google_calendar_list_events",
        service: Calendar => calendar,
        args: ListEventsArgs,
        call: list_events,
        description: "List upcoming events from a calendar, optionally filtered by time range or text.",
    },
    CalendarGetEvent {
        name: "google_calendar_get_event",
        service: Calendar => calendar,
        args: GetEventArgs,
        call: get_event,
        description: "Get full details of a calendar event.",
    },
    CalendarQueryFreeBusy {
        name: "google_calendar_query_free_busy",
        service: Calendar => calendar,
        args: FreeBusyArgs,
        call: query_free_busy,
        description: "Return busy intervals for one or more calendars within a time range.",
    },
    CalendarCreateEvent {
        name: "google_calendar_create_event",
        service: Calendar => calendar,
        args: CreateEventArgs,
        call: create_event,
        description: "Create a calendar event, optionally inviting attendees and attaching a Google Meet link.",
    },
    CalendarUpdateEvent {
        name: "google_calendar_update_event",
        service: Calendar => calendar,
        args: UpdateEventArgs,
        call: update_event,
        description: "Update fields of an existing calendar event.",
    },
    CalendarDeleteEvent {
        name: "google_calendar_delete_event",
        service: Calendar => calendar,
        args: DeleteEventArgs,
        call: delete_event,
        description: "Delete a calendar event.",
    },

    // Gmail
    GmailSearchMessages {
        name: "google_gmail_search_messages",
        service: Gmail => gmail,
        args: SearchMessagesArgs,
        call: search_messages,
        description: "Search Gmail messages using Gmail query syntax.",
    },
    GmailGetMessage {
        name: "google_gmail_get_message",
        service: Gmail => gmail,
        args: GetMessageArgs,
        call: get_message,
        description: "Get a Gmail message with headers and decoded body.",
    },
    GmailListLabels {
        name: "google_gmail_list_labels",
        service: Gmail => gmail,
        args: ListLabelsArgs,
        call: list_labels,
        description: "List the labels in the user's mailbox.",
    },
    GmailSendEmail {
        name: "google_gmail_send_email",
        service: Gmail => gmail,
        args: ComposeEmailArgs,
        call: send_email,
        description: "Send an email.",
    },
    GmailCreateDraft {
        name: "google_gmail_create_draft",
        service: Gmail => gmail,
        args: ComposeEmailArgs,
        call: create_draft,
        description: "Save an email as a draft without sending it.",
    },
    GmailModifyLabels {
        name: "google_gmail_modify_labels",
        service: Gmail => gmail,
        args: ModifyLabelsArgs,
        call: modify_labels,
        description: "Add or remove labels on a message (e.g. UNREAD, STARRED, INBOX).",
    },
    GmailTrashMessage {
        name: "google_gmail_trash_message",
        service: Gmail => gmail,
        args: TrashMessageArgs,
        call: trash_message,
        description: "Move a message to the trash.",
    },

    // Drive
    DriveSearchFiles {
        name: "google_drive_search_files",
        service: Drive => drive,
        args: SearchFilesArgs,
        call: search_files,
        description: "Search Drive files by name, content or Drive query syntax.",
    },
    DriveGetFile {
        name: "google_drive_get_file",
        service: Drive => drive,
        args: GetFileArgs,
        call: get_file,
        description: "Get metadata for a Drive file.",
    },
    DriveReadFile {
        name: "google_drive_read_file",
        service: Drive => drive,
        args: ReadFileArgs,
        call: read_file,
        description: "Read a Drive file's content as text, exporting Google Docs, Sheets and Slides.",
    },
    DriveCreateFile {
        name: "google_drive_create_file",
        service: Drive => drive,
        args: CreateFileArgs,
        call: create_file,
        description: "Create a Drive file from text content.",
    },
    DriveShareFile {
        name: "google_drive_share_file",
        service: Drive => drive,
        args: ShareFileArgs,
        call: share_file,
        description: "Grant a user, group, domain or anyone access to a Drive file.",
    },

    // Tasks
    TasksListTaskLists {
        name: "google_tasks_list_task_lists",
        service: Tasks => tasks,
        args: ListTaskListsArgs,
        call: list_task_lists,
        description: "List the user's task lists.",
    },
    TasksListTasks {
        name: "google_tasks_list_tasks",
        service: Tasks => tasks,
        args: ListTasksArgs,
        call: list_tasks,
        description: "List tasks in a task list.",
    },
    TasksCreateTask {
        name: "google_tasks_create_task",
        service: Tasks => tasks,
        args: CreateTaskArgs,
        call: create_task,
        description: "Create a task.",
    },
    TasksCompleteTask {
        name: "google_tasks_complete_task",
        service: Tasks => tasks,
        args: TaskRefArgs,
        call: complete_task,
        description: "Mark a task as completed.",
    },
    TasksDeleteTask {
        name: "google_tasks_delete_task",
        service: Tasks => tasks,
        args: TaskRefArgs,
        call: delete_task,
        description: "Delete a task.",
    },

    // Meet
    MeetListConferenceRecords {
        name: "google_meet_list_conference_records",
        service: Meet => meet,
        args: ListConferenceRecordsArgs,
        call: list_conference_records,
        description: "List past Google Meet conferences with their meeting titles.",
    },
    MeetGetConferenceRecord {
        name: "google_meet_get_conference_record",
        service: Meet => meet,
        args: ConferenceRecordArgs,
        call: get_conference_record,
        description: "Get a Google Meet conference record.",
    },
    MeetListTranscripts {
        name: "google_meet_list_transcripts",
        service: Meet => meet,
        args: ConferenceRecordArgs,
        call: list_transcripts,
        description: "List transcripts recorded for a conference.",
    },
    MeetGetTranscript {
        name: "google_meet_get_transcript",
        service: Meet => meet,
        args: GetTranscriptArgs,
        call: get_transcript,
        description: "Get a conference transcript as speaker-attributed text.",
    },
    MeetCreateSpace {
        name: "google_meet_create_space",
        service: Meet => meet,
        args: CreateSpaceArgs,
        call: create_space,
        description: "Create a new Google Meet meeting space.",
    },
}

static SCHEMAS: Lazy<HashMap<ToolId, Arc<JsonObject>>> = Lazy::new(|| {
    ToolId::ALL
        .iter()
        .map(|id| (*id, Arc::new(id.generate_schema())))
        .collect()
});

static VALIDATORS: Lazy<HashMap<ToolId, Arc<Validator>>> = Lazy::new(|| {
    ToolId::ALL
        .iter()
        .filter_map(|id| match validate::compile_schema(&id.input_schema()) {
            Ok(validator) => Some((*id, Arc::new(validator))),
            Err(e) => {
                error!(tool = id.name(), "{}", e);
                None
            }
        })
        .collect()
});

impl ToolId {
    /// Compiled validator for [`Self::input_schema`].
    pub fn validator(self) -> Result<Arc<Validator>, WorkspaceError> {
        VALIDATORS.get(&self).cloned().ok_or_else(|| {
            WorkspaceError::Internal(format!("no input validator for {}", self.name()))
        })
    }

    pub fn input_schema(self) -> Arc<JsonObject> {
        SCHEMAS
            .get(&self)
            .cloned()
            .unwrap_or_else(|| Arc::new(self.generate_schema()))
    }

    /// MCP definition of this tool.
    pub fn definition(self) -> Tool {
        Tool {
            name: Cow::Borrowed(self.name()),
            title: None,
            description: Some(Cow::Borrowed(self.description())),
            input_schema: self.input_schema(),
            output_schema: None,
            annotations: None,
            icons: None,
        }
    }
}

impl ToolInvocation {
    /// Resolve `name` and validate `args`.
    pub fn parse(name: &str, args: &JsonObject) -> Result<Self, WorkspaceError> {
        let tool =
            ToolId::from_name(name).ok_or_else(|| WorkspaceError::UnknownTool(name.to_string()))?;
        Self::for_tool(tool, args)
    }
}
