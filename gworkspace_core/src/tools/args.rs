// Typed tool arguments. Each struct's JSON schema is the advertised
// `inputSchema` of its tool and drives argument validation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cross-field checks that a JSON schema cannot express.
pub trait ArgumentCheck {
    fn violations(&self) -> Vec<String> {
        Vec::new()
    }
}

fn plausible_email(value: &str) -> bool {
    if value.chars().any(|c| c.is_control()) {
        return false;
    }
    match value.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

fn check_addresses(field: &str, values: Option<&[String]>, out: &mut Vec<String>) {
    for value in values.unwrap_or_default() {
        if !plausible_email(value) {
            out.push(format!("field '{}' contains an invalid address {:?}", field, value));
        }
    }
}

fn check_timestamp(field: &str, value: Option<&str>, out: &mut Vec<String>) {
    if let Some(v) = value {
        if chrono::DateTime::parse_from_rfc3339(v.trim()).is_err() {
            out.push(format!("field '{}' must be an RFC 3339 timestamp", field));
        }
    }
}

// Event boundaries also accept a bare date for all-day events.
fn check_event_time(field: &str, value: Option<&str>, out: &mut Vec<String>) {
    if let Some(v) = value {
        let v = v.trim();
        if chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err()
            && chrono::DateTime::parse_from_rfc3339(v).is_err()
        {
            out.push(format!(
                "field '{}' must be an RFC 3339 timestamp or a YYYY-MM-DD date",
                field
            ));
        }
    }
}

// --- Calendar ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListCalendarsArgs {
    /// Maximum number of calendars to return
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListEventsArgs {
    /// Calendar ID (defaults to 'primary')
    pub calendar_id: Option<String>,
    /// Lower bound (RFC3339) for event end time; defaults to now
    pub time_min: Option<String>,
    /// Upper bound (RFC3339) for event start time
    pub time_max: Option<String>,
    /// Free text search terms
    pub query: Option<String>,
    /// Maximum number of events to return (default 25)
    #[schemars(range(max = 2500))]
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetEventArgs {
    /// Event ID
    pub event_id: String,
    /// Calendar ID (defaults to 'primary')
    pub calendar_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FreeBusyArgs {
    /// Start of the interval (RFC3339)
    pub time_min: String,
    /// End of the interval (RFC3339)
    pub time_max: String,
    /// Calendars to query (defaults to ['primary'])
    pub calendar_ids: Option<Vec<String>>,
    /// IANA time zone for the response
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateEventArgs {
    /// Event title
    pub summary: String,
    /// Start time (RFC3339, e.g. 2025-04-02T10:00:00-07:00) or date (YYYY-MM-DD) for all-day events
    pub start: String,
    /// End time (RFC3339) or date (YYYY-MM-DD) for all-day events
    pub end: String,
    /// Event description
    pub description: Option<String>,
    /// Event location
    pub location: Option<String>,
    /// Attendee email addresses
    pub attendees: Option<Vec<String>>,
    /// Calendar ID (defaults to 'primary')
    pub calendar_id: Option<String>,
    /// IANA time zone applied to start and end
    pub time_zone: Option<String>,
    /// Attach a Google Meet conference to the event
    pub add_meet_link: Option<bool>,
}

impl ArgumentCheck for CreateEventArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        check_event_time("start", Some(&self.start), &mut out);
        check_event_time("end", Some(&self.end), &mut out);
        check_addresses("attendees", self.attendees.as_deref(), &mut out);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateEventArgs {
    /// Event ID
    pub event_id: String,
    /// Calendar ID (defaults to 'primary')
    pub calendar_id: Option<String>,
    /// New title
    pub summary: Option<String>,
    /// New start (RFC3339 or YYYY-MM-DD)
    pub start: Option<String>,
    /// New end (RFC3339 or YYYY-MM-DD)
    pub end: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New location
    pub location: Option<String>,
    /// Replacement attendee list
    pub attendees: Option<Vec<String>>,
    /// IANA time zone applied to start and end
    pub time_zone: Option<String>,
}

impl ArgumentCheck for UpdateEventArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        check_event_time("start", self.start.as_deref(), &mut out);
        check_event_time("end", self.end.as_deref(), &mut out);
        check_addresses("attendees", self.attendees.as_deref(), &mut out);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteEventArgs {
    /// Event ID
    pub event_id: String,
    /// Calendar ID (defaults to 'primary')
    pub calendar_id: Option<String>,
}

// --- Gmail ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    #[default]
    Full,
    Metadata,
    Minimal,
    Raw,
}

impl MessageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
            MessageFormat::Minimal => "minimal",
            MessageFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum BodyContentType {
    #[default]
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/html")]
    Html,
}

impl BodyContentType {
    pub fn mime(self) -> &'static str {
        match self {
            BodyContentType::Plain => "text/plain",
            BodyContentType::Html => "text/html",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchMessagesArgs {
    /// Gmail search query (same syntax as the Gmail search box)
    pub query: Option<String>,
    /// Maximum number of messages to return (default 10)
    #[schemars(range(max = 500))]
    pub max_results: Option<u32>,
    /// Only return messages carrying all of these label IDs
    pub label_ids: Option<Vec<String>>,
    /// Include messages from SPAM and TRASH
    pub include_spam_trash: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetMessageArgs {
    /// Message ID
    pub message_id: String,
    /// Response format: full, metadata, minimal or raw (default full)
    pub format: Option<MessageFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListLabelsArgs {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComposeEmailArgs {
    /// Recipient email addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// CC recipients
    pub cc: Option<Vec<String>>,
    /// BCC recipients
    pub bcc: Option<Vec<String>>,
    /// Body content type: text/plain or text/html (default text/plain)
    pub content_type: Option<BodyContentType>,
    /// Thread to attach the message to
    pub thread_id: Option<String>,
}

impl ArgumentCheck for ComposeEmailArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.to.is_empty() {
            out.push("field 'to' must contain at least one address".to_string());
        }
        check_addresses("to", Some(&self.to), &mut out);
        check_addresses("cc", self.cc.as_deref(), &mut out);
        check_addresses("bcc", self.bcc.as_deref(), &mut out);
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModifyLabelsArgs {
    /// Message ID
    pub message_id: String,
    /// Label IDs to add
    pub add_label_ids: Option<Vec<String>>,
    /// Label IDs to remove
    pub remove_label_ids: Option<Vec<String>>,
}

impl ArgumentCheck for ModifyLabelsArgs {
    fn violations(&self) -> Vec<String> {
        let empty = |v: &Option<Vec<String>>| v.as_ref().map_or(true, |v| v.is_empty());
        if empty(&self.add_label_ids) && empty(&self.remove_label_ids) {
            vec!["one of 'add_label_ids' or 'remove_label_ids' must be non-empty".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrashMessageArgs {
    /// Message ID
    pub message_id: String,
}

// --- Drive ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SharingRole {
    Reader,
    Commenter,
    Writer,
    FileOrganizer,
    Organizer,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GranteeType {
    User,
    Group,
    Domain,
    Anyone,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilesArgs {
    /// Drive query (q parameter syntax) or plain text matched against file names and content
    pub query: Option<String>,
    /// Restrict results to this MIME type
    pub mime_type: Option<String>,
    /// Maximum number of files to return (default 20)
    #[schemars(range(max = 1000))]
    pub page_size: Option<u32>,
    /// Continuation token from a previous search
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetFileArgs {
    /// File ID
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File ID
    pub file_id: String,
    /// Export MIME type for Google Docs/Sheets/Slides (default text/plain or text/csv)
    pub export_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateFileArgs {
    /// File name
    pub name: String,
    /// Text content of the file
    pub content: Option<String>,
    /// MIME type (default text/plain)
    pub mime_type: Option<String>,
    /// Parent folder ID
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShareFileArgs {
    /// File ID
    pub file_id: String,
    /// Role to grant: reader, commenter, writer, fileOrganizer, organizer or owner
    pub role: SharingRole,
    /// Grantee type: user, group, domain or anyone
    #[serde(rename = "type")]
    pub grantee_type: GranteeType,
    /// Email address for user or group grantees
    pub email_address: Option<String>,
    /// Domain for domain grantees
    pub domain: Option<String>,
    /// Send a notification email (user and group grantees only)
    pub send_notification: Option<bool>,
    /// Message included in the notification email
    pub message: Option<String>,
}

impl ArgumentCheck for ShareFileArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self.grantee_type {
            GranteeType::User | GranteeType::Group => match self.email_address.as_deref() {
                None => out.push(
                    "field 'email_address' is required for user and group grantees".to_string(),
                ),
                Some(addr) if !plausible_email(addr) => out.push(format!(
                    "field 'email_address' is not a valid address '{}'",
                    addr
                )),
                Some(_) => {}
            },
            GranteeType::Domain => {
                if self.domain.as_deref().map_or(true, |d| d.trim().is_empty()) {
                    out.push("field 'domain' is required for domain grantees".to_string());
                }
            }
            GranteeType::Anyone => {}
        }
        out
    }
}

// --- Tasks ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListTaskListsArgs {
    /// Maximum number of task lists to return
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListTasksArgs {
    /// Task list ID (defaults to '@default')
    pub task_list_id: Option<String>,
    /// Include completed tasks (default false)
    pub show_completed: Option<bool>,
    /// Maximum number of tasks to return
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTaskArgs {
    /// Task title
    pub title: String,
    /// Task notes
    pub notes: Option<String>,
    /// Due date (RFC3339 or YYYY-MM-DD)
    pub due: Option<String>,
    /// Task list ID (defaults to '@default')
    pub task_list_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskRefArgs {
    /// Task ID
    pub task_id: String,
    /// Task list ID (defaults to '@default')
    pub task_list_id: Option<String>,
}

// --- Meet ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Open,
    Trusted,
    Restricted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListConferenceRecordsArgs {
    /// Meet API filter expression, e.g. space.meeting_code = "abc-mnop-xyz"
    pub filter: Option<String>,
    /// Maximum number of records to return (default 10)
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConferenceRecordArgs {
    /// Conference record name ('conferenceRecords/{id}') or bare ID
    pub conference_record: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTranscriptArgs {
    /// Conference record name ('conferenceRecords/{id}') or bare ID
    pub conference_record: String,
    /// Transcript ID; defaults to the first transcript of the conference
    pub transcript_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateSpaceArgs {
    /// Who can join without knocking: OPEN, TRUSTED or RESTRICTED
    pub access_type: Option<AccessType>,
}

impl ArgumentCheck for ListCalendarsArgs {}
impl ArgumentCheck for ListEventsArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        check_timestamp("time_min", self.time_min.as_deref(), &mut out);
        check_timestamp("time_max", self.time_max.as_deref(), &mut out);
        out
    }
}

impl ArgumentCheck for FreeBusyArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        check_timestamp("time_min", Some(&self.time_min), &mut out);
        check_timestamp("time_max", Some(&self.time_max), &mut out);
        out
    }
}

impl ArgumentCheck for GetEventArgs {}
impl ArgumentCheck for DeleteEventArgs {}
impl ArgumentCheck for SearchMessagesArgs {}
impl ArgumentCheck for GetMessageArgs {}
impl ArgumentCheck for ListLabelsArgs {}
impl ArgumentCheck for TrashMessageArgs {}
impl ArgumentCheck for SearchFilesArgs {}
impl ArgumentCheck for GetFileArgs {}
impl ArgumentCheck for ReadFileArgs {}
impl ArgumentCheck for CreateFileArgs {}
impl ArgumentCheck for ListTaskListsArgs {}
impl ArgumentCheck for ListTasksArgs {}
impl ArgumentCheck for CreateTaskArgs {
    fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        check_event_time("due", self.due.as_deref(), &mut out);
        out
    }
}
impl ArgumentCheck for TaskRefArgs {}
impl ArgumentCheck for ListConferenceRecordsArgs {}
impl ArgumentCheck for ConferenceRecordArgs {}
impl ArgumentCheck for GetTranscriptArgs {}
impl ArgumentCheck for CreateSpaceArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_plausibility() {
        assert!(plausible_email("a@b.com"));
        assert!(!plausible_email("ab.com"));
        assert!(!plausible_email("@b.com"));
        assert!(!plausible_email("a@"));
        assert!(!plausible_email("a@x.com\r\nBcc: spy@evil.com"));
        assert!(!plausible_email("a@x.com\n"));
    }

    #[test]
    fn event_times_accept_dates_or_timestamps() {
        let mut out = Vec::new();
        check_event_time("start", Some("2025-04-02"), &mut out);
        check_event_time("start", Some("2025-04-02T10:00:00-07:00"), &mut out);
        assert!(out.is_empty());

        check_event_time("end", Some("next tuesday"), &mut out);
        check_timestamp("time_min", Some("2025-04-02"), &mut out);
        assert_eq!(
            out,
            vec![
                "field 'end' must be an RFC 3339 timestamp or a YYYY-MM-DD date".to_string(),
                "field 'time_min' must be an RFC 3339 timestamp".to_string(),
            ]
        );
    }

    #[test]
    fn share_requires_email_for_users() {
        let args = ShareFileArgs {
            file_id: "f".into(),
            role: SharingRole::Reader,
            grantee_type: GranteeType::User,
            email_address: None,
            domain: None,
            send_notification: None,
            message: None,
        };
        assert_eq!(args.violations().len(), 1);

        let anyone = ShareFileArgs {
            grantee_type: GranteeType::Anyone,
            ..args
        };
        assert!(anyone.violations().is_empty());
    }

    #[test]
    fn modify_labels_needs_a_change() {
        let args = ModifyLabelsArgs {
            message_id: "m".into(),
            add_label_ids: Some(vec![]),
            remove_label_ids: None,
        };
        assert_eq!(args.violations().len(), 1);
    }
}
