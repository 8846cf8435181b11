// OAuth scope -> tool visibility table.

use super::ToolId::{self, *};

pub const SCOPE_PREFIX: &str = "https://www.googleapis.com/auth/";

const CALENDAR_READONLY: &[ToolId] = &[
    CalendarListCalendars,
    CalendarListEvents,
    CalendarGetEvent,
    CalendarQueryFreeBusy,
];
const CALENDAR_EVENTS: &[ToolId] = &[
    CalendarListEvents,
    CalendarGetEvent,
    CalendarCreateEvent,
    CalendarUpdateEvent,
    CalendarDeleteEvent,
];
const CALENDAR_ALL: &[ToolId] = &[
    CalendarListCalendars,
    CalendarListEvents,
    CalendarGetEvent,
    CalendarQueryFreeBusy,
    CalendarCreateEvent,
    CalendarUpdateEvent,
    CalendarDeleteEvent,
];

const GMAIL_READONLY: &[ToolId] = &[GmailSearchMessages, GmailGetMessage, GmailListLabels];
const GMAIL_SEND: &[ToolId] = &[GmailSendEmail];
const GMAIL_COMPOSE: &[ToolId] = &[GmailCreateDraft, GmailSendEmail];
const GMAIL_MODIFY: &[ToolId] = &[
    GmailSearchMessages,
    GmailGetMessage,
    GmailListLabels,
    GmailSendEmail,
    GmailCreateDraft,
    GmailModifyLabels,
    GmailTrashMessage,
];

const DRIVE_READONLY: &[ToolId] = &[DriveSearchFiles, DriveGetFile, DriveReadFile];
const DRIVE_ALL: &[ToolId] = &[
    DriveSearchFiles,
    DriveGetFile,
    DriveReadFile,
    DriveCreateFile,
    DriveShareFile,
];

const TASKS_READONLY: &[ToolId] = &[TasksListTaskLists, TasksListTasks];
const TASKS_ALL: &[ToolId] = &[
    TasksListTaskLists,
    TasksListTasks,
    TasksCreateTask,
    TasksCompleteTask,
    TasksDeleteTask,
];

const MEET_READONLY: &[ToolId] = &[
    MeetListConferenceRecords,
    MeetGetConferenceRecord,
    MeetListTranscripts,
    MeetGetTranscript,
];
const MEET_CREATED: &[ToolId] = &[
    MeetListConferenceRecords,
    MeetGetConferenceRecord,
    MeetListTranscripts,
    MeetGetTranscript,
    MeetCreateSpace,
];

/// Strip the Google auth URL prefix so both scope spellings compare equal.
pub fn normalize_scope(scope: &str) -> &str {
    let scope = scope.trim();
    scope.strip_prefix(SCOPE_PREFIX).unwrap_or(scope)
}

/// Tools granted by `scope`, in listing order. Unknown scopes grant nothing.
pub fn tools_for_scope(scope: &str) -> &'static [ToolId] {
    match normalize_scope(scope) {
        "calendar.readonly" => CALENDAR_READONLY,
        "calendar.events" => CALENDAR_EVENTS,
        "calendar" => CALENDAR_ALL,
        "gmail.readonly" => GMAIL_READONLY,
        "gmail.send" => GMAIL_SEND,
        "gmail.compose" => GMAIL_COMPOSE,
        "gmail.modify" => GMAIL_MODIFY,
        "drive.readonly" => DRIVE_READONLY,
        "drive.file" | "drive" => DRIVE_ALL,
        "tasks.readonly" => TASKS_READONLY,
        "tasks" => TASKS_ALL,
        "meetings.space.readonly" => MEET_READONLY,
        "meetings.space.created" => MEET_CREATED,
        _ => &[],
    }
}

/// Split a scope filter string on whitespace and commas.
pub fn parse_scope_filter(filter: &str) -> Vec<&str> {
    filter
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_urls_and_short_forms_match() {
        assert_eq!(
            tools_for_scope("https://www.googleapis.com/auth/calendar.readonly"),
            tools_for_scope("calendar.readonly")
        );
        assert_eq!(tools_for_scope(" gmail.send "), &[GmailSendEmail]);
        assert!(tools_for_scope("spreadsheets").is_empty());
    }

    #[test]
    fn broad_scopes_cover_their_service_in_registration_order() {
        for (scope, service) in [
            ("calendar", crate::services::ServiceKind::Calendar),
            ("gmail.modify", crate::services::ServiceKind::Gmail),
            ("drive", crate::services::ServiceKind::Drive),
            ("tasks", crate::services::ServiceKind::Tasks),
            ("meetings.space.created", crate::services::ServiceKind::Meet),
        ] {
            let expected: Vec<ToolId> = ToolId::ALL
                .iter()
                .copied()
                .filter(|t| t.service() == service)
                .collect();
            assert_eq!(tools_for_scope(scope), expected.as_slice(), "{scope}");
        }
    }

    #[test]
    fn filter_strings_split_on_spaces_and_commas() {
        assert_eq!(
            parse_scope_filter("calendar.readonly, gmail.send  tasks"),
            vec!["calendar.readonly", "gmail.send", "tasks"]
        );
        assert!(parse_scope_filter("  ").is_empty());
    }
}
