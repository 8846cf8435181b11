use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{str_field, GoogleRest, Query};
use crate::error::WorkspaceError;
use crate::services::api::{CalendarApi, MeetApi, ToolOutput};
use crate::tools::args::*;

const DEFAULT_PAGE_SIZE: u32 = 10;
const ENTRY_PAGE_SIZE: u32 = 100;

/// Meet REST client. Meeting titles live on the calendar event that created
/// the conference, so the client carries a Calendar client alongside.
pub struct GoogleMeet {
    rest: GoogleRest,
    calendar: Arc<dyn CalendarApi>,
}

impl GoogleMeet {
    pub fn new(rest: GoogleRest, calendar: Arc<dyn CalendarApi>) -> Self {
        Self { rest, calendar }
    }

    async fn meeting_code(&self, space: &str) -> Option<String> {
        match self.rest.get(space, &Vec::new()).await {
            Ok(v) => str_field(&v, "/meetingCode"),
            Err(e) => {
                debug!(space, "space lookup failed: {}", e);
                None
            }
        }
    }

    /// Best-effort title for a meeting code; lookup failures yield `None`.
    async fn title_for(&self, code: Option<&str>) -> Option<String> {
        let code = code?;
        match self.calendar.meeting_title(code).await {
            Ok(title) => title,
            Err(e) => {
                debug!(meeting_code = code, "title lookup failed: {}", e);
                None
            }
        }
    }

    async fn describe_record(&self, record: &Value) -> Value {
        let code = match str_field(record, "/space") {
            Some(space) => self.meeting_code(&space).await,
            None => None,
        };
        let title = self.title_for(code.as_deref()).await;
        json!({
            "name": record.get("name"),
            "title": title,
            "meetingCode": code,
            "startTime": record.get("startTime"),
            "endTime": record.get("endTime"),
            "space": record.get("space"),
        })
    }

    async fn participant_name(&self, participant: &str) -> Option<String> {
        let v = self.rest.get(participant, &Vec::new()).await.ok()?;
        ["/signedinUser/displayName", "/anonymousUser/displayName", "/phoneUser/displayName"]
            .iter()
            .find_map(|p| str_field(&v, p))
    }

    async fn first_transcript(&self, record: &str) -> Result<String, WorkspaceError> {
        let v = self
            .rest
            .get(&format!("{}/transcripts", record), &Vec::new())
            .await?;
        v.get("transcripts")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|t| str_field(t, "/name"))
            .ok_or_else(|| WorkspaceError::Upstream(format!("no transcripts for {}", record)))
    }
}

/// Accept `conferenceRecords/{id}` or a bare ID.
pub(crate) fn record_name(value: &str) -> String {
    let value = value.trim().trim_matches('/');
    if value.starts_with("conferenceRecords/") {
        value.to_string()
    } else {
        format!("conferenceRecords/{}", value)
    }
}

/// Accept a full transcript name or an ID relative to `record`.
pub(crate) fn transcript_name(record: &str, transcript: &str) -> String {
    let transcript = transcript.trim().trim_matches('/');
    if transcript.starts_with("conferenceRecords/") {
        transcript.to_string()
    } else {
        format!("{}/transcripts/{}", record, transcript)
    }
}

/// `HH:MM:SS` offset of `at` from the transcript start.
pub(crate) fn offset_label(start: Option<&str>, at: Option<&str>) -> String {
    let parse = |s: Option<&str>| s.and_then(|s| DateTime::parse_from_rfc3339(s).ok());
    match (parse(start), parse(at)) {
        (Some(s), Some(t)) => {
            let secs = (t.with_timezone(&Utc) - s.with_timezone(&Utc)).num_seconds().max(0);
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
        _ => "--:--:--".to_string(),
    }
}

#[async_trait]
impl MeetApi for GoogleMeet {
    async fn list_conference_records(
        &self,
        args: &ListConferenceRecordsArgs,
    ) -> Result<ToolOutput, WorkspaceError> {
        let mut query: Query = vec![(
            "pageSize",
            args.page_size.unwrap_or(DEFAULT_PAGE_SIZE).to_string(),
        )];
        if let Some(f) = &args.filter {
            query.push(("filter", f.clone()));
        }
        let v = self.rest.get("conferenceRecords", &query).await?;
        let mut records = Vec::new();
        for record in v
            .get("conferenceRecords")
            .and_then(|r| r.as_array())
            .into_iter()
            .flatten()
        {
            records.push(self.describe_record(record).await);
        }
        Ok(json!({
            "conferenceRecords": records,
            "nextPageToken": v.get("nextPageToken"),
        })
        .into())
    }

    async fn get_conference_record(
        &self,
        args: &ConferenceRecordArgs,
    ) -> Result<ToolOutput, WorkspaceError> {
        let name = record_name(&args.conference_record);
        let record = self.rest.get(&name, &Vec::new()).await?;
        Ok(self.describe_record(&record).await.into())
    }

    async fn list_transcripts(&self, args: &ConferenceRecordArgs) -> Result<ToolOutput, WorkspaceError> {
        let name = record_name(&args.conference_record);
        let v = self
            .rest
            .get(&format!("{}/transcripts", name), &Vec::new())
            .await?;
        let transcripts: Vec<Value> = v
            .get("transcripts")
            .and_then(|t| t.as_array())
            .map(|t| {
                t.iter()
                    .map(|x| {
                        json!({
                            "name": x.get("name"),
                            "state": x.get("state"),
                            "startTime": x.get("startTime"),
                            "endTime": x.get("endTime"),
                            "document": x.pointer("/docsDestination/exportUri"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({ "transcripts": transcripts }).into())
    }

    async fn get_transcript(&self, args: &GetTranscriptArgs) -> Result<ToolOutput, WorkspaceError> {
        let record_path = record_name(&args.conference_record);
        let transcript = match &args.transcript_id {
            Some(id) => transcript_name(&record_path, id),
            None => self.first_transcript(&record_path).await?,
        };
        let record = self.rest.get(&record_path, &Vec::new()).await?;
        let meta = self.rest.get(&transcript, &Vec::new()).await?;
        let start = str_field(&meta, "/startTime").or_else(|| str_field(&record, "/startTime"));
        let described = self.describe_record(&record).await;
        let title = described
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or("Untitled meeting")
            .to_string();

        let mut names: HashMap<String, String> = HashMap::new();
        let mut lines = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query: Query = vec![("pageSize", ENTRY_PAGE_SIZE.to_string())];
            if let Some(t) = &page_token {
                query.push(("pageToken", t.clone()));
            }
            let page = self
                .rest
                .get(&format!("{}/entries", transcript), &query)
                .await?;
            for entry in page
                .get("transcriptEntries")
                .and_then(|e| e.as_array())
                .into_iter()
                .flatten()
            {
                let speaker = match str_field(entry, "/participant") {
                    Some(p) => {
                        if !names.contains_key(&p) {
                            let name = self
                                .participant_name(&p)
                                .await
                                .unwrap_or_else(|| "Unknown speaker".to_string());
                            names.insert(p.clone(), name);
                        }
                        names.get(&p).cloned().unwrap_or_default()
                    }
                    None => "Unknown speaker".to_string(),
                };
                let at = str_field(entry, "/startTime");
                lines.push(format!(
                    "[{}] {}: {}",
                    offset_label(start.as_deref(), at.as_deref()),
                    speaker,
                    str_field(entry, "/text").unwrap_or_default()
                ));
            }
            page_token = str_field(&page, "/nextPageToken").filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        let mut out = format!("# {}\n", title);
        if let Some(s) = &start {
            out.push_str(&format!("Started: {}\n", s));
        }
        out.push_str(&format!("Transcript: {}\n\n", transcript));
        if lines.is_empty() {
            out.push_str("(no transcript entries)");
        } else {
            out.push_str(&lines.join("\n"));
        }
        Ok(ToolOutput::Text(out))
    }

    async fn create_space(&self, args: &CreateSpaceArgs) -> Result<ToolOutput, WorkspaceError> {
        let body = match args.access_type {
            Some(access) => json!({ "config": { "accessType": access } }),
            None => json!({}),
        };
        let v = self.rest.post("spaces", &Vec::new(), &body).await?;
        Ok(json!({
            "name": v.get("name"),
            "meetingUri": v.get("meetingUri"),
            "meetingCode": v.get("meetingCode"),
            "accessType": v.pointer("/config/accessType"),
        })
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_names_normalize() {
        assert_eq!(record_name("abc"), "conferenceRecords/abc");
        assert_eq!(record_name("conferenceRecords/abc"), "conferenceRecords/abc");
        assert_eq!(
            transcript_name("conferenceRecords/abc", "t1"),
            "conferenceRecords/abc/transcripts/t1"
        );
        assert_eq!(
            transcript_name("conferenceRecords/abc", "conferenceRecords/abc/transcripts/t2"),
            "conferenceRecords/abc/transcripts/t2"
        );
    }

    #[test]
    fn offsets_are_relative_to_start() {
        assert_eq!(
            offset_label(Some("2025-01-01T10:00:00Z"), Some("2025-01-01T11:02:03Z")),
            "01:02:03"
        );
        assert_eq!(offset_label(None, Some("2025-01-01T11:02:03Z")), "--:--:--");
    }
}
