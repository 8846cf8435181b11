use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use google_calendar3::api::{Event, FreeBusyRequest};
use google_calendar3::CalendarHub;
use serde_json::{json, Map, Value};

use super::hub::{hub_error, to_json, Connector, HttpsClient};
use super::str_field;
use crate::error::WorkspaceError;
use crate::services::api::{CalendarApi, ToolOutput};
use crate::tools::args::*;

const DEFAULT_EVENT_LIMIT: u32 = 25;
// Window scanned when matching a Meet code back to its calendar event.
const MEETING_LOOKBACK_DAYS: i64 = 30;

pub struct GoogleCalendar {
    hub: CalendarHub<Connector>,
}

impl GoogleCalendar {
    pub fn new(client: HttpsClient, access_token: &str) -> Self {
        Self {
            hub: CalendarHub::new(client, access_token.to_string()),
        }
    }
}

fn calendar_id(id: Option<&str>) -> &str {
    id.filter(|s| !s.trim().is_empty()).unwrap_or("primary")
}

fn timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, WorkspaceError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            WorkspaceError::validation(format!("field '{}' must be an RFC 3339 timestamp", field))
        })
}

/// Calendar time object: `{"date"}` for `YYYY-MM-DD`, `{"dateTime"}` otherwise.
pub(crate) fn event_time(value: &str, time_zone: Option<&str>) -> Value {
    let value = value.trim();
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return json!({ "date": value });
    }
    let mut obj = Map::new();
    obj.insert("dateTime".into(), json!(value));
    if let Some(tz) = time_zone {
        obj.insert("timeZone".into(), json!(tz));
    }
    Value::Object(obj)
}

fn attendee_list(emails: &[String]) -> Value {
    Value::Array(
        emails
            .iter()
            .map(|e| json!({ "email": e.trim() }))
            .collect(),
    )
}

fn concise_event(ev: &Value) -> Value {
    let attendees: Vec<Value> = ev
        .get("attendees")
        .and_then(|a| a.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|p| p.get("email").cloned())
                .collect()
        })
        .unwrap_or_default();
    json!({
        "id": ev.get("id"),
        "summary": ev.get("summary"),
        "start": ev.pointer("/start/dateTime").or_else(|| ev.pointer("/start/date")),
        "end": ev.pointer("/end/dateTime").or_else(|| ev.pointer("/end/date")),
        "location": ev.get("location"),
        "status": ev.get("status"),
        "hangoutLink": ev.get("hangoutLink"),
        "attendees": attendees,
        "htmlLink": ev.get("htmlLink"),
    })
}

/// Whether `event` hosts the Meet conference identified by `code`.
fn event_uses_meeting(event: &Value, code: &str) -> bool {
    if str_field(event, "/conferenceData/conferenceId").as_deref() == Some(code) {
        return true;
    }
    str_field(event, "/hangoutLink")
        .map(|link| link.trim_end_matches('/').ends_with(code))
        .unwrap_or(false)
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn list_calendars(&self, args: &ListCalendarsArgs) -> Result<ToolOutput, WorkspaceError> {
        let mut call = self.hub.calendar_list().list();
        if let Some(n) = args.max_results {
            call = call.max_results(n as i32);
        }
        let (_, list) = call.doit().await.map_err(hub_error)?;
        let v = to_json(&list)?;
        let calendars: Vec<Value> = v
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.get("id"),
                            "summary": c.get("summaryOverride").or_else(|| c.get("summary")),
                            "primary": c.get("primary").and_then(|p| p.as_bool()).unwrap_or(false),
                            "accessRole": c.get("accessRole"),
                            "timeZone": c.get("timeZone"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({ "calendars": calendars }).into())
    }

    async fn list_events(&self, args: &ListEventsArgs) -> Result<ToolOutput, WorkspaceError> {
        let time_min = match &args.time_min {
            Some(t) => timestamp("time_min", t)?,
            None => Utc::now(),
        };
        let limit = args.max_results.unwrap_or(DEFAULT_EVENT_LIMIT);
        let mut call = self
            .hub
            .events()
            .list(calendar_id(args.calendar_id.as_deref()))
            .single_events(true)
            .order_by("startTime")
            .time_min(time_min)
            .max_results(limit as i32);
        if let Some(t) = &args.time_max {
            call = call.time_max(timestamp("time_max", t)?);
        }
        if let Some(q) = &args.query {
            call = call.q(q);
        }
        let (_, events) = call.doit().await.map_err(hub_error)?;
        let v = to_json(&events)?;
        let items: Vec<Value> = v
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| items.iter().map(concise_event).collect())
            .unwrap_or_default();
        Ok(json!({
            "events": items,
            "nextPageToken": v.get("nextPageToken"),
        })
        .into())
    }

    async fn get_event(&self, args: &GetEventArgs) -> Result<ToolOutput, WorkspaceError> {
        let (_, event) = self
            .hub
            .events()
            .get(calendar_id(args.calendar_id.as_deref()), &args.event_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(to_json(&event)?.into())
    }

    async fn query_free_busy(&self, args: &FreeBusyArgs) -> Result<ToolOutput, WorkspaceError> {
        let ids = args
            .calendar_ids
            .clone()
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| vec!["primary".to_string()]);
        let mut body = json!({
            "timeMin": timestamp("time_min", &args.time_min)?.to_rfc3339(),
            "timeMax": timestamp("time_max", &args.time_max)?.to_rfc3339(),
            "items": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
        });
        if let Some(tz) = &args.time_zone {
            body["timeZone"] = json!(tz);
        }
        let request: FreeBusyRequest = serde_json::from_value(body)?;
        let (_, response) = self
            .hub
            .freebusy()
            .query(request)
            .doit()
            .await
            .map_err(hub_error)?;
        let v = to_json(&response)?;
        Ok(json!({
            "timeMin": v.get("timeMin"),
            "timeMax": v.get("timeMax"),
            "calendars": v.get("calendars"),
        })
        .into())
    }

    async fn create_event(&self, args: &CreateEventArgs) -> Result<ToolOutput, WorkspaceError> {
        let tz = args.time_zone.as_deref();
        let mut body = json!({
            "summary": args.summary,
            "start": event_time(&args.start, tz),
            "end": event_time(&args.end, tz),
        });
        if let Some(d) = &args.description {
            body["description"] = json!(d);
        }
        if let Some(l) = &args.location {
            body["location"] = json!(l);
        }
        let attendees = args.attendees.as_deref().filter(|a| !a.is_empty());
        if let Some(a) = attendees {
            body["attendees"] = attendee_list(a);
        }
        let with_meet = args.add_meet_link.unwrap_or(false);
        if with_meet {
            body["conferenceData"] = json!({
                "createRequest": {
                    "requestId": uuid::Uuid::new_v4().to_string(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" },
                }
            });
        }
        let event: Event = serde_json::from_value(body)?;
        let mut call = self
            .hub
            .events()
            .insert(event, calendar_id(args.calendar_id.as_deref()));
        if attendees.is_some() {
            call = call.send_updates("all");
        }
        if with_meet {
            call = call.conference_data_version(1);
        }
        let (_, created) = call.doit().await.map_err(hub_error)?;
        Ok(concise_event(&to_json(&created)?).into())
    }

    async fn update_event(&self, args: &UpdateEventArgs) -> Result<ToolOutput, WorkspaceError> {
        let tz = args.time_zone.as_deref();
        let mut patch = Map::new();
        if let Some(s) = &args.summary {
            patch.insert("summary".into(), json!(s));
        }
        if let Some(s) = &args.start {
            patch.insert("start".into(), event_time(s, tz));
        }
        if let Some(e) = &args.end {
            patch.insert("end".into(), event_time(e, tz));
        }
        if let Some(d) = &args.description {
            patch.insert("description".into(), json!(d));
        }
        if let Some(l) = &args.location {
            patch.insert("location".into(), json!(l));
        }
        if let Some(a) = &args.attendees {
            patch.insert("attendees".into(), attendee_list(a));
        }
        if patch.is_empty() {
            return Err(WorkspaceError::validation("no fields to update"));
        }
        let event: Event = serde_json::from_value(Value::Object(patch))?;
        let mut call = self.hub.events().patch(
            event,
            calendar_id(args.calendar_id.as_deref()),
            &args.event_id,
        );
        if args.attendees.is_some() {
            call = call.send_updates("all");
        }
        let (_, updated) = call.doit().await.map_err(hub_error)?;
        Ok(concise_event(&to_json(&updated)?).into())
    }

    async fn delete_event(&self, args: &DeleteEventArgs) -> Result<ToolOutput, WorkspaceError> {
        self.hub
            .events()
            .delete(calendar_id(args.calendar_id.as_deref()), &args.event_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(ToolOutput::Text(format!("Event {} deleted", args.event_id)))
    }

    async fn meeting_title(&self, meeting_code: &str) -> Result<Option<String>, WorkspaceError> {
        let now = Utc::now();
        let (_, events) = self
            .hub
            .events()
            .list("primary")
            .single_events(true)
            .max_results(250)
            .time_min(now - Duration::days(MEETING_LOOKBACK_DAYS))
            .time_max(now + Duration::days(1))
            .doit()
            .await
            .map_err(hub_error)?;
        let v = to_json(&events)?;
        Ok(v.get("items")
            .and_then(|i| i.as_array())
            .and_then(|items| items.iter().find(|ev| event_uses_meeting(ev, meeting_code)))
            .and_then(|ev| str_field(ev, "/summary")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_day_dates_use_date_field() {
        assert_eq!(event_time("2025-04-02", Some("UTC")), json!({"date": "2025-04-02"}));
        assert_eq!(
            event_time("2025-04-02T10:00:00-07:00", Some("America/Los_Angeles")),
            json!({"dateTime": "2025-04-02T10:00:00-07:00", "timeZone": "America/Los_Angeles"})
        );
        assert_eq!(
            event_time("2025-04-02T10:00:00Z", None),
            json!({"dateTime": "2025-04-02T10:00:00Z"})
        );
    }

    #[test]
    fn default_calendar_is_primary() {
        assert_eq!(calendar_id(None), "primary");
        assert_eq!(calendar_id(Some(" ")), "primary");
        assert_eq!(calendar_id(Some("a@b.c")), "a@b.c");
    }

    #[test]
    fn request_bodies_fit_the_event_type() {
        let body = json!({
            "summary": "Sync",
            "start": event_time("2025-04-02T10:00:00-07:00", Some("America/Los_Angeles")),
            "end": event_time("2025-04-03", None),
            "attendees": attendee_list(&["a@x.com".to_string()]),
        });
        let event: Event = serde_json::from_value(body).unwrap();
        let v = to_json(&event).unwrap();
        assert_eq!(v["summary"], "Sync");
        assert_eq!(v["start"]["timeZone"], "America/Los_Angeles");
        assert_eq!(v["end"]["date"], "2025-04-03");
        assert_eq!(v["attendees"][0]["email"], "a@x.com");
        assert!(timestamp("time_min", "yesterday").is_err());
    }

    #[test]
    fn meeting_matches_by_conference_id_or_link() {
        let by_id = json!({"conferenceData": {"conferenceId": "abc-defg-hij"}});
        let by_link = json!({"hangoutLink": "https://meet.google.com/abc-defg-hij"});
        assert!(event_uses_meeting(&by_id, "abc-defg-hij"));
        assert!(event_uses_meeting(&by_link, "abc-defg-hij"));
        assert!(!event_uses_meeting(&by_link, "zzz-zzzz-zzz"));
    }

    #[test]
    fn concise_event_flattens_times() {
        let ev = json!({
            "id": "e1",
            "summary": "Standup",
            "start": {"dateTime": "2025-01-01T09:00:00Z"},
            "end": {"date": "2025-01-02"},
            "attendees": [{"email": "a@x.com"}, {"email": "b@x.com"}],
        });
        let c = concise_event(&ev);
        assert_eq!(c["start"], "2025-01-01T09:00:00Z");
        assert_eq!(c["end"], "2025-01-02");
        assert_eq!(c["attendees"], json!(["a@x.com", "b@x.com"]));
    }
}
