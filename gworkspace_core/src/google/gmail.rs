use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use futures::future::join_all;
use google_gmail1::api::{Draft, Message, ModifyMessageRequest};
use google_gmail1::Gmail;
use serde_json::{json, Value};
use std::io::Cursor;
use tracing::warn;

use super::hub::{hub_error, to_json, Connector, HttpsClient};
use super::str_field;
use crate::error::WorkspaceError;
use crate::services::api::{GmailApi, ToolOutput};
use crate::tools::args::*;

const DEFAULT_SEARCH_LIMIT: u32 = 10;
const SUMMARY_HEADERS: &[&str] = &["From", "To", "Subject", "Date"];
const USER: &str = "me";

pub struct GoogleGmail {
    hub: Gmail<Connector>,
}

impl GoogleGmail {
    pub fn new(client: HttpsClient, access_token: &str) -> Self {
        Self {
            hub: Gmail::new(client, access_token.to_string()),
        }
    }

    async fn message_summary(&self, id: &str) -> Result<Value, WorkspaceError> {
        let mut call = self.hub.users().messages_get(USER, id).format("metadata");
        for h in SUMMARY_HEADERS {
            call = call.add_metadata_headers(h);
        }
        let (_, msg) = call.doit().await.map_err(hub_error)?;
        let msg = to_json(&msg)?;
        Ok(json!({
            "id": msg.get("id"),
            "threadId": msg.get("threadId"),
            "from": header(&msg, "From"),
            "to": header(&msg, "To"),
            "subject": header(&msg, "Subject"),
            "date": header(&msg, "Date"),
            "snippet": msg.get("snippet"),
            "labelIds": msg.get("labelIds"),
        }))
    }
}

fn header(msg: &Value, name: &str) -> Option<String> {
    msg.pointer("/payload/headers")?
        .as_array()?
        .iter()
        .find(|h| {
            h.get("name")
                .and_then(|n| n.as_str())
                .map_or(false, |n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| str_field(h, "/value"))
}

/// Decode a body part in either base64 alphabet, tolerating missing padding.
fn decode_part(data: &str) -> Option<String> {
    let data = data.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| STANDARD_NO_PAD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// First body part of `mime` found depth-first in a message payload.
fn find_body(part: &Value, mime: &str) -> Option<String> {
    if part.get("mimeType").and_then(|m| m.as_str()) == Some(mime) {
        if let Some(data) = part.pointer("/body/data").and_then(|d| d.as_str()) {
            return decode_part(data);
        }
    }
    part.get("parts")?
        .as_array()?
        .iter()
        .find_map(|p| find_body(p, mime))
}

fn attachments(part: &Value, out: &mut Vec<Value>) {
    if let Some(name) = part.get("filename").and_then(|f| f.as_str()) {
        if !name.is_empty() {
            out.push(json!({
                "filename": name,
                "mimeType": part.get("mimeType"),
                "size": part.pointer("/body/size"),
                "attachmentId": part.pointer("/body/attachmentId"),
            }));
        }
    }
    if let Some(parts) = part.get("parts").and_then(|p| p.as_array()) {
        for p in parts {
            attachments(p, out);
        }
    }
}

/// RFC 2047 encoded-word for header values outside printable ASCII.
fn encode_header(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        value.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
        )
    }
}

/// Comma-joined recipients with control characters removed, so an address can
/// never start a new header line.
fn address_list(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|a| a.chars().filter(|c| !c.is_control()).collect::<String>())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the RFC 822 message uploaded as `message/rfc822` media.
pub(crate) fn rfc822_message(args: &ComposeEmailArgs) -> String {
    let mut lines = vec![format!("To: {}", address_list(&args.to))];
    if let Some(cc) = args.cc.as_ref().filter(|c| !c.is_empty()) {
        lines.push(format!("Cc: {}", address_list(cc)));
    }
    if let Some(bcc) = args.bcc.as_ref().filter(|c| !c.is_empty()) {
        lines.push(format!("Bcc: {}", address_list(bcc)));
    }
    lines.push(format!("Subject: {}", encode_header(&args.subject)));
    lines.push("MIME-Version: 1.0".to_string());
    lines.push(format!(
        "Content-Type: {}; charset=\"UTF-8\"",
        args.content_type.unwrap_or_default().mime()
    ));
    lines.push("Content-Transfer-Encoding: 8bit".to_string());
    format!("{}\r\n\r\n{}", lines.join("\r\n"), args.body)
}

/// Message metadata sent alongside the media upload.
fn outgoing(args: &ComposeEmailArgs) -> Message {
    Message {
        thread_id: args.thread_id.clone(),
        ..Default::default()
    }
}

fn rfc822_media(args: &ComposeEmailArgs) -> Cursor<Vec<u8>> {
    Cursor::new(rfc822_message(args).into_bytes())
}

#[async_trait]
impl GmailApi for GoogleGmail {
    async fn search_messages(&self, args: &SearchMessagesArgs) -> Result<ToolOutput, WorkspaceError> {
        let mut call = self
            .hub
            .users()
            .messages_list(USER)
            .max_results(args.max_results.unwrap_or(DEFAULT_SEARCH_LIMIT));
        if let Some(q) = &args.query {
            call = call.q(q);
        }
        for label in args.label_ids.iter().flatten() {
            call = call.add_label_ids(label);
        }
        if args.include_spam_trash.unwrap_or(false) {
            call = call.include_spam_trash(true);
        }
        let (_, list) = call.doit().await.map_err(hub_error)?;
        let ids: Vec<String> = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        let summaries = join_all(ids.iter().map(|id| self.message_summary(id))).await;
        let mut messages = Vec::with_capacity(summaries.len());
        for (id, summary) in ids.iter().zip(summaries) {
            match summary {
                Ok(s) => messages.push(s),
                Err(e) => {
                    warn!(message_id = %id, "failed to fetch message metadata: {}", e);
                    messages.push(json!({ "id": id }));
                }
            }
        }
        Ok(json!({
            "messages": messages,
            "resultSizeEstimate": list.result_size_estimate,
            "nextPageToken": list.next_page_token,
        })
        .into())
    }

    async fn get_message(&self, args: &GetMessageArgs) -> Result<ToolOutput, WorkspaceError> {
        let format = args.format.unwrap_or_default();
        let (_, msg) = self
            .hub
            .users()
            .messages_get(USER, &args.message_id)
            .format(format.as_str())
            .doit()
            .await
            .map_err(hub_error)?;
        let msg = to_json(&msg)?;
        if format != MessageFormat::Full {
            return Ok(msg.into());
        }
        let payload = msg.get("payload").cloned().unwrap_or(Value::Null);
        let body = find_body(&payload, "text/plain").or_else(|| find_body(&payload, "text/html"));
        let mut files = Vec::new();
        attachments(&payload, &mut files);
        Ok(json!({
            "id": msg.get("id"),
            "threadId": msg.get("threadId"),
            "labelIds": msg.get("labelIds"),
            "from": header(&msg, "From"),
            "to": header(&msg, "To"),
            "cc": header(&msg, "Cc"),
            "subject": header(&msg, "Subject"),
            "date": header(&msg, "Date"),
            "body": body,
            "attachments": files,
        })
        .into())
    }

    async fn list_labels(&self, _args: &ListLabelsArgs) -> Result<ToolOutput, WorkspaceError> {
        let (_, list) = self
            .hub
            .users()
            .labels_list(USER)
            .doit()
            .await
            .map_err(hub_error)?;
        let labels: Vec<Value> = list
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| json!({ "id": l.id, "name": l.name, "type": l.type_ }))
            .collect();
        Ok(json!({ "labels": labels }).into())
    }

    async fn send_email(&self, args: &ComposeEmailArgs) -> Result<ToolOutput, WorkspaceError> {
        let (_, sent) = self
            .hub
            .users()
            .messages_send(outgoing(args), USER)
            .upload(rfc822_media(args), rfc822_mime()?)
            .await
            .map_err(hub_error)?;
        Ok(json!({
            "id": sent.id,
            "threadId": sent.thread_id,
            "labelIds": sent.label_ids,
        })
        .into())
    }

    async fn create_draft(&self, args: &ComposeEmailArgs) -> Result<ToolOutput, WorkspaceError> {
        let draft = Draft {
            message: Some(outgoing(args)),
            ..Default::default()
        };
        let (_, created) = self
            .hub
            .users()
            .drafts_create(draft, USER)
            .upload(rfc822_media(args), rfc822_mime()?)
            .await
            .map_err(hub_error)?;
        let message = created.message.unwrap_or_default();
        Ok(json!({
            "draftId": created.id,
            "messageId": message.id,
            "threadId": message.thread_id,
        })
        .into())
    }

    async fn modify_labels(&self, args: &ModifyLabelsArgs) -> Result<ToolOutput, WorkspaceError> {
        let request = ModifyMessageRequest {
            add_label_ids: Some(args.add_label_ids.clone().unwrap_or_default()),
            remove_label_ids: Some(args.remove_label_ids.clone().unwrap_or_default()),
        };
        let (_, msg) = self
            .hub
            .users()
            .messages_modify(request, USER, &args.message_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(json!({ "id": msg.id, "labelIds": msg.label_ids }).into())
    }

    async fn trash_message(&self, args: &TrashMessageArgs) -> Result<ToolOutput, WorkspaceError> {
        self.hub
            .users()
            .messages_trash(USER, &args.message_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(ToolOutput::Text(format!("Message {} moved to trash", args.message_id)))
    }
}

fn rfc822_mime<M: std::str::FromStr>() -> Result<M, WorkspaceError> {
    "message/rfc822"
        .parse()
        .map_err(|_| WorkspaceError::Internal("invalid media type message/rfc822".into()))
}
