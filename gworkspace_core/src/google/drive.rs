use async_trait::async_trait;
use google_drive3::api::{File, Permission};
use google_drive3::DriveHub;
use serde_json::json;
use std::io::Cursor;

use super::hub::{body_bytes, hub_error, to_json, Connector, HttpsClient};
use crate::error::WorkspaceError;
use crate::services::api::{DriveApi, ToolOutput};
use crate::tools::args::*;

const DEFAULT_PAGE_SIZE: u32 = 20;
const SEARCH_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, modifiedTime, size, webViewLink, owners(displayName, emailAddress))";
const FILE_FIELDS: &str = "id, name, mimeType, modifiedTime, createdTime, size, webViewLink, parents, owners(displayName, emailAddress), shared, description";
const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";

pub struct GoogleDrive {
    hub: DriveHub<Connector>,
}

impl GoogleDrive {
    pub fn new(client: HttpsClient, access_token: &str) -> Self {
        Self {
            hub: DriveHub::new(client, access_token.to_string()),
        }
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn looks_like_drive_query(q: &str) -> bool {
    [" contains ", " = ", " != ", " in ", " has ", "trashed", "mimeType", "modifiedTime"]
        .iter()
        .any(|op| q.contains(op))
}

/// Build the `q` parameter. Raw Drive query syntax passes through; plain text
/// becomes a name/full-text match. Trashed files are always excluded.
pub(crate) fn build_search_query(query: Option<&str>, mime_type: Option<&str>) -> String {
    let mut clauses = Vec::new();
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        if looks_like_drive_query(q) {
            clauses.push(format!("({})", q));
        } else {
            let lit = escape_literal(q);
            clauses.push(format!("(name contains '{}' or fullText contains '{}')", lit, lit));
        }
    }
    if let Some(m) = mime_type {
        clauses.push(format!("mimeType = '{}'", escape_literal(m)));
    }
    if !query.map_or(false, |q| q.contains("trashed")) {
        clauses.push("trashed = false".to_string());
    }
    clauses.join(" and ")
}

/// Export format for a Google-native document, `None` for formats with no text rendering.
pub(crate) fn default_export_type(mime: &str) -> Option<&'static str> {
    match mime.strip_prefix(GOOGLE_APPS_PREFIX)? {
        "document" => Some("text/plain"),
        "spreadsheet" => Some("text/csv"),
        "presentation" => Some("text/plain"),
        "script" => Some("application/vnd.google-apps.script+json"),
        "drawing" => Some("image/svg+xml"),
        _ => None,
    }
}

fn media_type<M: std::str::FromStr>(mime: &str) -> Result<M, WorkspaceError> {
    mime.parse()
        .map_err(|_| WorkspaceError::validation(format!("field 'mime_type' is not a media type: {}", mime)))
}

#[async_trait]
impl DriveApi for GoogleDrive {
    async fn search_files(&self, args: &SearchFilesArgs) -> Result<ToolOutput, WorkspaceError> {
        let q = build_search_query(args.query.as_deref(), args.mime_type.as_deref());
        let mut call = self
            .hub
            .files()
            .list()
            .q(&q)
            .page_size(args.page_size.unwrap_or(DEFAULT_PAGE_SIZE) as i32)
            .supports_all_drives(true)
            .include_items_from_all_drives(true)
            .param("fields", SEARCH_FIELDS);
        if let Some(t) = &args.page_token {
            call = call.page_token(t);
        }
        let (_, list) = call.doit().await.map_err(hub_error)?;
        Ok(to_json(&list)?.into())
    }

    async fn get_file(&self, args: &GetFileArgs) -> Result<ToolOutput, WorkspaceError> {
        let (_, file) = self
            .hub
            .files()
            .get(&args.file_id)
            .supports_all_drives(true)
            .param("fields", FILE_FIELDS)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(to_json(&file)?.into())
    }

    async fn read_file(&self, args: &ReadFileArgs) -> Result<ToolOutput, WorkspaceError> {
        let (_, meta) = self
            .hub
            .files()
            .get(&args.file_id)
            .supports_all_drives(true)
            .param("fields", "id, name, mimeType, size")
            .doit()
            .await
            .map_err(hub_error)?;
        let mime = meta.mime_type.unwrap_or_default();
        let name = meta.name.unwrap_or_else(|| args.file_id.clone());

        let resp = if mime.starts_with(GOOGLE_APPS_PREFIX) {
            let export = args
                .export_mime_type
                .as_deref()
                .or_else(|| default_export_type(&mime))
                .ok_or_else(|| {
                    WorkspaceError::Upstream(format!("'{}' ({}) cannot be exported as text", name, mime))
                })?;
            self.hub
                .files()
                .export(&args.file_id, export)
                .doit()
                .await
                .map_err(hub_error)?
        } else {
            let (resp, _) = self
                .hub
                .files()
                .get(&args.file_id)
                .supports_all_drives(true)
                .param("alt", "media")
                .doit()
                .await
                .map_err(hub_error)?;
            resp
        };
        let bytes = body_bytes(resp).await?;

        match String::from_utf8(bytes) {
            Ok(text) => Ok(ToolOutput::Text(text)),
            Err(e) => Ok(ToolOutput::Text(format!(
                "'{}' is a binary file ({}, {} bytes) and cannot be shown as text",
                name,
                mime,
                e.as_bytes().len()
            ))),
        }
    }

    async fn create_file(&self, args: &CreateFileArgs) -> Result<ToolOutput, WorkspaceError> {
        let mime = args.mime_type.as_deref().unwrap_or("text/plain");
        let meta = File {
            name: Some(args.name.clone()),
            mime_type: Some(mime.to_string()),
            parents: args.parent_id.clone().map(|p| vec![p]),
            ..Default::default()
        };
        // Metadata-only files (folders, empty docs) go up as an empty media part.
        let content = args.content.clone().unwrap_or_default().into_bytes();
        let (_, created) = self
            .hub
            .files()
            .create(meta)
            .supports_all_drives(true)
            .param("fields", "id, name, mimeType, webViewLink")
            .upload(Cursor::new(content), media_type(mime)?)
            .await
            .map_err(hub_error)?;
        Ok(to_json(&created)?.into())
    }

    async fn share_file(&self, args: &ShareFileArgs) -> Result<ToolOutput, WorkspaceError> {
        let mut body = json!({ "role": args.role, "type": args.grantee_type });
        if let Some(e) = &args.email_address {
            body["emailAddress"] = json!(e);
        }
        if let Some(d) = &args.domain {
            body["domain"] = json!(d);
        }
        let permission: Permission = serde_json::from_value(body)?;
        let mut call = self
            .hub
            .permissions()
            .create(permission, &args.file_id)
            .supports_all_drives(true);
        if matches!(args.grantee_type, GranteeType::User | GranteeType::Group) {
            call = call.send_notification_email(args.send_notification.unwrap_or(true));
            if let Some(m) = &args.message {
                call = call.email_message(m);
            }
        }
        if args.role == SharingRole::Owner {
            call = call.transfer_ownership(true);
        }
        let (_, created) = call.doit().await.map_err(hub_error)?;
        Ok(json!({
            "permissionId": created.id,
            "fileId": args.file_id,
            "role": created.role,
            "type": created.type_,
        })
        .into())
    }
}
