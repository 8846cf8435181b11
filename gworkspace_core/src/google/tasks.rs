use async_trait::async_trait;
use chrono::NaiveDate;
use google_tasks1::api::Task;
use google_tasks1::TasksHub;
use serde_json::{json, Value};

use super::hub::{hub_error, to_json, Connector, HttpsClient};
use crate::error::WorkspaceError;
use crate::services::api::{TasksApi, ToolOutput};
use crate::tools::args::*;

pub struct GoogleTasks {
    hub: TasksHub<Connector>,
}

impl GoogleTasks {
    pub fn new(client: HttpsClient, access_token: &str) -> Self {
        Self {
            hub: TasksHub::new(client, access_token.to_string()),
        }
    }
}

fn list_id(id: Option<&str>) -> &str {
    id.filter(|s| !s.trim().is_empty()).unwrap_or("@default")
}

/// The Tasks API only keeps the date part of `due` but requires RFC 3339.
pub(crate) fn due_timestamp(due: &str) -> String {
    let due = due.trim();
    match NaiveDate::parse_from_str(due, "%Y-%m-%d") {
        Ok(_) => format!("{}T00:00:00.000Z", due),
        Err(_) => due.to_string(),
    }
}

fn concise_task(t: &Value) -> Value {
    json!({
        "id": t.get("id"),
        "title": t.get("title"),
        "status": t.get("status"),
        "due": t.get("due"),
        "notes": t.get("notes"),
        "completed": t.get("completed"),
    })
}

#[async_trait]
impl TasksApi for GoogleTasks {
    async fn list_task_lists(&self, args: &ListTaskListsArgs) -> Result<ToolOutput, WorkspaceError> {
        let mut call = self.hub.tasklists().list();
        if let Some(n) = args.max_results {
            call = call.max_results(n as i32);
        }
        let (_, lists) = call.doit().await.map_err(hub_error)?;
        let lists: Vec<Value> = to_json(&lists)?
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|l| json!({ "id": l.get("id"), "title": l.get("title"), "updated": l.get("updated") }))
                    .collect()
            })
            .unwrap_or_default();
        Ok(json!({ "taskLists": lists }).into())
    }

    async fn list_tasks(&self, args: &ListTasksArgs) -> Result<ToolOutput, WorkspaceError> {
        let show_completed = args.show_completed.unwrap_or(false);
        let mut call = self
            .hub
            .tasks()
            .list(list_id(args.task_list_id.as_deref()))
            .show_completed(show_completed);
        if show_completed {
            call = call.show_hidden(true);
        }
        if let Some(n) = args.max_results {
            call = call.max_results(n as i32);
        }
        let (_, tasks) = call.doit().await.map_err(hub_error)?;
        let tasks: Vec<Value> = to_json(&tasks)?
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| items.iter().map(concise_task).collect())
            .unwrap_or_default();
        Ok(json!({ "tasks": tasks }).into())
    }

    async fn create_task(&self, args: &CreateTaskArgs) -> Result<ToolOutput, WorkspaceError> {
        let mut body = json!({ "title": args.title });
        if let Some(n) = &args.notes {
            body["notes"] = json!(n);
        }
        if let Some(d) = &args.due {
            body["due"] = json!(due_timestamp(d));
        }
        let task: Task = serde_json::from_value(body)?;
        let (_, created) = self
            .hub
            .tasks()
            .insert(task, list_id(args.task_list_id.as_deref()))
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(concise_task(&to_json(&created)?).into())
    }

    async fn complete_task(&self, args: &TaskRefArgs) -> Result<ToolOutput, WorkspaceError> {
        let task = Task {
            status: Some("completed".to_string()),
            ..Default::default()
        };
        let (_, updated) = self
            .hub
            .tasks()
            .patch(task, list_id(args.task_list_id.as_deref()), &args.task_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(concise_task(&to_json(&updated)?).into())
    }

    async fn delete_task(&self, args: &TaskRefArgs) -> Result<ToolOutput, WorkspaceError> {
        self.hub
            .tasks()
            .delete(list_id(args.task_list_id.as_deref()), &args.task_id)
            .doit()
            .await
            .map_err(hub_error)?;
        Ok(ToolOutput::Text(format!("Task {} deleted", args.task_id)))
    }
}
