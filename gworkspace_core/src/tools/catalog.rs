use rmcp::model::Tool;
use std::collections::HashSet;

use super::scopes::{parse_scope_filter, tools_for_scope};
use super::ToolId;
use crate::services::ServiceKind;

/// Immutable list of the tools exposed by this server.
pub struct ToolCatalog {
    tools: Vec<(ToolId, Tool)>,
}

impl ToolCatalog {
    /// Catalog of tools whose service is in `enabled`, in registration order.
    pub fn new(enabled: &[ServiceKind]) -> Self {
        let tools = ToolId::ALL
            .iter()
            .filter(|id| enabled.contains(&id.service()))
            .map(|id| (*id, id.definition()))
            .collect();
        Self { tools }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up an exposed tool by wire name.
    pub fn find(&self, name: &str) -> Option<ToolId> {
        let id = ToolId::from_name(name)?;
        self.contains(id).then_some(id)
    }

    pub fn contains(&self, id: ToolId) -> bool {
        self.tools.iter().any(|(t, _)| *t == id)
    }

    /// Tool definitions visible under `scopes`.
    ///
    /// `None` (or an empty set) lists everything. Otherwise each scope's
    /// tools are concatenated and deduplicated by name, first occurrence wins.
    pub fn list(&self, scopes: Option<&[&str]>) -> Vec<Tool> {
        let scopes = match scopes {
            Some(s) if !s.is_empty() => s,
            _ => return self.tools.iter().map(|(_, t)| t.clone()).collect(),
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for scope in scopes {
            for id in tools_for_scope(scope) {
                if !seen.insert(*id) {
                    continue;
                }
                if let Some((_, tool)) = self.tools.iter().find(|(t, _)| t == id) {
                    out.push(tool.clone());
                }
            }
        }
        out
    }

    /// [`Self::list`] for a space- or comma-separated scope string.
    pub fn list_from_filter(&self, filter: Option<&str>) -> Vec<Tool> {
        match filter {
            Some(f) => {
                let scopes = parse_scope_filter(f);
                self.list(Some(&scopes))
            }
            None => self.list(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tools: &[Tool]) -> Vec<String> {
        tools.iter().map(|t| t.name.to_string()).collect()
    }

    #[test]
    fn readonly_calendar_scope_lists_four_tools() {
        let catalog = ToolCatalog::new(&ServiceKind::ALL);
        assert_eq!(
            names(&catalog.list(Some(&["calendar.readonly"]))),
            vec![
                "google_calendar_list_calendars",
                "google_calendar_list_events",
                "google_calendar_get_event",
                "google_calendar_query_free_busy",
            ]
        );
    }

    #[test]
    fn union_is_deduplicated_in_first_seen_order() {
        let catalog = ToolCatalog::new(&ServiceKind::ALL);
        let listed = names(&catalog.list(Some(&["calendar.readonly", "calendar"])));
        assert_eq!(listed.len(), 7);
        assert_eq!(
            &listed[..5],
            &[
                "google_calendar_list_calendars",
                "google_calendar_list_events",
                "google_calendar_get_event",
                "google_calendar_query_free_busy",
                "google_calendar_create_event",
            ]
        );

        let listed = names(&catalog.list(Some(&["gmail.send", "gmail.compose"])));
        assert_eq!(listed, vec!["google_gmail_send_email", "google_gmail_create_draft"]);
    }

    #[test]
    fn no_scopes_lists_full_catalog() {
        let catalog = ToolCatalog::new(&ServiceKind::ALL);
        let all = catalog.list(None);
        assert_eq!(all.len(), ToolId::ALL.len());
        assert_eq!(names(&all), names(&catalog.list(Some(&[]))));
        assert_eq!(all[0].name, "google_calendar_list_calendars");
    }

    #[test]
    fn unknown_scopes_yield_nothing() {
        let catalog = ToolCatalog::new(&ServiceKind::ALL);
        assert!(catalog.list(Some(&["spreadsheets"])).is_empty());
    }

    #[test]
    fn disabled_services_are_hidden() {
        let catalog = ToolCatalog::new(&[ServiceKind::Gmail]);
        assert_eq!(catalog.len(), 7);
        assert!(catalog.list(Some(&["calendar"])).is_empty());
        assert!(catalog.find("google_calendar_list_events").is_none());
        assert_eq!(catalog.find("google_gmail_list_labels"), Some(ToolId::GmailListLabels));
    }

    #[test]
    fn filter_string_accepts_full_urls() {
        let catalog = ToolCatalog::new(&ServiceKind::ALL);
        let listed = catalog.list_from_filter(Some(
            "https://www.googleapis.com/auth/tasks.readonly https://www.googleapis.com/auth/gmail.send",
        ));
        assert_eq!(
            names(&listed),
            vec!["google_tasks_list_task_lists", "google_tasks_list_tasks", "google_gmail_send_email"]
        );
    }
}
