use rmcp::model::{CallToolResult, Content};

use crate::error::WorkspaceError;
use crate::services::ToolOutput;

/// Successful envelope: one text item, `isError: false`.
pub fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text.into())],
        structured_content: None,
        is_error: Some(false),
        meta: None,
    }
}

/// Failed envelope: one text item, `isError: true`.
pub fn error_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text.into())],
        structured_content: None,
        is_error: Some(true),
        meta: None,
    }
}

/// Wrap an operation outcome in the uniform response envelope.
pub fn envelope(outcome: Result<ToolOutput, WorkspaceError>) -> CallToolResult {
    match outcome {
        Ok(output) => text_result(output.into_text()),
        Err(WorkspaceError::UnknownTool(name)) => error_result(format!("Unknown tool: {}", name)),
        Err(e) => error_result(format!("Error: {}", e)),
    }
}

/// Text of the first content item, if it is text.
pub fn first_text(result: &CallToolResult) -> Option<&str> {
    result
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_serialize_exactly() {
        let ok = serde_json::to_value(text_result("done")).unwrap();
        assert_eq!(ok, json!({"content": [{"type": "text", "text": "done"}], "isError": false}));

        let err = serde_json::to_value(envelope(Err(WorkspaceError::UnknownTool("x".into())))).unwrap();
        assert_eq!(
            err,
            json!({"content": [{"type": "text", "text": "Unknown tool: x"}], "isError": true})
        );
    }

    #[test]
    fn other_errors_are_prefixed() {
        let result = envelope(Err(WorkspaceError::Upstream("Not Found".into())));
        assert_eq!(first_text(&result), Some("Error: Not Found"));
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn json_output_is_pretty_printed() {
        let result = envelope(Ok(ToolOutput::Json(json!({"id": "e1"}))));
        assert_eq!(first_text(&result), Some("{\n  \"id\": \"e1\"\n}"));
    }
}
