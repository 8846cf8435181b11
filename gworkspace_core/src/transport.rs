use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::mcp_server::JsonRpcHandler;

/// Stdio transport for MCP server.
///
/// One JSON-RPC message per line. Each message is handled on its own task so a
/// slow tool call never blocks the others; responses are written in completion
/// order through a single writer.
pub struct StdioTransport {
    handler: Arc<JsonRpcHandler>,
}

impl StdioTransport {
    pub fn new(handler: Arc<JsonRpcHandler>) -> Self {
        Self { handler }
    }

    /// Run the stdio transport, reading from stdin and writing to stdout
    pub async fn run(&self) -> io::Result<()> {
        info!("Starting stdio transport");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF and all in-flight requests have answered.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let mut lines = BufReader::new(reader).lines();
        let reading = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        debug!("Processing line: {}", line);
                        let handler = Arc::clone(&self.handler);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            if let Some(response) = handler.handle_message(&line, None).await {
                                if tx.send(response).is_err() {
                                    error!("response channel closed");
                                }
                            }
                        });
                    }
                    Ok(None) => {
                        debug!("EOF reached on stdin");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading from stdin: {}", e);
                        break;
                    }
                }
            }
            // Writer drains once the spawned tasks drop their senders.
            drop(tx);
        };

        let writing = async {
            while let Some(response) = rx.recv().await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                debug!("Sent response: {}", response);
            }
            Ok::<(), io::Error>(())
        };

        let ((), written) = tokio::join!(reading, writing);
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::mcp_server::McpServer;
    use crate::services::ServiceKind;
    use crate::session::{CachePolicy, SessionManager};
    use crate::testing::StubFactory;
    use crate::tools::ToolCatalog;
    use serde_json::Value;

    fn transport() -> StdioTransport {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(StubFactory::new()),
            true,
            ServiceKind::ALL.to_vec(),
            CachePolicy::default(),
        ));
        let catalog = Arc::new(ToolCatalog::new(&ServiceKind::ALL));
        let server = Arc::new(McpServer::new(Arc::new(Dispatcher::new(sessions, catalog))));
        StdioTransport::new(Arc::new(JsonRpcHandler::new(server)))
    }

    #[tokio::test]
    async fn answers_each_request_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{"scopes":"tasks.readonly"}}"#,
            "\n",
        );
        let mut output = Vec::new();
        transport().serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        let by_id = |id: Value| responses.iter().find(|r| r["id"] == id).cloned().unwrap();
        assert_eq!(by_id(Value::from(1))["result"], serde_json::json!({}));
        assert_eq!(by_id(Value::Null)["error"]["code"], -32700);
        assert_eq!(
            by_id(Value::from(2))["result"]["tools"].as_array().unwrap().len(),
            2
        );
    }
}
