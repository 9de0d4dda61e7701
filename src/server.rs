//! LSP server over stdio.
//!
//! JSON-RPC 2.0 with `Content-Length` framing. Requests get exactly one
//! response; notifications get none. Document-sync notifications re-run the
//! analyzer and push a full `textDocument/publishDiagnostics` set for the
//! document, replacing whatever was published before. A handler failure is
//! answered with an internal error and never tears down the session.

use anyhow::{Context, Result};
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    InitializeResult, PublishDiagnosticsParams, ServerCapabilities, ServerInfo,
    TextDocumentSyncCapability, TextDocumentSyncKind, Url,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::diagnostics::to_diagnostics;
use crate::documents::DocumentStore;
use crate::taint::analyze;

const SERVER_NAME: &str = "xsslint";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const METHOD_NOT_FOUND: i32 = -32601;
const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

/// What the dispatcher wants written back, and whether to keep serving.
enum Dispatch {
    /// Response and/or notifications to write, in order
    Messages(Vec<Value>),
    /// `exit` received; stop the loop
    Exit,
}

pub struct LspServer {
    documents: DocumentStore,
}

impl Default for LspServer {
    fn default() -> Self {
        Self::new()
    }
}

impl LspServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DocumentStore::new(),
        }
    }

    /// Serve LSP over stdio until `exit` or EOF.
    pub async fn run(&self) -> Result<()> {
        info!("LSP server starting on stdio");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = tokio::io::BufReader::new(stdin);

        loop {
            let Some(body) = read_message(&mut reader).await? else {
                info!("EOF received, shutting down");
                break;
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&body) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Discarding unparseable message: {}", e);
                    continue;
                }
            };
            debug!("Received: {}", request.method);

            let id = request.id.clone();
            let dispatch = match self.handle_message(request) {
                Ok(dispatch) => dispatch,
                Err(e) => {
                    warn!("Handler error: {:#}", e);
                    if id.is_some() {
                        Dispatch::Messages(vec![serde_json::to_value(JsonRpcResponse::error(
                            id,
                            INTERNAL_ERROR,
                            &format!("Internal error: {e}"),
                        ))?])
                    } else {
                        Dispatch::Messages(Vec::new())
                    }
                }
            };

            match dispatch {
                Dispatch::Messages(messages) => {
                    for message in messages {
                        write_message(&mut stdout, &message).await?;
                    }
                }
                Dispatch::Exit => {
                    info!("exit received, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_message(&self, request: JsonRpcRequest) -> Result<Dispatch> {
        let id = request.id.clone();

        let messages = match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    capabilities: ServerCapabilities {
                        text_document_sync: Some(TextDocumentSyncCapability::Kind(
                            TextDocumentSyncKind::FULL,
                        )),
                        ..Default::default()
                    },
                    server_info: Some(ServerInfo {
                        name: SERVER_NAME.to_string(),
                        version: Some(SERVER_VERSION.to_string()),
                    }),
                };
                vec![serde_json::to_value(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result)?,
                ))?]
            }
            "initialized" => Vec::new(),
            "shutdown" => vec![serde_json::to_value(JsonRpcResponse::success(
                id,
                Value::Null,
            ))?],
            "exit" => return Ok(Dispatch::Exit),
            "textDocument/didOpen" => {
                let params: DidOpenTextDocumentParams = serde_json::from_value(request.params)
                    .context("invalid didOpen params")?;
                let uri = params.text_document.uri;
                self.documents.update(uri.as_str(), &params.text_document.text);
                vec![self.diagnostics_notification(&uri, &params.text_document.text)?]
            }
            "textDocument/didChange" => {
                let params: DidChangeTextDocumentParams = serde_json::from_value(request.params)
                    .context("invalid didChange params")?;
                let uri = params.text_document.uri;
                // Full sync: the last change carries the whole document.
                match params.content_changes.into_iter().last() {
                    Some(change) => {
                        self.documents.update(uri.as_str(), &change.text);
                        vec![self.diagnostics_notification(&uri, &change.text)?]
                    }
                    None => Vec::new(),
                }
            }
            "textDocument/didClose" => {
                let params: DidCloseTextDocumentParams = serde_json::from_value(request.params)
                    .context("invalid didClose params")?;
                let uri = params.text_document.uri;
                self.documents.remove(uri.as_str());
                vec![publish_notification(&uri, Vec::new())?]
            }
            _ => {
                if id.is_some() {
                    vec![serde_json::to_value(JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        &format!("Method not found: {}", request.method),
                    ))?]
                } else {
                    debug!("Ignoring notification: {}", request.method);
                    Vec::new()
                }
            }
        };

        Ok(Dispatch::Messages(messages))
    }

    /// Analyze a document and build its publishDiagnostics notification.
    fn diagnostics_notification(&self, uri: &Url, text: &str) -> Result<Value> {
        let issues = analyze(text);
        debug!("{}: {} issue(s)", uri, issues.len());
        publish_notification(uri, to_diagnostics(&issues))
    }

    #[cfg(test)]
    fn documents(&self) -> &DocumentStore {
        &self.documents
    }
}

fn publish_notification(uri: &Url, diagnostics: Vec<lsp_types::Diagnostic>) -> Result<Value> {
    let params = PublishDiagnosticsParams {
        uri: uri.clone(),
        diagnostics,
        version: None,
    };
    Ok(json!({
        "jsonrpc": "2.0",
        "method": "textDocument/publishDiagnostics",
        "params": serde_json::to_value(params)?,
    }))
}

/// Read one Content-Length framed message body. Returns `None` on a clean
/// EOF or when the headers never declare a length.
async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut header_line = String::new();
        let bytes_read = reader
            .read_line(&mut header_line)
            .await
            .context("failed reading message header")?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let header_line = header_line.trim();
        if header_line.is_empty() {
            break;
        }

        if let Some((name, value)) = header_line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                // Malformed framing ends the stream cleanly rather than
                // erroring out of the serve loop.
                match value.trim().parse::<usize>() {
                    Ok(length) => content_length = Some(length),
                    Err(e) => {
                        warn!("Invalid Content-Length header: {}", e);
                        return Ok(None);
                    }
                }
            }
        }
    }

    let Some(content_length) = content_length else {
        return Ok(None);
    };

    let mut body = vec![0u8; content_length];
    if let Err(e) = reader.read_exact(&mut body).await {
        warn!("Truncated message body: {}", e);
        return Ok(None);
    }
    Ok(Some(body))
}

/// Write one message with Content-Length framing.
async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> Result<()> {
    let body = serde_json::to_string(message)?;
    let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
