//! HTTP server for the chat API
//! Plain tokio listener with minimal HTTP/1.1 handling

use nl2sql::config::AppConfig;
use nl2sql::{logging, App, ChatRequest, ChatResponse, Nl2SqlError};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const MAX_REQUEST_BYTES: usize = 1_000_000;

struct Response {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn error(err: &Nl2SqlError) -> Self {
        Self::json(err.status_code(), json!({ "detail": err.to_string() }))
    }

    fn event_stream(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            body,
        }
    }

    fn to_http(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
        );
        if self.content_type == "text/event-stream" {
            head.push_str("Cache-Control: no-cache\r\n");
        }
        head.push_str("\r\n");
        head.push_str(&self.body);
        head
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let config = AppConfig::from_env()?;
    let app = Arc::new(App::bootstrap(&config).await?);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server listening on http://{}", address);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&app)));
    }
}

async fn handle_connection(mut stream: TcpStream, app: Arc<App>) {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    if !matches!(read_result, Ok(Ok(()))) {
        warn!("Request read failed or timed out");
        return;
    }
    if buffer.is_empty() {
        return;
    }

    let response = match String::from_utf8(buffer) {
        Ok(request) => handle_request(&request, &app).await,
        Err(_) => Response::json(400, json!({ "detail": "Request is not valid UTF-8" })),
    };

    if let Err(e) = stream.write_all(response.to_http().as_bytes()).await {
        warn!("Failed to write response: {}", e);
    }
}

/// Headers are in and, when a Content-Length is given, the whole body too.
fn request_complete(buffer: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(buffer) else {
        return false;
    };
    let Some(headers_end) = text.find("\r\n\r\n") else {
        return false;
    };
    match extract_content_length(text) {
        Some(length) => buffer.len() >= headers_end + 4 + length,
        None => true,
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    request
        .lines()
        .take_while(|line| !line.is_empty())
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
}

/// Split a raw request into method, path (query string and trailing slash removed) and body.
fn parse_request(request: &str) -> Option<(&str, &str, &str)> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let full_path = parts.next()?;

    let path = full_path.split('?').next().unwrap_or(full_path);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let body = request.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("");
    Some((method, path, body))
}

async fn handle_request(request: &str, app: &App) -> Response {
    let Some((method, path, body)) = parse_request(request) else {
        return Response::json(400, json!({ "detail": "Bad Request" }));
    };
    debug!("Request: {} {}", method, path);

    match (method, path) {
        ("GET", "/health") => Response::json(200, json!({ "status": "ok" })),
        ("POST", "/chat") => handle_chat(body, app).await,
        ("GET", "/schema") => {
            let schema = app.service.catalog().snapshot();
            match serde_json::to_value(&*schema) {
                Ok(value) => Response::json(200, value),
                Err(e) => Response::error(&Nl2SqlError::Json(e)),
            }
        }
        ("POST", "/schema/refresh") => match app.refresh_schema().await {
            Ok(schema) => Response::json(200, json!({ "tables": schema.tables.len() })),
            Err(e) => {
                error!("Schema refresh failed: {}", e);
                Response::error(&e)
            }
        },
        ("OPTIONS", _) => Response::json(200, json!({})),
        _ => Response::json(
            404,
            json!({ "detail": format!("Endpoint not found: {} {}", method, path) }),
        ),
    }
}

async fn handle_chat(body: &str, app: &App) -> Response {
    let request: ChatRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return Response::json(400, json!({ "detail": format!("Invalid request body: {}", e) }))
        }
    };

    match app.service.ask(&request.query).await {
        Ok(response) if request.stream => Response::event_stream(encode_events(&response)),
        Ok(response) => match serde_json::to_value(&response) {
            Ok(value) => Response::json(200, value),
            Err(e) => Response::error(&Nl2SqlError::Json(e)),
        },
        Err(e) => {
            error!("Chat request failed: {}", e);
            Response::error(&e)
        }
    }
}

/// Server-sent events: sql, data_start, one data_row per row, data_end, explanation, done.
fn encode_events(response: &ChatResponse) -> String {
    let mut events = vec![json!({ "type": "sql", "content": response.sql })];
    events.push(json!({ "type": "data_start", "count": response.data.len() }));
    for row in &response.data {
        events.push(json!({ "type": "data_row", "row": row }));
    }
    events.push(json!({ "type": "data_end" }));
    if !response.explanation.is_empty() {
        events.push(json!({ "type": "explanation", "content": response.explanation }));
    }
    events.push(json!({ "type": "done" }));

    events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        504 => "Gateway Timeout",
        _ => "Internal Server Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let raw = "POST /chat/?debug=1 HTTP/1.1\r\nHost: x\r\nContent-Length: 17\r\n\r\n{\"query\":\"total\"}";
        let (method, path, body) = parse_request(raw).unwrap();
        assert_eq!(method, "POST");
        assert_eq!(path, "/chat");
        assert_eq!(body, "{\"query\":\"total\"}");
        assert_eq!(parse_request("GET / HTTP/1.1\r\n\r\n").unwrap().1, "/");
    }

    #[test]
    fn test_request_complete_waits_for_body() {
        let partial = b"POST /chat HTTP/1.1\r\ncontent-length: 10\r\n\r\n{\"a\":";
        assert!(!request_complete(partial));
        let full = b"POST /chat HTTP/1.1\r\ncontent-length: 7\r\n\r\n{\"a\":1}";
        assert!(request_complete(full));
        assert!(request_complete(b"GET /health HTTP/1.1\r\n\r\n"));
    }

    #[test]
    fn test_event_stream_order() {
        let mut row = nl2sql::execution::Row::new();
        row.insert("sum".to_string(), json!(42));
        let response = ChatResponse {
            sql: "SELECT 42 AS sum".to_string(),
            data: vec![row],
            explanation: "Query executed successfully. Returned 1 row(s).".to_string(),
        };
        let events = encode_events(&response);
        let types: Vec<String> = events
            .split("\n\n")
            .filter(|e| !e.is_empty())
            .map(|e| {
                let value: serde_json::Value = serde_json::from_str(e.trim_start_matches("data: ")).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            types,
            vec!["sql", "data_start", "data_row", "data_end", "explanation", "done"]
        );
    }

    #[test]
    fn test_error_response_carries_detail() {
        let response = Response::error(&Nl2SqlError::EmptyQuestion);
        assert_eq!(response.status, 400);
        assert!(response.to_http().starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.body.contains("Query cannot be empty"));
    }
}
