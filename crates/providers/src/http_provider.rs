use crate::traits::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request body for the bashai translation server.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    system_prompt: &'a str,
    prompt: String,
}

/// The server answers with one of these shapes.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default, alias = "filename")]
    file_name: Option<String>,
    #[serde(default)]
    file_content: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

/// HTTP text-generation client.
///
/// With a model configured it speaks the OpenAI-compatible
/// `/chat/completions` API; without one it uses the server's `/generate`
/// contract.
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: String, api_key: Option<String>, model: Option<String>) -> Self {
        Self::with_timeout(base_url, api_key, model, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: String,
        api_key: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        debug!("llm url={} api_key_present={}", url, self.api_key.is_some());

        let mut request = self.client.post(url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let msg = match status.as_u16() {
                401 | 403 => format!("Authentication failed ({}). Details: {}", status, text),
                404 => format!("Invalid endpoint (404 Not Found). Details: {}", text),
                429 => format!("Rate limit exceeded. Details: {}", text),
                _ => format!("{}: {}", status, text),
            };
            return Err(ProviderError::Api(msg));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn chat_completion(&self, model: &str, messages: &[Message]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": 0.2,
        });

        let json = self.post(&url, body).await?;

        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

        choice["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::Parse("Choice has no text content".to_string()))
    }

    async fn server_generate(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let url = format!("{}/generate", self.base_url);
        let system_prompt = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let prompt = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = serde_json::to_value(GenerateRequest {
            system_prompt,
            prompt,
        })
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let json = self.post(&url, body).await?;
        let parsed: GenerateResponse =
            serde_json::from_value(json).map_err(|e| ProviderError::Parse(e.to_string()))?;
        reply_text(parsed)
    }
}

/// Structured server answers are rendered in the same textual grammar the
/// reply parser understands.
fn reply_text(parsed: GenerateResponse) -> Result<String, ProviderError> {
    let explanation = parsed.explanation.unwrap_or_default();

    if let (Some(name), Some(content)) = (non_blank(parsed.file_name), non_blank(parsed.file_content)) {
        return Ok(format!("```file:{}\n{}\n```\n{}", name.trim(), content.trim_end(), explanation));
    }
    if let Some(command) = non_blank(parsed.command) {
        return Ok(format!("{}\n{}", command.trim(), explanation));
    }
    non_blank(parsed.response)
        .or(non_blank(parsed.content))
        .ok_or_else(|| ProviderError::Parse("Response has no recognizable text field".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::Http(format!("Network connection failed: {}", e))
    } else {
        ProviderError::Http(e.to_string())
    }
}

#[async_trait]
impl LLMProvider for HttpProvider {
    async fn generate(&self, messages: &[Message]) -> Result<String, ProviderError> {
        match &self.model {
            Some(model) => self.chat_completion(model, messages).await,
            None => self.server_generate(messages).await,
        }
    }

    fn name(&self) -> &str {
        if self.model.is_some() {
            "OpenAI Compatible"
        } else {
            "Bash.ai Server"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts one connection, answers with `status` and `body`, and returns
    /// the raw request it received.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&received).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn messages() -> Vec<Message> {
        vec![Message::system("be terse"), Message::user("list files")]
    }

    #[tokio::test]
    async fn test_chat_completion_format() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "```bash\nls\n```"}}]
        })
        .to_string();
        let (url, server) = serve_once("200 OK", body).await;
        let provider = HttpProvider::new(url, Some("secret".to_string()), Some("gpt-x".to_string()));

        let reply = provider.generate(&messages()).await.unwrap();
        assert_eq!(reply, "```bash\nls\n```");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains("\"model\":\"gpt-x\""));
    }

    #[tokio::test]
    async fn test_server_generate_command_shape() {
        let body = json!({"command": "ls -la", "explanation": "long listing"}).to_string();
        let (url, server) = serve_once("200 OK", body).await;
        let provider = HttpProvider::new(format!("{}/", url), None, None);

        let reply = provider.generate(&messages()).await.unwrap();
        assert_eq!(reply, "ls -la\nlong listing");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /generate"));
        assert!(request.contains("\"system_prompt\":\"be terse\""));
        assert!(!request.to_lowercase().contains("authorization"));
    }

    #[test]
    fn test_blank_command_is_malformed() {
        let parsed: GenerateResponse = serde_json::from_value(json!({
            "command": "  ",
            "explanation": "I cannot help with deleting system files"
        }))
        .unwrap();
        assert!(matches!(reply_text(parsed), Err(ProviderError::Parse(_))));

        let parsed: GenerateResponse = serde_json::from_value(json!({
            "filename": "a.sh",
            "file_content": "",
            "command": "ls"
        }))
        .unwrap();
        assert_eq!(reply_text(parsed).unwrap(), "ls\n");
    }

    #[tokio::test]
    async fn test_server_generate_file_shape() {
        let body = json!({"filename": "hello.py", "file_content": "print('hi')\n"}).to_string();
        let (url, _server) = serve_once("200 OK", body).await;
        let provider = HttpProvider::new(url, None, None);

        let reply = provider.generate(&messages()).await.unwrap();
        assert!(reply.starts_with("```file:hello.py\nprint('hi')\n```"));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}".to_string()).await;
        let provider = HttpProvider::new(url, None, None);
        let err = provider.generate(&messages()).await.unwrap_err();
        match err {
            ProviderError::Api(msg) => assert!(msg.contains("Rate limit")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_body() {
        let (url, _server) = serve_once("200 OK", json!({"other": 1}).to_string()).await;
        let provider = HttpProvider::new(url, None, None);
        let err = provider.generate(&messages()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = HttpProvider::new(format!("http://{}", addr), None, None);
        let err = provider.generate(&messages()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let provider = HttpProvider::with_timeout(
            format!("http://{}", addr),
            None,
            None,
            Duration::from_millis(200),
        );
        let err = provider.generate(&messages()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[test]
    fn test_name_reflects_protocol() {
        let server = HttpProvider::new("http://x".to_string(), None, None);
        assert_eq!(server.name(), "Bash.ai Server");
        let chat = HttpProvider::new("http://x".to_string(), None, Some("m".to_string()));
        assert_eq!(chat.name(), "OpenAI Compatible");
    }
}
