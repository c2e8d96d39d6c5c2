use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::generator::Generator;
use crate::types::{GenerationOutput, GenerationRequest};
use crate::{prompt, AgentError, Result};

// ─── HttpGenerator ────────────────────────────────────────────────────────

/// Calls a remote generation endpoint.
///
/// The endpoint receives a JSON body with the rendered prompt and the raw
/// request fields, authenticated with the request's API key as a bearer
/// token. A reply of the form `{"output": "<text>"}` is treated as model text;
/// any other JSON reply is taken as an already-structured result; a non-JSON
/// reply body is treated as model text.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    description: &'a str,
    technology: &'a str,
    difficulty: &'a str,
}

impl HttpGenerator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn call(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let api_key = request
            .credentials
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::MissingCredentials("no API key configured".into()))?;

        let body = GenerateBody {
            model: &request.credentials.model,
            prompt: prompt::render(request),
            description: &request.description,
            technology: &request.technology,
            difficulty: &request.difficulty,
        };

        debug!(endpoint = %self.endpoint, model = %request.credentials.model, "http generator: POST");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if status.as_u16() == 429 {
            return Err(AgentError::RateLimited(format!("HTTP 429: {text}")));
        }
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, %status, "http generator: request failed");
            let msg = format!("HTTP {status}: {text}");
            return Err(match AgentError::from_message(msg) {
                AgentError::Process(m) => AgentError::Http(m),
                other => other,
            });
        }

        Ok(classify_reply(text))
    }
}

fn classify_reply(text: String) -> GenerationOutput {
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(mut obj)) => match obj.remove("output") {
            Some(Value::String(s)) if obj.is_empty() => GenerationOutput::Text(s),
            Some(other) => {
                obj.insert("output".into(), other);
                GenerationOutput::Structured(Value::Object(obj))
            }
            None => GenerationOutput::Structured(Value::Object(obj)),
        },
        Ok(other @ Value::Array(_)) => GenerationOutput::Structured(other),
        _ => GenerationOutput::Text(text),
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput> {
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.call(request) => result,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credentials;
    use serde_json::json;

    fn request(api_key: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            description: "Build a Snake Game".into(),
            technology: "Python".into(),
            difficulty: "Beginner".into(),
            context: String::new(),
            credentials: Credentials {
                api_key: api_key.map(String::from),
                model: "fast".into(),
            },
        }
    }

    #[test]
    fn reply_classification() {
        assert_eq!(
            classify_reply(r#"{"output": "here you go"}"#.into()),
            GenerationOutput::Text("here you go".into())
        );
        assert_eq!(
            classify_reply(r#"{"main.py": "print(1)"}"#.into()),
            GenerationOutput::Structured(json!({"main.py": "print(1)"}))
        );
        assert_eq!(
            classify_reply("Sorry, I cannot help with that.".into()),
            GenerationOutput::Text("Sorry, I cannot help with that.".into())
        );
        // An "output" key beside file entries is just another file.
        assert_eq!(
            classify_reply(r#"{"output": "x", "a.txt": "y"}"#.into()),
            GenerationOutput::Structured(json!({"output": "x", "a.txt": "y"}))
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let gen = HttpGenerator::new("http://127.0.0.1:9/never-called");
        let err = gen
            .generate(&request(None), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn posts_prompt_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_header("authorization", "Bearer k-1")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "fast",
                "technology": "Python",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"output": "```json\n{\"main.py\": \"x\"}\n```"}"#)
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()));
        let out = gen
            .generate(&request(Some("k-1")), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            out,
            GenerationOutput::Text("```json\n{\"main.py\": \"x\"}\n```".into())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_429_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()));
        let err = gen
            .generate(&request(Some("k-1")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RateLimited(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn server_error_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let gen = HttpGenerator::new(format!("{}/generate", server.url()));
        let err = gen
            .generate(&request(Some("k-1")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Http(_)), "got {err:?}");
    }
}
