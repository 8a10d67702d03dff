//! OpenAI-compatible HTTP vision client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::PerceiverError;
use crate::parse::parse_locate_reply;
use crate::prompt::{build_locate_prompt, SYSTEM_PROMPT};
use crate::{Perception, VisionPerceiver};

/// Configuration for the HTTP vision client.
#[derive(Clone, Debug)]
pub struct VisionClientConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Max tokens in the reply.
    pub max_tokens: u32,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for VisionClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            max_tokens: 300,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl VisionClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `VisionPerceiver` backed by an OpenAI-compatible chat endpoint.
pub struct HttpVisionPerceiver {
    client: reqwest::Client,
    config: VisionClientConfig,
}

impl HttpVisionPerceiver {
    pub fn new(config: VisionClientConfig) -> Result<Self, PerceiverError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PerceiverError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_request(&self, screenshot: &[u8], description: &str) -> ApiRequest {
        let image_b64 = Base64.encode(screenshot);
        ApiRequest {
            model: self.config.model.clone(),
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ApiMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: build_locate_prompt(description),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:image/png;base64,{}", image_b64),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl VisionPerceiver for HttpVisionPerceiver {
    async fn locate(
        &self,
        screenshot: &[u8],
        description: &str,
    ) -> Result<Perception, PerceiverError> {
        debug!(model = %self.config.model, description, "vision locate");

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&self.build_request(screenshot, description));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PerceiverError::Timeout(self.config.request_timeout.as_millis() as u64)
            } else {
                PerceiverError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "vision API rejected request");
            return Err(PerceiverError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| PerceiverError::MalformedReply(e.to_string()))?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| PerceiverError::MalformedReply("empty choices".to_string()))?;

        parse_locate_reply(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_reply(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    async fn perceiver_for(server: &MockServer) -> HttpVisionPerceiver {
        let config = VisionClientConfig::new(format!("{}/v1/chat/completions", server.uri()))
            .model("test-model")
            .request_timeout(Duration::from_secs(2));
        HttpVisionPerceiver::new(config).unwrap()
    }

    #[tokio::test]
    async fn locates_element_from_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
                r#"{"found": true, "x": 100, "y": 50, "w": 40, "h": 20, "confidence": 0.85}"#,
            )))
            .mount(&server)
            .await;

        let perceiver = perceiver_for(&server).await;
        let perception = perceiver.locate(b"png-bytes", "Login button").await.unwrap();
        match perception {
            Perception::Located { bbox, confidence } => {
                assert_eq!(bbox.center().x, 120.0);
                assert!((confidence - 0.85).abs() < 1e-6);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn not_found_reply_is_definite() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_reply(r#"{"found": false}"#)),
            )
            .mount(&server)
            .await;

        let perceiver = perceiver_for(&server).await;
        let perception = perceiver.locate(b"png-bytes", "Ghost button").await.unwrap();
        assert_eq!(perception, Perception::NotFound);
    }

    #[tokio::test]
    async fn server_error_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let perceiver = perceiver_for(&server).await;
        let err = perceiver.locate(b"png-bytes", "anything").await.unwrap_err();
        assert!(matches!(err, PerceiverError::Api { status: 500, .. }));
    }
}
