use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Instant;

use super::{ChatProvider, CompletionRequest, CompletionResponse, ProviderResult, api_key_from_env};
use crate::models::TokenUsage;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions client
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Create a client whose API key is read from `api_key_env`
    pub fn from_env(api_key_env: &str, base_url: &str) -> ProviderResult<Self> {
        let api_key = api_key_from_env(api_key_env)?;
        Ok(Self::new(api_key, base_url))
    }

    /// Build the chat completion request
    fn build_request(
        &self,
        request: &CompletionRequest,
    ) -> ProviderResult<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);

        if let Some(system) = &request.system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_message.clone())
                .build()?
                .into(),
        );

        Ok(CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens.min(u16::MAX as u32) as u16)
            .build()?)
    }

    /// Pull the text and token usage out of the API response
    fn extract_response(response: CreateChatCompletionResponse) -> (String, TokenUsage) {
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|usage| TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        (content, usage)
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let api_request = self.build_request(request)?;

        let start = Instant::now();
        let response = self.client.chat().create(api_request).await?;
        let latency = start.elapsed();

        let (content, usage) = Self::extract_response(response);
        Ok(CompletionResponse {
            content,
            usage,
            latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn completion_body(content: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })
        .to_string()
    }

    #[test]
    fn test_from_env_missing_key() {
        let result =
            OpenAiClient::from_env("PROMPT_TOURNAMENT_TEST_NO_OPENAI_KEY", DEFAULT_BASE_URL);
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_complete_sends_system_and_user_messages() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("You are a geography tutor".to_string()),
                Matcher::Regex("capital of France".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Paris"))
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", &server.url());
        let request =
            CompletionRequest::new("gpt-4o-mini-2024-07-18", "What is the capital of France?")
                .with_system("You are a geography tutor.");

        let response = client.complete(&request).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.content, "Paris");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error": {"message": "model not found", "type": "invalid_request_error", "param": null, "code": null}}"#,
            )
            .create_async()
            .await;

        let client = OpenAiClient::new("test-key", &server.url());
        let request = CompletionRequest::new("gpt-unknown", "hello");

        let result = client.complete(&request).await;
        assert!(result.is_err());
        assert!(!result.unwrap_err().is_transient());
    }
}
