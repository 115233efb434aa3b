use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::OracleConfig;
use crate::utils::{PaperError, PaperResult};

/// OpenAI兼容 API 请求体
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI兼容 API 响应体
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// 文本补全Oracle客户端。所有AI分析都通过这个窄接口进行，
/// 调用方负责为每个调用点定义失败时的中性回退值。
pub struct OracleClient {
    client: reqwest::Client,
    config: OracleConfig,
}

impl OracleClient {
    pub fn new(config: OracleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// 检查 API key 是否已配置
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty() && self.config.api_key != "your-api-key"
    }

    /// 单次文本补全调用，带重试逻辑
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> PaperResult<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature,
            max_tokens,
        };

        let mut last_error = None;

        for attempt in 0..3 {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(500 * 2u64.pow(attempt as u32));
                info!("Oracle 重试 ({}/3)，等待 {}ms...", attempt + 1, delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            match self.do_request(&request).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("Oracle 调用失败 (尝试 {}/3): {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PaperError::OracleError("调用失败".to_string())))
    }

    async fn do_request(&self, request: &ChatRequest) -> PaperResult<String> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaperError::OracleError("请求超时".to_string())
                } else {
                    PaperError::NetworkError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| PaperError::OracleError(format!("解析响应失败: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(PaperError::OracleError("响应内容为空".to_string()));
        }

        Ok(content)
    }
}

/// 根据响应体区分配额、限流与一般错误
fn classify_api_error(status: u16, body: &str) -> PaperError {
    let body_lower = body.to_lowercase();
    if body_lower.contains("quota") || body_lower.contains("billing") {
        PaperError::OracleError(format!("配额/账单问题: {}", body))
    } else if body_lower.contains("rate limit") || status == 429 {
        PaperError::OracleError(format!("超出速率限制: {}", body))
    } else {
        PaperError::OracleError(format!("API 返回错误 {}: {}", status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(key: &str) -> OracleConfig {
        OracleConfig {
            api_provider: "openai".to_string(),
            api_key: key.to_string(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 60,
        }
    }

    #[test]
    fn placeholder_key_is_not_configured() {
        assert!(!OracleClient::new(test_config("")).is_configured());
        assert!(!OracleClient::new(test_config("your-api-key")).is_configured());
        assert!(OracleClient::new(test_config("sk-real")).is_configured());
    }

    #[test]
    fn api_errors_are_classified() {
        let quota = classify_api_error(400, "You exceeded your current quota");
        assert!(quota.to_string().contains("配额"));

        let rate = classify_api_error(429, "slow down");
        assert!(rate.to_string().contains("速率"));

        let other = classify_api_error(500, "oops");
        assert!(other.to_string().contains("500"));
    }
}
