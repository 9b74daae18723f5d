use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::config::GeminiConfig;
use crate::error::{ConciergeError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse};
use crate::retry::RetryPolicy;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse>;
}

pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiTransport {
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            base_url,
            retry: RetryPolicy::Never,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn send_once(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint(&req.model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ConciergeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| {
            ConciergeError::Internal(format!("Failed to parse Gemini API response: {e}"))
        })
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        tracing::debug!(
            model = %req.model,
            grounded = !req.tools.is_empty(),
            "Sending generateContent request"
        );
        self.retry.run(|| self.send_once(req)).await
    }
}

/// Build the generator from config. `None` means generation is disabled and
/// callers must take their fallback path.
pub fn build_transport(cfg: &GeminiConfig, retry: RetryPolicy) -> Option<Arc<dyn Transport>> {
    let Some(api_key) = cfg.api_key.clone() else {
        tracing::warn!("GEMINI_API_KEY not set - generation disabled, fallbacks will be used");
        return None;
    };

    match GeminiTransport::new(api_key, cfg.base_url.clone()) {
        Ok(transport) => Some(Arc::new(transport.with_retry(retry)) as Arc<dyn Transport>),
        Err(e) => {
            tracing::error!("Failed to initialize Gemini transport: {}", e);
            None
        }
    }
}

/// One-shot text generation through an optional generator
pub async fn generate_text(
    tx: Option<&Arc<dyn Transport>>,
    model: &str,
    prompt: String,
    grounding: bool,
) -> Result<String> {
    let tx = tx.ok_or(ConciergeError::Disabled)?;
    let request = GenerateContentRequest::new(model, vec![prompt], grounding);
    let response = tx.generate(&request).await?;
    if let Some(meta) = response
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
    {
        tracing::debug!("Grounding metadata: {}", meta);
    }
    Ok(response.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn endpoint_joins_base_url_and_model() {
        let tx = GeminiTransport::new(
            "key".to_string(),
            "https://example.test/v1beta/".to_string(),
        )
        .unwrap();
        assert_eq!(
            tx.endpoint("gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn missing_key_disables_generation() {
        let mut cfg = Config::default();
        cfg.gemini.api_key = None;
        assert!(build_transport(&cfg.gemini, RetryPolicy::Never).is_none());

        cfg.gemini.api_key = Some("key".to_string());
        assert!(build_transport(&cfg.gemini, RetryPolicy::Never).is_some());
    }

    #[tokio::test]
    async fn generate_text_without_transport_is_disabled() {
        let result = generate_text(None, "m", "prompt".to_string(), true).await;
        assert!(matches!(result, Err(ConciergeError::Disabled)));
    }

    #[tokio::test]
    async fn generate_text_sends_grounded_prompt() {
        let mut mock = MockTransport::new();
        mock.expect_generate()
            .withf(|req| {
                req.model == "gemini-2.0-flash"
                    && req.tools.len() == 1
                    && req.contents[0].parts[0].text.as_deref() == Some("prompt")
            })
            .times(1)
            .returning(|_| Ok(GenerateContentResponse::from_text("answer")));
        let tx: Arc<dyn Transport> = Arc::new(mock);

        let text = generate_text(Some(&tx), "gemini-2.0-flash", "prompt".to_string(), true)
            .await
            .unwrap();
        assert_eq!(text, "answer");
    }

    #[tokio::test]
    async fn live_gemini_call_when_key_present() {
        // Only exercised against the real API when explicitly requested.
        if std::env::var("CONCIERGE_LIVE_TESTS").is_err() {
            return;
        }
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            let base_url = crate::config::DEFAULT_GEMINI_BASE_URL.to_string();
            let tx = match GeminiTransport::new(api_key, base_url) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Failed to create transport in test: {e}");
                    return;
                }
            };
            let req = GenerateContentRequest::new(
                "gemini-2.0-flash",
                vec!["What is the capital of France?".to_string()],
                false,
            );
            let res = tx.generate(&req).await;
            assert!(res.is_ok());
        }
    }
}
