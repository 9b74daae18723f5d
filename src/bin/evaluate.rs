//! Scores chat recommendations with the model acting as judge.
//!
//! Each configured test message runs through the same chat pipeline as the web
//! surface; the resulting hotel set is rated 1-10 against the request.

use std::sync::Arc;

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use concierge::chat::ChatService;
use concierge::config::Config;
use concierge::conversation::Conversation;
use concierge::error::ConciergeError;
use concierge::models::{ApiStatus, EvaluationResult, HotelRecommendation};
use concierge::parse::extract_json;
use concierge::prompt::evaluation_prompt;
use concierge::retry::RetryPolicy;
use concierge::transport::{Transport, build_transport, generate_text};

struct Evaluator {
    chat: ChatService,
    judge: Arc<dyn Transport>,
    model: String,
    grounding: bool,
    greeting: String,
}

impl Evaluator {
    fn new(tx: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            chat: ChatService::new(Some(tx.clone()), &config.gemini, &config.chat),
            judge: tx,
            model: config.gemini.model.clone(),
            grounding: config.gemini.grounding,
            greeting: config.chat.greeting.clone(),
        }
    }

    async fn recommendations(
        &self,
        message: &str,
    ) -> std::result::Result<Vec<HotelRecommendation>, ConciergeError> {
        let mut conversation = Conversation::with_greeting("evaluation", &self.greeting);
        let response = self
            .chat
            .send(&mut conversation, message)
            .await
            .ok_or_else(|| ConciergeError::Validation("test message is empty".to_string()))?;
        if response.status == ApiStatus::Error {
            return Err(ConciergeError::Internal("chat reply failed".to_string()));
        }

        conversation
            .messages()
            .last()
            .and_then(|m| m.hotel_recommendations.clone())
            .filter(|hotels| !hotels.is_empty())
            .ok_or_else(|| {
                ConciergeError::NotFound("no hotel recommendations in chat reply".to_string())
            })
    }

    async fn try_evaluate(
        &self,
        message: &str,
    ) -> std::result::Result<EvaluationResult, ConciergeError> {
        println!("\n=== Testing message: \"{}\" ===", message.cyan());
        let hotels = self.recommendations(message).await?;
        println!("Received {} recommendations, asking for a verdict...", hotels.len());

        let listing = serde_json::to_string_pretty(&hotels)?;
        let raw = generate_text(
            Some(&self.judge),
            &self.model,
            evaluation_prompt(message, &listing),
            self.grounding,
        )
        .await?;
        Ok(verdict(message, &raw))
    }

    async fn evaluate(&self, message: &str) -> EvaluationResult {
        match self.try_evaluate(message).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error testing message \"{}\": {}", message, e);
                EvaluationResult {
                    message: message.to_string(),
                    summary: format!("Error: {e}"),
                    score: 0.0,
                }
            }
        }
    }
}

/// Read the judge's JSON; unreadable replies keep the raw text and score 0
fn verdict(message: &str, raw: &str) -> EvaluationResult {
    let parsed = extract_json::<Value>(raw);
    if parsed.is_none() {
        tracing::warn!("Could not parse JSON response, using raw response");
    }
    let parsed = parsed.unwrap_or(Value::Null);

    let summary = parsed
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(raw)
        .to_string();
    let score = match parsed.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };

    EvaluationResult {
        message: message.to_string(),
        summary,
        score,
    }
}

fn average(results: &[EvaluationResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
}

fn print_report(results: &[EvaluationResult]) {
    println!("\n{}", "=== FINAL EVALUATION RESULTS ===".bold());
    println!("\nIndividual results:");
    for (index, result) in results.iter().enumerate() {
        let score = format!("{}/10", result.score);
        let score = if result.score >= 7.0 {
            score.green()
        } else if result.score >= 4.0 {
            score.yellow()
        } else {
            score.red()
        };
        println!("{}. \"{}\" - Score: {}", index + 1, result.message, score);
        println!("   Summary: {}", result.summary);
    }
    println!("Total messages tested: {}", results.len());
    println!("Average score: {}", format!("{:.2}/10", average(results)).bold());
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let policy = RetryPolicy::ExponentialBackoff(config.evaluation.retry.clone());
    let Some(tx) = build_transport(&config.gemini, policy) else {
        bail!("GEMINI_API_KEY is not set; GEMINI_API_KEY=your-api-key-here cargo run --bin evaluate");
    };

    println!("Starting evaluation with {} test messages...", config.evaluation.messages.len());
    let evaluator = Evaluator::new(tx, &config);
    let mut results = Vec::with_capacity(config.evaluation.messages.len());
    for message in &config.evaluation.messages {
        results.push(evaluator.evaluate(message).await);
    }

    print_report(&results);
    Ok(())
}
