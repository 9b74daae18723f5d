use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

use crate::models::HotelRecommendation;

/// Bot text used when the reply is empty once the block is removed
pub const EMPTY_REPLY_FALLBACK: &str = "I'd be happy to help you find the perfect hotel!";

fn hotels_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<HOTELS>(.*?)</HOTELS>").expect("valid hotels regex"))
}

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid fence regex"))
}

/// A model reply split into display text and optional recommendations
#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    pub text: String,
    pub hotels: Option<Vec<HotelRecommendation>>,
}

/// Split a chat reply into text and hotels. Never fails: a missing or
/// malformed block leaves the text untouched and yields no hotels.
pub fn parse_bot_reply(raw: &str, images: &[String], now_ms: i64) -> BotReply {
    let (text, hotels) = match hotels_block().captures(raw) {
        Some(caps) => {
            let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            match parse_hotels(body, images, now_ms) {
                Some(hotels) => {
                    let stripped = hotels_block().replace(raw, "").trim().to_string();
                    (stripped, Some(hotels))
                }
                None => {
                    tracing::debug!("Recommendation block present but malformed; ignoring it");
                    (raw.to_string(), None)
                }
            }
        }
        None => (raw.to_string(), None),
    };

    let text = if text.is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        text
    };
    BotReply { text, hotels }
}

/// Map a JSON array of hotel objects. Model image URLs are ignored in favour
/// of placeholder images chosen by cyclic index.
fn parse_hotels(body: &str, images: &[String], now_ms: i64) -> Option<Vec<HotelRecommendation>> {
    let entries: Vec<Value> = serde_json::from_str(body).ok()?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let obj = entry.as_object()?;
            Some(HotelRecommendation {
                id: non_empty_str(obj.get("id"))
                    .unwrap_or_else(|| format!("hotel-{now_ms}-{index}")),
                name: non_empty_str(obj.get("name")).unwrap_or_default(),
                image_url: placeholder_image(images, index),
                rating: Some(obj.get("rating").and_then(Value::as_f64).unwrap_or(0.0)),
                price: Some(scalar_str(obj.get("price")).unwrap_or_default()),
                location: Some(non_empty_str(obj.get("location")).unwrap_or_default()),
            })
        })
        .collect()
}

pub fn placeholder_image(images: &[String], index: usize) -> String {
    if images.is_empty() {
        return String::new();
    }
    images[index % images.len()].clone()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strings pass through; bare numbers are stringified
fn scalar_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Greedy span from the first `{` to the last `}`
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse JSON out of free text: the whole text, then a ```json fence, then the
/// outermost brace span.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Some(value);
    }

    if let Some(body) = fenced_json().captures(raw).and_then(|c| c.get(1)) {
        match serde_json::from_str(body.as_str().trim()) {
            Ok(value) => return Some(value),
            Err(e) => tracing::warn!("Could not parse JSON from code block: {}", e),
        }
    }

    if let Some(span) = extract_json_object(raw) {
        match serde_json::from_str(span) {
            Ok(value) => return Some(value),
            Err(e) => tracing::warn!("Could not parse JSON-like content: {}", e),
        }
    }

    None
}
