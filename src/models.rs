use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    /// Speaker label used when replaying history into a prompt
    pub fn speaker(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Bot => "Assistant",
        }
    }
}

/// A hotel parsed out of a model reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelRecommendation {
    pub id: String,
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One turn of the conversation. Immutable once appended to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_recommendations: Option<Vec<HotelRecommendation>>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text.into(), Sender::User, None)
    }

    pub fn bot(text: impl Into<String>, hotels: Option<Vec<HotelRecommendation>>) -> Self {
        Self::new(text.into(), Sender::Bot, hotels)
    }

    fn new(text: String, sender: Sender, hotels: Option<Vec<HotelRecommendation>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            sender,
            timestamp: Utc::now(),
            hotel_recommendations: hotels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonData {
    pub best_price: HotelRecommendation,
    pub best_rating: HotelRecommendation,
    pub summary: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

/// Derived comparison of two or more selected hotels; recomputed per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelComparison {
    pub hotels: Vec<HotelRecommendation>,
    pub comparison_data: ComparisonData,
    pub timestamp: DateTime<Utc>,
}

/// A hotel as shown in the comparison panel, with its own pros and cons
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelCard {
    pub hotel: HotelRecommendation,
    pub is_best_price: bool,
    pub is_best_rating: bool,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_messages: usize,
    pub last_updated: DateTime<Utc>,
}

/// Envelope returned for a conversation after each exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiResponse {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Selection after a toggle or clear
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_id: Option<String>,
    pub selected: bool,
    pub selected_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResponse {
    pub comparison: HotelComparison,
    pub cards: Vec<HotelCard>,
}

/// Data behind a stock article page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPage {
    pub symbol: String,
    pub article: Option<String>,
    pub stock_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Judge verdict for one evaluated chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub message: String,
    pub summary: String,
    pub score: f64,
}

// Gemini generateContent request format
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GenerateContentRequest {
    /// Build a request from plain prompt strings, optionally grounded with web search
    pub fn new(model: impl Into<String>, prompts: Vec<String>, grounding: bool) -> Self {
        let contents = prompts
            .into_iter()
            .map(|text| Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(text) }],
            })
            .collect();
        let tools = if grounding {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };
        Self {
            model: model.into(),
            contents,
            tools,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

// Gemini generateContent response format
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<serde_json::Value>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, empty when there is none
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
                finish_reason: Some("STOP".to_string()),
                grounding_metadata: None,
            }],
            usage_metadata: None,
        }
    }
}
