use chrono::Utc;
use std::sync::Arc;

use crate::config::{ChatConfig, GeminiConfig};
use crate::conversation::Conversation;
use crate::models::{ApiStatus, ChatApiResponse, ChatMessage};
use crate::parse::parse_bot_reply;
use crate::prompt::chat_prompt;
use crate::transport::{Transport, generate_text};

/// Bot turn appended whenever the generation call fails
pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again in a moment.";

/// A user turn already appended to a conversation, waiting for its reply
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub conversation_id: String,
    prompt: String,
}

/// Bot reply produced for a pending turn
#[derive(Debug, Clone)]
pub struct BotTurn {
    pub message: ChatMessage,
    pub status: ApiStatus,
}

pub struct ChatService {
    tx: Option<Arc<dyn Transport>>,
    model: String,
    grounding: bool,
    recommendation_count: usize,
    images: Vec<String>,
}

impl ChatService {
    pub fn new(tx: Option<Arc<dyn Transport>>, gemini: &GeminiConfig, chat: &ChatConfig) -> Self {
        Self {
            tx,
            model: gemini.model.clone(),
            grounding: gemini.grounding,
            recommendation_count: chat.recommendation_count,
            images: chat.placeholder_images.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Append the user's message and build the prompt from the history before
    /// it. Blank input appends nothing and returns `None`.
    pub fn begin_turn(&self, conversation: &mut Conversation, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }

        let prompt = chat_prompt(conversation.messages(), text, self.recommendation_count);
        conversation.push(ChatMessage::user(text));

        Some(PendingTurn {
            conversation_id: conversation.id().to_string(),
            prompt,
        })
    }

    /// Ask the model for a reply. Failures become the apology turn and are never
    /// returned to the caller.
    pub async fn complete_turn(&self, pending: PendingTurn) -> BotTurn {
        tracing::info!(
            "Generating chat reply for conversation {}",
            pending.conversation_id
        );

        match generate_text(self.tx.as_ref(), &self.model, pending.prompt, self.grounding).await {
            Ok(raw) => {
                let reply = parse_bot_reply(&raw, &self.images, Utc::now().timestamp_millis());
                tracing::debug!(
                    "Reply parsed with {} recommendations",
                    reply.hotels.as_ref().map_or(0, Vec::len)
                );
                BotTurn {
                    message: ChatMessage::bot(reply.text, reply.hotels),
                    status: ApiStatus::Success,
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Chat generation failed for conversation {}: {}",
                    pending.conversation_id,
                    e
                );
                BotTurn {
                    message: ChatMessage::bot(APOLOGY, None),
                    status: ApiStatus::Error,
                }
            }
        }
    }

    /// Run a full exchange on a conversation the caller owns
    pub async fn send(&self, conversation: &mut Conversation, text: &str) -> Option<ChatApiResponse> {
        let pending = self.begin_turn(conversation, text)?;
        let turn = self.complete_turn(pending).await;
        conversation.push(turn.message);
        Some(conversation.to_response(turn.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::{ConciergeError, Result};
    use crate::models::{GenerateContentRequest, GenerateContentResponse, Sender};
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Scripted transport that records the prompts it receives
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<GenerateContentResponse>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<GenerateContentResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn generate(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse> {
            let prompt = req.contents[0].parts[0].text.clone().unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ConciergeError::Internal("No more replies".to_string())))
        }
    }

    fn service(tx: Option<Arc<dyn Transport>>) -> ChatService {
        let cfg = Config::default();
        ChatService::new(tx, &cfg.gemini, &cfg.chat)
    }

    #[tokio::test]
    async fn blank_input_appends_nothing_and_never_calls_out() {
        let mut mock = MockTransport::new();
        mock.expect_generate().times(0);
        let chat = service(Some(Arc::new(mock)));

        let mut conversation = Conversation::with_greeting("c", "Hello!");
        for blank in ["", "   ", "\n\t "] {
            assert!(chat.send(&mut conversation, blank).await.is_none());
        }
        assert_eq!(conversation.messages().len(), 1);
    }

    #[tokio::test]
    async fn reply_with_block_carries_recommendations() {
        let raw = r#"Great choices in Lisbon!
<HOTELS>[{"id": "h1", "name": "Tagus", "rating": 4.6, "price": "$210", "location": "Downtown"}]</HOTELS>"#;
        let tx = Arc::new(ScriptedTransport::new(vec![Ok(
            GenerateContentResponse::from_text(raw),
        )]));
        let chat = service(Some(tx.clone()));

        let mut conversation = Conversation::with_greeting("c", "Hello!");
        let response = chat.send(&mut conversation, "Hotels in Lisbon").await.unwrap();

        assert_eq!(response.status, ApiStatus::Success);
        assert_eq!(response.messages.len(), 3);
        let bot = &conversation.messages()[2];
        assert_eq!(bot.sender, Sender::Bot);
        assert_eq!(bot.text, "Great choices in Lisbon!");
        assert_eq!(bot.hotel_recommendations.as_ref().unwrap()[0].name, "Tagus");

        // Prompt carries history before the new message, plus the message itself
        let prompts = tx.prompts.lock().unwrap();
        assert!(prompts[0].contains("Assistant: Hello!"));
        assert!(!prompts[0].contains("User: Hotels in Lisbon"));
        assert!(prompts[0].contains("Current User Message: \"Hotels in Lisbon\""));
    }

    #[tokio::test]
    async fn reply_without_block_has_no_recommendations() {
        let tx = Arc::new(ScriptedTransport::new(vec![Ok(
            GenerateContentResponse::from_text("Happy to help with anything else."),
        )]));
        let chat = service(Some(tx));

        let mut conversation = Conversation::new("c");
        chat.send(&mut conversation, "Thanks").await.unwrap();
        let bot = conversation.messages().last().unwrap();
        assert!(bot.hotel_recommendations.is_none());
    }

    #[tokio::test]
    async fn network_failure_appends_apology() {
        let tx = Arc::new(ScriptedTransport::new(vec![Err(ConciergeError::Api {
            status: 500,
            body: "boom".to_string(),
        })]));
        let chat = service(Some(tx.clone()));

        let mut conversation = Conversation::new("c");
        let response = chat.send(&mut conversation, "Hotels in Rome").await.unwrap();
        assert_eq!(response.status, ApiStatus::Error);
        assert_eq!(conversation.messages()[0].text, "Hotels in Rome");
        assert_eq!(conversation.messages()[1].text, APOLOGY);
        assert_eq!(tx.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_client_apologizes() {
        let chat = service(None);
        assert!(!chat.is_enabled());

        let mut conversation = Conversation::new("c");
        let response = chat.send(&mut conversation, "Hotels in Oslo").await.unwrap();
        assert_eq!(response.status, ApiStatus::Error);
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[1].text, APOLOGY);
    }

    #[tokio::test]
    async fn split_turn_leaves_user_message_in_place() {
        let tx = Arc::new(ScriptedTransport::new(vec![Ok(
            GenerateContentResponse::from_text("ok"),
        )]));
        let chat = service(Some(tx));

        let mut conversation = Conversation::new("c");
        let pending = chat.begin_turn(&mut conversation, "Hi").unwrap();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(pending.conversation_id, "c");

        let turn = chat.complete_turn(pending).await;
        assert_eq!(turn.status, ApiStatus::Success);
        assert_eq!(turn.message.text, "ok");
    }
}
