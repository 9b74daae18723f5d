pub mod chat;
pub mod compare;
pub mod config;
pub mod conversation;
pub mod error;
pub mod insights;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod service;
pub mod stocks;
pub mod transport;
pub mod web;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::ChatService;
use crate::compare::{HotelComparator, MIN_HOTELS};
use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::{ConciergeError, Result};
use crate::insights::{RandomPhrases, hotel_cards};
use crate::models::{ApiStatus, ChatApiResponse, ComparisonResponse, SelectionResponse, StockPage};
use crate::retry::RetryPolicy;
use crate::stocks::StockDesk;
use crate::transport::{Transport, build_transport};

/// Hotel chat, comparison and stock pages behind one shared generator.
/// Conversations live in memory for the life of the process.
pub struct Concierge {
    config: Arc<Config>,
    chat: ChatService,
    comparator: HotelComparator,
    stocks: StockDesk,
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl Concierge {
    pub fn new(config: Config) -> Self {
        let tx = build_transport(&config.gemini, RetryPolicy::Never);
        Self::with_transport(config, tx)
    }

    pub fn with_transport(config: Config, tx: Option<Arc<dyn Transport>>) -> Self {
        let chat = ChatService::new(tx.clone(), &config.gemini, &config.chat);
        let comparator = HotelComparator::new(tx.clone(), &config.gemini);
        let stocks = StockDesk::new(tx, &config.gemini, &config.stocks);

        Self {
            config: Arc::new(config),
            chat,
            comparator,
            stocks,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stocks(&self) -> &StockDesk {
        &self.stocks
    }

    pub fn is_enabled(&self) -> bool {
        self.chat.is_enabled()
    }

    fn open<'a>(
        &self,
        store: &'a mut HashMap<String, Conversation>,
        id: &str,
    ) -> &'a mut Conversation {
        store
            .entry(id.to_string())
            .or_insert_with(|| Conversation::with_greeting(id, &self.config.chat.greeting))
    }

    /// Current state of a conversation, created with the greeting if new
    pub async fn conversation(&self, id: &str) -> ChatApiResponse {
        let mut store = self.conversations.write().await;
        self.open(&mut store, id).to_response(ApiStatus::Success)
    }

    /// Append the user's message and the bot's reply. The store is not locked
    /// while the reply is generated.
    pub async fn send_message(&self, id: &str, text: &str) -> Result<ChatApiResponse> {
        let pending = {
            let mut store = self.conversations.write().await;
            self.chat.begin_turn(self.open(&mut store, id), text)
        }
        .ok_or_else(|| ConciergeError::Validation("message text cannot be empty".to_string()))?;

        let turn = self.chat.complete_turn(pending).await;

        let mut store = self.conversations.write().await;
        let conversation = self.open(&mut store, id);
        conversation.push(turn.message);
        Ok(conversation.to_response(turn.status))
    }

    pub async fn toggle_selection(&self, id: &str, hotel_id: &str) -> SelectionResponse {
        let mut store = self.conversations.write().await;
        let conversation = self.open(&mut store, id);
        let selected = conversation.selection_mut().toggle(hotel_id);
        tracing::debug!("Hotel {} selected={} in {}", hotel_id, selected, id);

        SelectionResponse {
            conversation_id: id.to_string(),
            hotel_id: Some(hotel_id.to_string()),
            selected,
            selected_ids: conversation.selection().ids().to_vec(),
        }
    }

    pub async fn clear_selection(&self, id: &str) -> SelectionResponse {
        let mut store = self.conversations.write().await;
        let conversation = self.open(&mut store, id);
        conversation.selection_mut().clear();

        SelectionResponse {
            conversation_id: id.to_string(),
            hotel_id: None,
            selected: false,
            selected_ids: Vec::new(),
        }
    }

    /// Compare the hotels selected in a conversation and build a card per hotel
    pub async fn compare_selection(&self, id: &str) -> Result<ComparisonResponse> {
        let hotels = {
            let store = self.conversations.read().await;
            let Some(conversation) = store.get(id) else {
                return Err(ConciergeError::Validation(format!(
                    "at least {MIN_HOTELS} hotels must be selected for a comparison"
                )));
            };
            // Count ids, not gathered records: one hotel can appear in several replies
            if conversation.selection().len() < MIN_HOTELS {
                return Err(ConciergeError::Validation(format!(
                    "at least {MIN_HOTELS} hotels must be selected for a comparison, got {}",
                    conversation.selection().len()
                )));
            }
            conversation.selected_hotels()
        };

        let comparison = self.comparator.compare(hotels).await?;
        let mut phrases = match self.config.chat.phrase_seed {
            Some(seed) => RandomPhrases::seeded(seed),
            None => RandomPhrases::from_entropy(),
        };
        let cards = hotel_cards(&comparison, &mut phrases);

        Ok(ComparisonResponse { comparison, cards })
    }

    pub async fn stock_page(&self, symbol: &str) -> Result<StockPage> {
        self.stocks.load(symbol).await
    }
}
