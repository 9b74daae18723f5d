use chrono::Utc;
use serde::Serialize;

use crate::models::{
    ApiStatus, ChatApiResponse, ChatMessage, HotelRecommendation, ResponseMetadata,
};

/// Hotel ids the user has checked for comparison, in the order they were checked
#[derive(Debug, Clone, Default, Serialize)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    /// Flip membership of `hotel_id`; returns whether it is selected afterwards
    pub fn toggle(&mut self, hotel_id: &str) -> bool {
        if let Some(pos) = self.ids.iter().position(|id| id == hotel_id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(hotel_id.to_string());
            true
        }
    }

    pub fn contains(&self, hotel_id: &str) -> bool {
        self.ids.iter().any(|id| id == hotel_id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Ordered message store plus the selection made from its recommendations
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
    selection: Selection,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            selection: Selection::default(),
        }
    }

    /// Start a conversation with the bot's opening line
    pub fn with_greeting(id: impl Into<String>, greeting: &str) -> Self {
        let mut conversation = Self::new(id);
        conversation.push(ChatMessage::bot(greeting, None));
        conversation
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Every recommendation whose id is selected, across all messages in order.
    /// A hotel recommended in two messages appears twice.
    pub fn selected_hotels(&self) -> Vec<HotelRecommendation> {
        self.messages
            .iter()
            .filter_map(|m| m.hotel_recommendations.as_ref())
            .flatten()
            .filter(|hotel| self.selection.contains(&hotel.id))
            .cloned()
            .collect()
    }

    pub fn to_response(&self, status: ApiStatus) -> ChatApiResponse {
        ChatApiResponse {
            conversation_id: self.id.clone(),
            messages: self.messages.clone(),
            status,
            metadata: Some(ResponseMetadata {
                total_messages: self.messages.len(),
                last_updated: Utc::now(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel(id: &str) -> HotelRecommendation {
        HotelRecommendation {
            id: id.to_string(),
            name: format!("Hotel {id}"),
            image_url: String::new(),
            rating: None,
            price: None,
            location: None,
        }
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut selection = Selection::default();
        assert!(selection.toggle("hotel-1"));
        assert!(selection.toggle("hotel-2"));
        assert_eq!(selection.ids().to_vec(), vec!["hotel-1", "hotel-2"]);
        assert!(!selection.toggle("hotel-1"));
        assert_eq!(selection.ids().to_vec(), vec!["hotel-2"]);
        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn greeting_is_first_bot_message() {
        let conversation = Conversation::with_greeting("default", "Hello!");
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].text, "Hello!");
        assert_eq!(conversation.messages()[0].sender, crate::models::Sender::Bot);
    }

    #[test]
    fn selected_hotels_span_messages_in_order() {
        let mut conversation = Conversation::new("c");
        conversation.push(ChatMessage::bot("first", Some(vec![hotel("a"), hotel("b")])));
        conversation.push(ChatMessage::user("more please"));
        conversation.push(ChatMessage::bot("second", Some(vec![hotel("c"), hotel("a")])));

        conversation.selection_mut().toggle("c");
        conversation.selection_mut().toggle("a");
        conversation.selection_mut().toggle("unknown");

        let ids: Vec<String> = conversation
            .selected_hotels()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "a"]);
    }

    #[test]
    fn response_reports_message_count() {
        let conversation = Conversation::with_greeting("abc", "Hi");
        let response = conversation.to_response(ApiStatus::Success);
        assert_eq!(response.conversation_id, "abc");
        assert_eq!(response.metadata.unwrap().total_messages, 1);
    }
}
