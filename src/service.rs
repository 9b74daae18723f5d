use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{CallToolResult, Content, ErrorData, ServerCapabilities, ServerInfo},
};
use rmcp_macros::{tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::Concierge;
use crate::error::ConciergeError;

const DEFAULT_CONVERSATION: &str = "default";

fn default_conversation() -> String {
    DEFAULT_CONVERSATION.to_string()
}

#[derive(Serialize, Deserialize, JsonSchema, Debug)]
pub struct HotelChatParams {
    /// Conversation to continue; a new one starts with the greeting
    #[serde(default = "default_conversation")]
    pub conversation_id: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug)]
pub struct HotelSelectParams {
    #[serde(default = "default_conversation")]
    pub conversation_id: String,
    /// Hotel id to toggle in the comparison selection
    #[serde(default)]
    pub hotel_id: Option<String>,
    /// Clear the whole selection instead of toggling
    #[serde(default)]
    pub clear: bool,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug)]
pub struct HotelCompareParams {
    #[serde(default = "default_conversation")]
    pub conversation_id: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug)]
pub struct StockArticleParams {
    /// Ticker symbol, case-insensitive
    pub symbol: String,
}

/// MCP server exposing the hotel concierge and stock articles as tools
#[derive(Clone)]
pub struct ConciergeService {
    tool_router: ToolRouter<Self>,
    concierge: Arc<Concierge>,
}

impl ConciergeService {
    pub fn new(concierge: Arc<Concierge>) -> Self {
        tracing::info!(
            "Service::new() - generation {}",
            if concierge.is_enabled() { "enabled" } else { "disabled" }
        );
        Self {
            tool_router: Self::tool_router(),
            concierge,
        }
    }
}

fn json_result<T: Serialize>(value: T) -> Result<CallToolResult, ErrorData> {
    let content = Content::json(value).map_err(|e| {
        ErrorData::internal_error(format!("Failed to create JSON content: {e}"), None)
    })?;
    Ok(CallToolResult::success(vec![content]))
}

fn tool_error(tool: &str, e: ConciergeError) -> ErrorData {
    match e {
        ConciergeError::Validation(_) | ConciergeError::NotFound(_) => {
            tracing::warn!("{} rejected: {}", tool, e);
            ErrorData::invalid_params(e.to_string(), None)
        }
        _ => {
            tracing::error!("{} error: {}", tool, e);
            ErrorData::internal_error(e.to_string(), None)
        }
    }
}

#[tool_router]
impl ConciergeService {
    #[tool(
        description = "Chat with the hotel booking assistant. Replies may include hotel recommendations with ids usable by hotel_select."
    )]
    pub async fn hotel_chat(
        &self,
        params: Parameters<HotelChatParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let params = params.0;
        match self
            .concierge
            .send_message(&params.conversation_id, &params.message)
            .await
        {
            Ok(response) => json_result(response),
            Err(e) => Err(tool_error("hotel_chat", e)),
        }
    }

    #[tool(description = "Toggle a recommended hotel in the comparison selection, or clear the selection")]
    pub async fn hotel_select(
        &self,
        params: Parameters<HotelSelectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let params = params.0;
        if params.clear {
            return json_result(self.concierge.clear_selection(&params.conversation_id).await);
        }
        let Some(hotel_id) = params.hotel_id.filter(|id| !id.trim().is_empty()) else {
            return Err(ErrorData::invalid_params(
                "hotel_id is required unless clear is set".to_string(),
                None,
            ));
        };
        json_result(
            self.concierge
                .toggle_selection(&params.conversation_id, &hotel_id)
                .await,
        )
    }

    #[tool(description = "Compare the selected hotels: best price, best rating, summary and per-hotel pros/cons")]
    pub async fn hotel_compare(
        &self,
        params: Parameters<HotelCompareParams>,
    ) -> Result<CallToolResult, ErrorData> {
        match self
            .concierge
            .compare_selection(&params.0.conversation_id)
            .await
        {
            Ok(response) => json_result(response),
            Err(e) => Err(tool_error("hotel_compare", e)),
        }
    }

    #[tool(description = "Generate an investment article and current market data for a stock symbol")]
    pub async fn stock_article(
        &self,
        params: Parameters<StockArticleParams>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.concierge.stock_page(&params.0.symbol).await {
            Ok(page) => json_result(page),
            Err(e) => Err(tool_error("stock_article", e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for ConciergeService {
    fn get_info(&self) -> ServerInfo {
        let config = self.concierge.config();
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2024_11_05,
            server_info: rmcp::model::Implementation {
                name: config.server.name.clone(),
                version: config.server.version.clone(),
            },
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                ..Default::default()
            },
            instructions: Some(
                "Hotel concierge: chat for recommendations, select hotels, compare them; stock articles by symbol".into(),
            ),
        }
    }
}
