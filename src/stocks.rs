use chrono::Local;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::config::{GeminiConfig, StocksConfig};
use crate::error::{ConciergeError, Result};
use crate::models::StockPage;
use crate::prompt::{stock_article_prompt, stock_info_prompt};
use crate::transport::{Transport, generate_text};

const PAGE_STYLE: &str = "font-family: Inter, system-ui, Avenir, Helvetica, Arial, sans-serif; padding: 2rem;";
const LINK_STYLE: &str = "color: #0066cc; text-decoration: none;";

pub struct StockDesk {
    tx: Option<Arc<dyn Transport>>,
    model: String,
    grounding: bool,
    symbols: Vec<String>,
}

impl StockDesk {
    pub fn new(tx: Option<Arc<dyn Transport>>, gemini: &GeminiConfig, stocks: &StocksConfig) -> Self {
        Self {
            tx,
            model: gemini.model.clone(),
            grounding: gemini.grounding,
            symbols: stocks.symbols.clone(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Generate the article and market data for `symbol` on demand.
    /// Generation failures degrade to an empty page rather than an error.
    pub async fn load(&self, symbol: &str) -> Result<StockPage> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ConciergeError::NotFound("empty stock symbol".to_string()));
        }

        tracing::info!("Generating stock page for {}", symbol);
        let (article, stock_info) = futures::join!(self.article(&symbol), self.stock_info(&symbol));
        let last_updated = article
            .as_ref()
            .map(|_| Local::now().format("%Y/%m/%d %H:%M:%S").to_string());

        Ok(StockPage {
            symbol,
            article,
            stock_info,
            last_updated,
        })
    }

    async fn article(&self, symbol: &str) -> Option<String> {
        match generate_text(
            self.tx.as_ref(),
            &self.model,
            stock_article_prompt(symbol),
            self.grounding,
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                tracing::warn!("Empty article generated for {}", symbol);
                None
            }
            Err(e) => {
                tracing::error!("Error generating stock article for {}: {}", symbol, e);
                None
            }
        }
    }

    async fn stock_info(&self, symbol: &str) -> Option<serde_json::Value> {
        let text = match generate_text(
            self.tx.as_ref(),
            &self.model,
            stock_info_prompt(symbol),
            self.grounding,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error fetching stock info for {}: {}", symbol, e);
                return None;
            }
        };

        match serde_json::from_str(text.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Stock info for {} is not valid JSON: {}", symbol, e);
                None
            }
        }
    }
}

fn bold() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Light markdown to HTML: headings, bold, blank lines and paragraphs
pub fn format_article(content: &str) -> String {
    content
        .split('\n')
        .map(|line| {
            let line = escape_html(line);
            if let Some(rest) = line.strip_prefix("### ") {
                return format!("<h3>{rest}</h3>");
            }
            if let Some(rest) = line.strip_prefix("## ") {
                return format!("<h2>{rest}</h2>");
            }
            if let Some(rest) = line.strip_prefix("# ") {
                return format!("<h1>{rest}</h1>");
            }

            let line = bold().replace_all(&line, "<strong>$1</strong>");
            if line.trim().is_empty() {
                "<br />".to_string()
            } else {
                format!("<p>{line}</p>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

pub fn render_index(symbols: &[String]) -> String {
    let items = symbols
        .iter()
        .map(|symbol| {
            let symbol = escape_html(symbol);
            format!(
                "<li style=\"margin: 0.5rem 0;\"><a href=\"/stock/{symbol}\" style=\"{LINK_STYLE} font-size: 1.1rem;\">{symbol}</a></li>"
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    page(
        "Stock Articles",
        &format!(
            "<div style=\"{PAGE_STYLE}\">\n<h1>Stock Articles</h1>\n<p>Select a stock symbol to view its article:</p>\n<ul style=\"list-style: none; padding: 0;\">\n{items}\n</ul>\n</div>"
        ),
    )
}

pub fn render_stock_page(stock: &StockPage) -> String {
    let symbol = escape_html(&stock.symbol);
    let title = format!("{} Stock Analysis", stock.symbol);
    let back = format!("<a href=\"/\" style=\"{LINK_STYLE}\">← Back to Stock List</a>");

    let Some(article) = stock.article.as_deref() else {
        return page(
            &title,
            &format!(
                "<div style=\"{PAGE_STYLE}\">\n<h1>{symbol} Stock Analysis</h1>\n<div style=\"background-color: #f0f8ff; border: 1px solid #0066cc; border-radius: 8px; padding: 1.5rem; margin-bottom: 2rem;\">\n<h3 style=\"margin-top: 0; color: #0066cc;\">📝 Generating Article...</h3>\n<p style=\"margin: 0;\">We're generating a fresh analysis for {symbol}. Please check back in a minute for the latest market insights and investment analysis.</p>\n</div>\n{back}\n</div>"
            ),
        );
    };

    let mut body = format!(
        "<div style=\"{PAGE_STYLE} max-width: 800px; margin: 0 auto;\">\n{back}\n<h1>{symbol} Stock Analysis</h1>\n"
    );
    if let Some(updated) = &stock.last_updated {
        body.push_str(&format!(
            "<div style=\"background-color: #f5f5f5; padding: 0.75rem 1rem; border-radius: 6px; margin-bottom: 1rem; font-size: 0.9rem; color: #666;\"><strong>Last Updated:</strong> {}</div>\n",
            escape_html(updated)
        ));
    }
    if let Some(info) = &stock.stock_info {
        let pretty = serde_json::to_string_pretty(info).unwrap_or_else(|_| info.to_string());
        body.push_str(&format!(
            "<div style=\"background-color: #f5f5f5; padding: 1rem; border-radius: 8px; margin-bottom: 2rem;\">\n<h3 style=\"margin-top: 0;\">Current Market Data</h3>\n<pre style=\"margin: 0;\">{}</pre>\n</div>\n",
            escape_html(&pretty)
        ));
    }
    body.push_str(&format!(
        "<article style=\"line-height: 1.6;\">\n{}\n</article>\n</div>",
        format_article(article)
    ));

    page(&title, &body)
}
