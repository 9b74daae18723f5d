//! Prompt builders for every call the concierge makes to the generation API.

use crate::models::{ChatMessage, HotelRecommendation};

/// Opening tag of the recommendation block the chat prompt asks for
pub const HOTELS_OPEN: &str = "<HOTELS>";
/// Closing tag of the recommendation block
pub const HOTELS_CLOSE: &str = "</HOTELS>";

const SAMPLE_HOTELS: [(&str, f64, &str, &str); 5] = [
    ("Hotel Name", 4.5, "$250", "City Center"),
    ("Another Hotel Name", 4.2, "$180", "Downtown"),
    ("Third Hotel Name", 4.7, "$320", "Beachfront"),
    ("Fourth Hotel Name", 4.0, "$150", "Airport Area"),
    ("Fifth Hotel Name", 4.8, "$400", "Historic District"),
];

/// Render prior turns as `User: …` / `Assistant: …` lines
pub fn conversation_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.sender.speaker(), msg.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sample_block(count: usize) -> String {
    let entries: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            let (name, rating, price, location) = SAMPLE_HOTELS[i % SAMPLE_HOTELS.len()];
            serde_json::json!({
                "id": format!("unique-hotel-id-{}", i + 1),
                "name": name,
                "rating": rating,
                "price": price,
                "location": location,
            })
        })
        .collect();
    let body = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
    format!("{HOTELS_OPEN}\n{body}\n{HOTELS_CLOSE}")
}

/// Chat prompt: answer conversationally and, for hotel requests, append exactly
/// `count` hotels as JSON inside the recommendation block.
pub fn chat_prompt(history: &[ChatMessage], message: &str, count: usize) -> String {
    format!(
        r#"You are a helpful hotel booking assistant. Based on the user's message and conversation history, provide a helpful response using real-time information when needed.

Conversation History:
{history}

Current User Message: "{message}"

Instructions:
1. Analyze the user's request for hotel-related needs (location, dates, preferences, budget, etc.)
2. Use Google Search to find current, accurate information about hotels, prices, and availability when relevant
3. Provide a helpful, conversational response based on real data
4. If the user is asking about hotels, looking for recommendations, or mentions travel/booking, include hotel recommendations
5. For hotel recommendations, provide EXACTLY {count} hotels with this JSON structure at the end of your response, wrapped in {HOTELS_OPEN} tags:

{sample}

Guidelines for hotel recommendations:
- Use Google Search to find current, real hotel information for the requested location
- Make each hotel unique with different characteristics and price points
- Base recommendations on real, current data from Google Search

Important: Always use Google Search to get current hotel information and provide exactly {count} hotel recommendations when the user is looking for hotels. Ground your responses in real, up-to-date data.

Respond naturally and conversationally, then include the {count} hotel recommendations if appropriate."#,
        history = conversation_history(history),
        sample = sample_block(count),
    )
}

/// Comparison prompt asking for a single JSON object
pub fn comparison_prompt(hotels: &[HotelRecommendation]) -> String {
    let details = hotels
        .iter()
        .enumerate()
        .map(|(idx, hotel)| {
            let rating = hotel
                .rating
                .filter(|r| *r != 0.0)
                .map(|r| r.to_string())
                .unwrap_or_else(|| "Not specified".to_string());
            format!(
                "{}. {}\n   - Rating: {} stars\n   - Price: {}/night\n   - Location: {}",
                idx + 1,
                hotel.name,
                rating,
                or_not_specified(hotel.price.as_deref()),
                or_not_specified(hotel.location.as_deref()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze and compare these {n} hotels using real-time information from Google Search. Provide a comprehensive comparison in JSON format.

Hotels to compare:
{details}

Use Google Search to find current, accurate information about each hotel including:
- Current pricing and availability
- Updated guest reviews and ratings
- Amenities and features
- Location advantages
- Special offers or deals

Provide your analysis in this exact JSON format:
{{
  "summary": "2-3 sentence overview of the comparison highlighting key differences",
  "bestPrice": {{
    "hotelName": "Name of hotel with best value",
    "reason": "Why this hotel offers the best price/value ratio"
  }},
  "bestRating": {{
    "hotelName": "Name of highest-rated hotel",
    "reason": "What makes this hotel stand out in terms of quality"
  }},
  "pros": [
    "Positive aspect 1 based on real data",
    "Positive aspect 2 based on real data",
    "Positive aspect 3 based on real data",
    "Positive aspect 4 based on real data"
  ],
  "cons": [
    "Potential concern 1 based on real data",
    "Potential concern 2 based on real data",
    "Potential concern 3 based on real data"
  ],
  "recommendations": {{
    "budgetConscious": "Best choice for budget travelers",
    "luxurySeekers": "Best choice for luxury experience",
    "businessTravelers": "Best choice for business needs",
    "families": "Best choice for families"
  }}
}}

Base your analysis on current, real-time information from Google Search. Provide only the JSON response, no additional text."#,
        n = hotels.len(),
    )
}

fn or_not_specified(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "Not specified",
    }
}

pub fn stock_article_prompt(symbol: &str) -> String {
    format!(
        r#"Generate a comprehensive investment article about {symbol} stock.
Include the following sections:
1. Company Overview
2. Recent Performance and Market Trends
3. Financial Health
4. Growth Opportunities
5. Risks and Challenges
6. Analyst Opinions
7. Investment Outlook

Use current market data and provide specific insights. Write in a professional, informative tone suitable for investors."#
    )
}

pub fn stock_info_prompt(symbol: &str) -> String {
    format!(
        r#"Provide current stock information for {symbol} in JSON format including:
- current price
- day change (amount and percentage)
- 52 week high/low
- market cap
- P/E ratio
Return only valid JSON."#
    )
}

/// Judge prompt scoring a whole recommendation set against the original request
pub fn evaluation_prompt(message: &str, recommendations: &str) -> String {
    format!(
        r#"Hotel Recommendations from Chat:

{recommendations}

Please evaluate these hotel recommendations as a whole based on the original user request: "{message}"

Analyze how well the overall set of recommendations matches the user's requirements and provide your response in the following JSON format:

{{
  "summary": "A detailed explanation of how well the recommended hotels as a group align with the user's needs, including strengths and weaknesses of the recommendations and your reasoning for the overall evaluation",
  "score": [single number from 1-10 where 10 means the set of recommendations perfectly matches the user's request and 1 means the recommendations are completely irrelevant]
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    #[test]
    fn chat_prompt_replays_history_and_asks_for_block() {
        let history = vec![
            ChatMessage::bot("Hello! How can I help?", None),
            ChatMessage::user("Hotels in Paris"),
        ];
        let prompt = chat_prompt(&history, "Something cheaper", 5);
        assert!(prompt.contains("Assistant: Hello! How can I help?\nUser: Hotels in Paris"));
        assert!(prompt.contains("Current User Message: \"Something cheaper\""));
        assert!(prompt.contains("EXACTLY 5 hotels"));
        assert!(prompt.contains("<HOTELS>\n["));
        assert!(prompt.contains("\"id\": \"unique-hotel-id-5\""));
        assert!(!prompt.contains("unique-hotel-id-6"));
    }

    #[test]
    fn sample_block_cycles_through_examples() {
        let block = sample_block(7);
        assert!(block.contains("unique-hotel-id-7"));
        assert!(block.starts_with(HOTELS_OPEN));
        assert!(block.ends_with(HOTELS_CLOSE));
    }

    #[test]
    fn comparison_prompt_marks_missing_fields() {
        let hotels = vec![
            HotelRecommendation {
                id: "a".to_string(),
                name: "Alpha".to_string(),
                image_url: String::new(),
                rating: Some(4.5),
                price: Some("$200".to_string()),
                location: Some("Downtown".to_string()),
            },
            HotelRecommendation {
                id: "b".to_string(),
                name: "Beta".to_string(),
                image_url: String::new(),
                rating: None,
                price: Some(String::new()),
                location: None,
            },
        ];
        let prompt = comparison_prompt(&hotels);
        assert!(prompt.contains("compare these 2 hotels"));
        assert!(prompt.contains("1. Alpha\n   - Rating: 4.5 stars\n   - Price: $200/night"));
        assert!(prompt.contains("2. Beta\n   - Rating: Not specified stars\n   - Price: Not specified/night\n   - Location: Not specified"));
        assert!(prompt.contains("\"bestPrice\": {"));
    }

    #[test]
    fn stock_prompts_name_the_symbol() {
        assert!(stock_article_prompt("NVDA").contains("about NVDA stock"));
        assert!(stock_info_prompt("NVDA").contains("for NVDA in JSON"));
    }
}
