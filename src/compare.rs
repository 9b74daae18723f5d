use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::GeminiConfig;
use crate::error::{ConciergeError, Result};
use crate::models::{ComparisonData, HotelComparison, HotelRecommendation};
use crate::parse::extract_json_object;
use crate::prompt::comparison_prompt;
use crate::transport::{Transport, generate_text};

pub const MIN_HOTELS: usize = 2;

const PREMIUM_AVERAGE_PRICE: f64 = 250.0;

/// Parse a display price the lenient way: drop `$`, skip leading whitespace,
/// read the leading integer. `"$1,200"` reads as 1; `"call us"` is `None`.
pub fn parse_price(price: Option<&str>) -> Option<i64> {
    let cleaned = price?.replace('$', "");
    let s = cleaned.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

pub fn rating_of(hotel: &HotelRecommendation) -> f64 {
    hotel.rating.unwrap_or(0.0)
}

/// Cheapest hotel among those with a positive parsed price, first on ties.
/// Falls back to the first hotel when no price is usable.
pub fn best_price(hotels: &[HotelRecommendation]) -> Option<&HotelRecommendation> {
    let mut best: Option<(&HotelRecommendation, i64)> = None;
    for hotel in hotels {
        let Some(price) = parse_price(hotel.price.as_deref()).filter(|p| *p > 0) else {
            continue;
        };
        if best.is_none_or(|(_, lowest)| price < lowest) {
            best = Some((hotel, price));
        }
    }
    best.map(|(hotel, _)| hotel).or_else(|| hotels.first())
}

/// Highest rated hotel (missing rating counts as 0), first on ties
pub fn best_rating(hotels: &[HotelRecommendation]) -> Option<&HotelRecommendation> {
    hotels.iter().fold(None, |best, hotel| match best {
        Some(current) if rating_of(hotel) <= rating_of(current) => Some(current),
        _ => Some(hotel),
    })
}

/// Mean over all hotels; unparseable prices count as 0
pub fn average_price(hotels: &[HotelRecommendation]) -> f64 {
    if hotels.is_empty() {
        return 0.0;
    }
    let total: f64 = hotels
        .iter()
        .map(|h| parse_price(h.price.as_deref()).unwrap_or(0) as f64)
        .sum();
    total / hotels.len() as f64
}

fn name_or_selected(hotel: &HotelRecommendation) -> &str {
    if hotel.name.is_empty() {
        "Selected hotel"
    } else {
        &hotel.name
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn variety_note(count: usize, plenty: &str) -> String {
    if count < 3 {
        "Consider adding more hotels for better comparison".to_string()
    } else {
        plenty.to_string()
    }
}

/// Model analysis; only the narrative parts are used, picks are always computed locally.
/// Missing `pros` or `cons` makes the reply unreadable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonAnalysis {
    #[serde(default)]
    summary: String,
    pros: Vec<String>,
    cons: Vec<String>,
}

/// Blend the model's narrative with the locally computed picks
fn enriched(
    analysis: ComparisonAnalysis,
    hotels: &[HotelRecommendation],
    cheapest: &HotelRecommendation,
    top_rated: &HotelRecommendation,
) -> ComparisonData {
    let summary = if !cheapest.name.is_empty() && !top_rated.name.is_empty() {
        format!(
            "{} {} offers the best value at {}/night, while {} provides the highest quality with {} stars.",
            analysis.summary,
            cheapest.name,
            non_empty(cheapest.price.as_deref()).unwrap_or("price not available"),
            top_rated.name,
            rating_of(top_rated),
        )
    } else {
        format!(
            "{} Hotel comparison completed with available data.",
            analysis.summary
        )
    };

    let rating_line = match top_rated.rating.filter(|r| *r != 0.0) {
        Some(rating) if !top_rated.name.is_empty() => {
            format!("{} has {}-star rating", top_rated.name, rating)
        }
        _ => "Rating information available for review".to_string(),
    };
    let value_line = match non_empty(cheapest.price.as_deref()) {
        Some(price) if !cheapest.name.is_empty() => {
            format!("{} provides value at {}/night", cheapest.name, price)
        }
        _ => "Pricing information available for review".to_string(),
    };

    let mut pros: Vec<String> = analysis.pros.into_iter().take(2).collect();
    pros.push(rating_line);
    pros.push(value_line);
    pros.truncate(4);

    let mut cons: Vec<String> = analysis.cons.into_iter().take(2).collect();
    cons.push(variety_note(hotels.len(), "Good variety of options available"));
    cons.truncate(3);

    ComparisonData {
        best_price: cheapest.clone(),
        best_rating: top_rated.clone(),
        summary,
        pros,
        cons,
    }
}

/// Fully local comparison used whenever the model cannot be reached or its
/// answer cannot be read
pub fn heuristic(
    hotels: &[HotelRecommendation],
    cheapest: &HotelRecommendation,
    top_rated: &HotelRecommendation,
) -> ComparisonData {
    let average = average_price(hotels);
    let average_text = if average > 0.0 {
        format!("${}", average.round() as i64)
    } else {
        "Not available".to_string()
    };
    let top_rating = rating_of(top_rated);

    let summary = format!(
        "Compared {} hotels. {} offers the best price ({}/night), while {} has the highest rating ({} stars). Average price: {}/night.",
        hotels.len(),
        name_or_selected(cheapest),
        non_empty(cheapest.price.as_deref()).unwrap_or("Price not available"),
        name_or_selected(top_rated),
        top_rating,
        average_text,
    );

    let pros = vec![
        if top_rating > 0.0 {
            format!(
                "{} has the highest rating at {} stars",
                name_or_selected(top_rated),
                top_rating
            )
        } else {
            "Rating information not available".to_string()
        },
        match non_empty(cheapest.price.as_deref()) {
            Some(price) => format!(
                "{} offers the best value at {}/night",
                name_or_selected(cheapest),
                price
            ),
            None => "Price information not available".to_string(),
        },
        "Hotel selection available for review".to_string(),
    ];

    let price_band = if average > PREMIUM_AVERAGE_PRICE {
        "Selected hotels are in the premium price range"
    } else if average > 0.0 {
        "Good value options available"
    } else {
        "Price information not available"
    };
    let cons = vec![
        price_band.to_string(),
        variety_note(hotels.len(), "Good selection variety"),
    ];

    ComparisonData {
        best_price: cheapest.clone(),
        best_rating: top_rated.clone(),
        summary,
        pros,
        cons,
    }
}

pub struct HotelComparator {
    tx: Option<Arc<dyn Transport>>,
    model: String,
    grounding: bool,
}

impl HotelComparator {
    pub fn new(tx: Option<Arc<dyn Transport>>, gemini: &GeminiConfig) -> Self {
        Self {
            tx,
            model: gemini.model.clone(),
            grounding: gemini.grounding,
        }
    }

    /// Compare two or more hotels. Best price and best rating are always the
    /// local picks; the model only contributes narrative.
    pub async fn compare(&self, hotels: Vec<HotelRecommendation>) -> Result<HotelComparison> {
        if hotels.len() < MIN_HOTELS {
            return Err(ConciergeError::Validation(format!(
                "at least {MIN_HOTELS} hotels are required for a comparison, got {}",
                hotels.len()
            )));
        }

        let (cheapest, top_rated) = match (best_price(&hotels), best_rating(&hotels)) {
            (Some(p), Some(r)) => (p.clone(), r.clone()),
            _ => return Err(ConciergeError::Internal("no hotels to rank".to_string())),
        };

        tracing::info!("Comparing {} hotels", hotels.len());

        let prompt = comparison_prompt(&hotels);
        let comparison_data =
            match generate_text(self.tx.as_ref(), &self.model, prompt, self.grounding).await {
                Ok(raw) => match read_analysis(&raw) {
                    Some(analysis) => enriched(analysis, &hotels, &cheapest, &top_rated),
                    None => {
                        tracing::warn!("Comparison reply was not a readable analysis; using local heuristics");
                        heuristic(&hotels, &cheapest, &top_rated)
                    }
                },
                Err(e) => {
                    tracing::warn!("Comparison generation failed: {}; using local heuristics", e);
                    heuristic(&hotels, &cheapest, &top_rated)
                }
            };

        Ok(HotelComparison {
            hotels,
            comparison_data,
            timestamp: Utc::now(),
        })
    }
}

fn read_analysis(raw: &str) -> Option<ComparisonAnalysis> {
    let span = extract_json_object(raw)?;
    serde_json::from_str(span).ok()
}
