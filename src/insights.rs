//! Per-hotel pros and cons for the comparison panel.
//!
//! Rules are keyword and threshold based. Filler phrases come from a
//! [`PhraseStrategy`] so callers choose between varied and reproducible output.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::compare::parse_price;
use crate::models::{ComparisonData, HotelCard, HotelComparison, HotelRecommendation};

pub const GENERIC_PROS: [&str; 5] = [
    "Modern amenities",
    "Professional service",
    "Clean facilities",
    "Good accessibility",
    "Reliable WiFi",
];

pub const GENERIC_CONS: [&str; 4] = ["Limited parking", "Busy area", "No pool", "Small rooms"];

const MAX_PROS: usize = 3;
const MAX_CONS: usize = 2;

/// Source of filler phrases
pub trait PhraseStrategy: Send {
    /// Choose one of `phrases`; `None` only when the slice is empty
    fn pick<'a>(&mut self, phrases: &[&'a str]) -> Option<&'a str>;

    /// Whether an optional filler phrase should be added at all
    fn include_optional(&mut self) -> bool;
}

/// Uniform random picks and a fair coin for optional phrases
pub struct RandomPhrases<R = StdRng> {
    rng: R,
}

impl RandomPhrases<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> PhraseStrategy for RandomPhrases<R> {
    fn pick<'a>(&mut self, phrases: &[&'a str]) -> Option<&'a str> {
        phrases.choose(&mut self.rng).copied()
    }

    fn include_optional(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

/// Always the first phrase, never optional ones
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPhrase;

impl PhraseStrategy for FirstPhrase {
    fn pick<'a>(&mut self, phrases: &[&'a str]) -> Option<&'a str> {
        phrases.first().copied()
    }

    fn include_optional(&mut self) -> bool {
        false
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub fn hotel_card(
    hotel: &HotelRecommendation,
    data: &ComparisonData,
    phrases: &mut dyn PhraseStrategy,
) -> HotelCard {
    let mut pros: Vec<String> = Vec::new();
    let mut cons: Vec<String> = Vec::new();

    let is_best_price = hotel.id == data.best_price.id;
    let is_best_rating = hotel.id == data.best_rating.id;
    let rating = hotel.rating.filter(|r| *r != 0.0);
    let price = present(hotel.price.as_deref());

    if is_best_price {
        pros.push("Best price among selected hotels".to_string());
    } else if let Some(price) = price {
        // An empty best price reads as 0
        let cheapest = match present(data.best_price.price.as_deref()) {
            Some(p) => parse_price(Some(p)),
            None => Some(0),
        };
        if let (Some(own), Some(cheapest)) = (parse_price(Some(price)), cheapest) {
            let diff = own - cheapest;
            if diff > 50 {
                cons.push(format!("${diff} more than cheapest option"));
            } else if diff > 0 {
                cons.push("Slightly higher price".to_string());
            }
        }
    }

    if is_best_rating {
        pros.push("Highest rated among selections".to_string());
    } else if let Some(rating) = rating {
        if rating >= 4.5 {
            pros.push("Excellent guest reviews".to_string());
        } else if rating >= 4.0 {
            pros.push("Very good guest reviews".to_string());
        } else if rating < 3.5 {
            cons.push("Lower guest rating".to_string());
        }
    }

    let location = hotel.location.as_deref().unwrap_or_default().to_lowercase();
    if location.contains("downtown") || location.contains("center") {
        pros.push("Central location".to_string());
    }
    if location.contains("beach") {
        pros.push("Beachfront location".to_string());
    }
    if location.contains("airport") {
        pros.push("Close to airport".to_string());
        cons.push("May have airport noise".to_string());
    }

    if let (Some(rating), Some(price)) = (rating, price) {
        if rating >= 4.0 && parse_price(Some(price)).is_some_and(|p| p < 200) {
            pros.push("Great value for money".to_string());
        }
        if rating >= 4.5 {
            pros.push("Premium service quality".to_string());
        }
    }

    if pros.len() < 2 {
        if let Some(phrase) = phrases.pick(&GENERIC_PROS) {
            pros.push(phrase.to_string());
        }
    }
    if cons.is_empty() && phrases.include_optional() {
        if let Some(phrase) = phrases.pick(&GENERIC_CONS) {
            cons.push(phrase.to_string());
        }
    }

    pros.truncate(MAX_PROS);
    cons.truncate(MAX_CONS);

    HotelCard {
        hotel: hotel.clone(),
        is_best_price,
        is_best_rating,
        pros,
        cons,
    }
}

/// One card per compared hotel, in comparison order
pub fn hotel_cards(comparison: &HotelComparison, phrases: &mut dyn PhraseStrategy) -> Vec<HotelCard> {
    comparison
        .hotels
        .iter()
        .map(|hotel| hotel_card(hotel, &comparison.comparison_data, phrases))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel(
        id: &str,
        price: Option<&str>,
        rating: Option<f64>,
        location: Option<&str>,
    ) -> HotelRecommendation {
        HotelRecommendation {
            id: id.to_string(),
            name: format!("Hotel {id}"),
            image_url: String::new(),
            rating,
            price: price.map(str::to_string),
            location: location.map(str::to_string),
        }
    }

    fn data(best_price: &HotelRecommendation, best_rating: &HotelRecommendation) -> ComparisonData {
        ComparisonData {
            best_price: best_price.clone(),
            best_rating: best_rating.clone(),
            summary: String::new(),
            pros: Vec::new(),
            cons: Vec::new(),
        }
    }

    #[test]
    fn best_hotels_get_their_badges() {
        let cheap = hotel("cheap", Some("$150"), Some(4.2), None);
        let top = hotel("top", Some("$200"), Some(4.5), Some("Downtown"));
        let data = data(&cheap, &top);

        let card = hotel_card(&cheap, &data, &mut FirstPhrase);
        assert!(card.is_best_price);
        assert!(!card.is_best_rating);
        assert_eq!(
            card.pros,
            vec![
                "Best price among selected hotels",
                "Very good guest reviews",
                "Great value for money",
            ]
        );
        assert!(card.cons.is_empty());

        let card = hotel_card(&top, &data, &mut FirstPhrase);
        assert!(card.is_best_rating);
        assert_eq!(
            card.pros,
            vec![
                "Highest rated among selections",
                "Central location",
                "Premium service quality",
            ]
        );
        assert_eq!(card.cons, vec!["Slightly higher price"]);
    }

    #[test]
    fn large_price_gap_is_spelled_out() {
        let cheap = hotel("cheap", Some("$120"), None, None);
        let pricey = hotel("pricey", Some("$300"), Some(3.0), Some("Airport Road"));
        let card = hotel_card(&pricey, &data(&cheap, &cheap), &mut FirstPhrase);
        assert_eq!(
            card.cons,
            vec!["$180 more than cheapest option", "Lower guest rating"]
        );
        assert_eq!(card.pros, vec!["Close to airport", "Modern amenities"]);
    }

    #[test]
    fn filler_pro_added_when_short() {
        let cheap = hotel("cheap", Some("$100"), Some(4.9), None);
        let plain = hotel("plain", None, None, Some("Suburbs"));
        let card = hotel_card(&plain, &data(&cheap, &cheap), &mut FirstPhrase);
        assert_eq!(card.pros, vec!["Modern amenities"]);
        assert!(card.cons.is_empty());
    }

    #[test]
    fn beach_and_center_both_count() {
        let best = hotel("best", Some("$90"), Some(5.0), None);
        let resort = hotel("resort", Some("$95"), Some(4.6), Some("Beach Center"));
        let card = hotel_card(&resort, &data(&best, &best), &mut FirstPhrase);
        assert_eq!(
            card.pros,
            vec!["Excellent guest reviews", "Central location", "Beachfront location"]
        );
        assert_eq!(card.cons, vec!["Slightly higher price"]);
    }

    #[test]
    fn seeded_phrases_are_reproducible() {
        let best = hotel("best", Some("$90"), Some(5.0), None);
        let plain = hotel("plain", None, None, None);
        let data = data(&best, &best);

        let first = hotel_card(&plain, &data, &mut RandomPhrases::seeded(42));
        let second = hotel_card(&plain, &data, &mut RandomPhrases::seeded(42));
        assert_eq!(first.pros, second.pros);
        assert_eq!(first.cons, second.cons);
        assert!(GENERIC_PROS.contains(&first.pros[0].as_str()));
        assert!(first.cons.iter().all(|c| GENERIC_CONS.contains(&c.as_str())));
    }

    #[test]
    fn limits_hold_for_random_phrases() {
        let best = hotel("best", Some("$50"), Some(5.0), None);
        let busy = hotel("busy", Some("$400"), Some(4.7), Some("Downtown beach by the airport"));
        let data = data(&best, &best);
        let mut phrases = RandomPhrases::seeded(7);
        for _ in 0..20 {
            let card = hotel_card(&busy, &data, &mut phrases);
            assert!(card.pros.len() <= 3);
            assert!(card.cons.len() <= 2);
        }
    }

    #[test]
    fn cards_follow_comparison_order() {
        let a = hotel("a", Some("$100"), Some(4.0), None);
        let b = hotel("b", Some("$200"), Some(4.8), None);
        let comparison = HotelComparison {
            hotels: vec![a.clone(), b.clone()],
            comparison_data: data(&a, &b),
            timestamp: chrono::Utc::now(),
        };
        let cards = hotel_cards(&comparison, &mut FirstPhrase);
        let ids: Vec<&str> = cards.iter().map(|c| c.hotel.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(cards[0].is_best_price && cards[1].is_best_rating);
    }
}
