//! Rule-based intent classifier.
//!
//! Finds a destination city and a planning-mode signal in free text and
//! maps every utterance to exactly one [`Intent`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use wayfarer_core::types::{Session, TravelMode};

use crate::prompt::PromptContext;
use crate::provider::Generator;
use crate::types::{Intent, ModeRequest};

// =============================================================================
// Compiled regex sets (compiled once, reused across calls)
// =============================================================================

/// One to three capitalized words, e.g. "Tokyo", "New York", "Rio De Janeiro".
const CAPITALIZED_PLACE: &str = r"(?P<city>\p{Lu}[\p{L}'.\-]+(?:\s+\p{Lu}[\p{L}'.\-]+){0,2})";

struct DestinationPatterns {
    /// "trip to Tokyo", "heading to Lisbon", "switch to Rome"
    travel_to: Regex,
    /// "visiting Kyoto", "explore Mexico City"
    visit: Regex,
    /// "in Paris", "around Seoul" (only used before a city is known)
    located_in: Regex,
    /// Lowercase destination at the end: "a trip to tokyo" (only used
    /// before a city is known)
    trailing: Regex,
}

static DESTINATION_PATTERNS: LazyLock<DestinationPatterns> = LazyLock::new(|| {
    let mk = |prefix: &str| {
        Regex::new(&format!("{}\\s+{}", prefix, CAPITALIZED_PLACE)).expect("Invalid destination regex")
    };
    DestinationPatterns {
        travel_to: mk(
            r"(?i:\b(?:trip|travel\w*|going|go|heading|headed|fly|flying|flight|moving|move|switch\w*|holiday|vacation|getaway|itinerary|plan\w*\s+for)\s+to)",
        ),
        visit: mk(r"(?i:\b(?:visit|visiting|explore|exploring|plan\w*\s+for))"),
        located_in: mk(r"(?i:\b(?:in|around|at))"),
        trailing: Regex::new(
            r"(?i)\b(?:trip|travel\w*|going|heading|headed|fly|flying|visit|visiting)\s+(?:to\s+)?(?P<city>[\p{L}][\p{L}'.\-]+(?:\s+[\p{L}][\p{L}'.\-]+){0,2})\s*[.!?]*$",
        )
        .expect("Invalid destination regex"),
    }
});

struct ModePatterns {
    chat: Regex,
    day_count: Regex,
    weekend: Regex,
    weeks: Regex,
    one_day: Regex,
    multi_day: Regex,
}

static MODE_PATTERNS: LazyLock<ModePatterns> = LazyLock::new(|| ModePatterns {
    chat: Regex::new(
        r"(?i)\b(?:just\s+(?:chat|chatting|talk|questions)|chat\s+mode|switch\s+(?:back\s+)?to\s+chat|no\s+itinerary|stop\s+planning)\b",
    )
    .expect("Invalid mode regex"),
    day_count: Regex::new(
        r"(?i)\b(?P<n>\d{1,2}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|a\s+couple\s+of|couple\s+of)[\s-]*(?P<unit>days?|nights?)\b",
    )
    .expect("Invalid mode regex"),
    weekend: Regex::new(r"(?i)\b(?:weekend|week-end)\b").expect("Invalid mode regex"),
    weeks: Regex::new(r"(?i)\b(?P<n>a|one|1|two|2)[\s-]+weeks?\b|\bweek[\s-]long\b")
        .expect("Invalid mode regex"),
    one_day: Regex::new(
        r"(?i)\b(?:day\s+trip|day\s+plan|single\s+day|full\s+day|plan\s+(?:my|our|the|a)\s+day|itinerary\s+for\s+(?:today|tomorrow)|plan\s+for\s+(?:today|tomorrow))\b",
    )
    .expect("Invalid mode regex"),
    multi_day: Regex::new(
        r"(?i)\b(?:multi[\s-]?day|several\s+days|few\s+days|multiple\s+days|day[\s-]by[\s-]day|longer\s+trip)\b",
    )
    .expect("Invalid mode regex"),
});

// Words that cannot be part of a city name: function words, planning
// vocabulary, acknowledgements, directions and calendar names.
static NON_CITY_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "alright", "an", "and", "any", "anywhere",
    "are", "around", "at", "away", "awesome", "back", "be", "best", "cool", "can", "chat",
    "city", "could", "day", "days", "do", "don't", "downtown", "early", "evening", "fine",
    "first", "for", "from", "go", "going", "good", "great", "hello", "help", "here", "hey",
    "hi", "home", "how", "i", "i'm", "in", "inside", "is", "it", "itinerary", "just",
    "know", "later", "like", "lol", "maybe", "me", "more", "morning", "my", "nah",
    "nearby", "need", "next", "night", "nights", "no", "nope", "not", "now", "of", "ok",
    "okay", "on", "or", "out", "outside", "perfect", "place", "plan", "planning",
    "please", "really", "shopping", "should", "some", "somewhere", "soon", "sounds",
    "sure", "tell", "thank", "thanks", "that", "the", "then", "there", "this", "to",
    "today", "together", "tomorrow", "tonight", "travel", "trip", "vacation", "visit",
    "want", "week", "weekend", "what", "when", "where", "which", "who", "why", "with",
    "wow", "would", "yeah", "yep", "yes", "you",
    // calendar
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december", "monday", "tuesday", "wednesday",
    "thursday", "friday", "saturday", "sunday", "spring", "summer", "autumn", "fall",
    "winter",
];

const MAX_BARE_CITY_WORDS: usize = 4;

// =============================================================================
// IntentClassifier
// =============================================================================

/// Heuristic classifier. Total: never fails, never panics on input.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    /// Explicit day counts above this are capped.
    pub max_trip_days: u8,
}

impl IntentClassifier {
    pub fn new(max_trip_days: u8) -> Self {
        Self { max_trip_days }
    }

    /// Classify the latest utterance against the session it belongs to.
    ///
    /// `session` may already contain `utterance` as its last user turn;
    /// it is skipped when looking for earlier mode signals.
    pub fn classify(&self, session: &Session, utterance: &str) -> Intent {
        let text = utterance.trim();
        let signal = self.mode_signal(text);

        let intent = match session.city.as_deref() {
            None => match self.extract_city(text, true) {
                Some(city) => Intent::CityResolved {
                    mode: self.mode_for_new_city(session, text),
                    city,
                },
                None => Intent::NeedCity,
            },
            Some(current) => match self.extract_city(text, false) {
                Some(city) if !same_city(&city, current) => Intent::CityResolved { city, mode: signal },
                _ => Intent::Mode(signal.unwrap_or_else(|| ModeRequest::from_mode(session.mode))),
            },
        };

        debug!(session_id = %session.id, ?intent, "Utterance classified");
        intent
    }

    /// Find a destination city in the utterance.
    ///
    /// With `allow_bare` the assistant is asking for a city, so looser
    /// matches are accepted: "in X", a lowercase trailing destination, or
    /// the whole utterance as the name. Without it only a capitalized
    /// place after an explicit travel phrase counts.
    pub fn extract_city(&self, utterance: &str, allow_bare: bool) -> Option<String> {
        let pats = &*DESTINATION_PATTERNS;
        let text = utterance.trim();

        let mut candidates = vec![&pats.travel_to, &pats.visit];
        if allow_bare {
            candidates.push(&pats.located_in);
        }
        for re in candidates {
            for caps in re.captures_iter(text) {
                if let Some(city) = caps.name("city").and_then(|m| clean_place(m.as_str())) {
                    return Some(city);
                }
            }
        }

        if !allow_bare {
            return None;
        }

        if let Some(city) = pats
            .trailing
            .captures(text)
            .and_then(|caps| caps.name("city").and_then(|m| clean_place(m.as_str())))
        {
            return Some(city);
        }

        bare_city(text)
    }

    /// Detect an explicit mode signal.
    pub fn mode_signal(&self, utterance: &str) -> Option<ModeRequest> {
        let pats = &*MODE_PATTERNS;

        if pats.chat.is_match(utterance) {
            return Some(ModeRequest::Chat);
        }

        if let Some(caps) = pats.day_count.captures(utterance) {
            if let Some(n) = caps.name("n").and_then(|m| parse_count(m.as_str())) {
                let nights = caps
                    .name("unit")
                    .is_some_and(|m| m.as_str().to_lowercase().starts_with("night"));
                // "3 nights" covers four days of sightseeing
                let days = if nights { n.saturating_add(1) } else { n };
                return Some(self.request_for_days(days));
            }
        }

        if pats.weekend.is_match(utterance) {
            return Some(ModeRequest::MultiDay { days: Some(2) });
        }

        if let Some(caps) = pats.weeks.captures(utterance) {
            let weeks = caps
                .name("n")
                .map(|m| match m.as_str().to_lowercase().as_str() {
                    "two" | "2" => 2,
                    _ => 1,
                })
                .unwrap_or(1);
            return Some(self.request_for_days(7 * weeks));
        }

        // "multi-day trip" also contains "day trip"
        if pats.multi_day.is_match(utterance) {
            return Some(ModeRequest::MultiDay { days: None });
        }

        if pats.one_day.is_match(utterance) {
            return Some(ModeRequest::OneDay);
        }

        None
    }

    /// Mode to attach when `utterance` supplies a city, however it was found.
    ///
    /// The utterance's own signal wins. While the session has no city yet,
    /// a signal from an earlier user turn is carried over.
    pub fn mode_for_new_city(&self, session: &Session, utterance: &str) -> Option<ModeRequest> {
        let text = utterance.trim();
        self.mode_signal(text).or_else(|| {
            if session.city.is_none() {
                self.pending_mode(session, text)
            } else {
                None
            }
        })
    }

    /// Mode signal from an earlier user turn, newest first.
    fn pending_mode(&self, session: &Session, current: &str) -> Option<ModeRequest> {
        let mut texts = session.user_texts_newest_first().peekable();
        if texts.peek().is_some_and(|t| t.trim() == current) {
            texts.next();
        }
        texts.find_map(|t| self.mode_signal(t))
    }

    fn request_for_days(&self, days: u8) -> ModeRequest {
        match days {
            0 => ModeRequest::MultiDay { days: None },
            1 => ModeRequest::OneDay,
            n => ModeRequest::MultiDay {
                days: Some(n.min(self.max_trip_days)),
            },
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(14)
    }
}

/// Resolve a mode request into a concrete session mode.
///
/// A multi-day request without a count gets `default_days`, clamped to 3..=5.
pub fn resolve_mode(request: ModeRequest, default_days: u8) -> TravelMode {
    match request {
        ModeRequest::Chat => TravelMode::Chat,
        ModeRequest::OneDay => TravelMode::OneDay,
        ModeRequest::MultiDay { days: Some(1) } => TravelMode::OneDay,
        ModeRequest::MultiDay { days: Some(days) } => TravelMode::MultiDay { days },
        ModeRequest::MultiDay { days: None } => TravelMode::MultiDay {
            days: default_days.clamp(3, 5),
        },
    }
}

/// Ask the generator to pick out a city the heuristics missed.
///
/// Any failure, timeout or a "NONE" answer yields `None`.
pub async fn extract_city_with_generator(
    generator: &dyn Generator,
    utterance: &str,
    timeout: Duration,
) -> Option<String> {
    const SYSTEM: &str = "You extract travel destinations. Reply with only the name of the \
                          city the user wants to visit, or NONE if no city is mentioned.";
    let prompt = PromptContext::bare(SYSTEM, utterance, TravelMode::Unset);

    match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
        Ok(Ok(answer)) => {
            let answer = answer.trim().trim_matches(|c: char| c == '"' || c == '.');
            if answer.eq_ignore_ascii_case("none") {
                return None;
            }
            clean_place(answer)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "City extraction via generator failed");
            None
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "City extraction via generator timed out");
            None
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Normalize a raw place capture: trim stop words off the tail and title-case.
fn clean_place(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = Vec::new();
    for word in raw.split_whitespace() {
        let word = word.trim_matches(|c: char| c == '.' || c == '\'' || c == '-');
        if word.is_empty() || is_non_city_word(word) {
            break;
        }
        words.push(word);
    }
    if words.is_empty() {
        return None;
    }
    Some(words.iter().map(|w| title_case(w)).collect::<Vec<_>>().join(" "))
}

/// The whole utterance as a city name ("Paris", "new delhi", "Paris, France").
fn bare_city(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(['.', '!', '?']);
    if text.is_empty() {
        return None;
    }
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || words.len() > MAX_BARE_CITY_WORDS {
        return None;
    }
    let plausible = words.iter().all(|w| {
        w.chars().any(char::is_alphabetic)
            && w.chars().all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'))
            && !is_non_city_word(w)
    });
    if !plausible {
        return None;
    }

    // Keep a comma-separated qualifier ("Paris, France")
    let parts: Vec<String> = text
        .split(',')
        .map(|part| {
            part.split_whitespace()
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty())
        .collect();
    Some(parts.join(", "))
}

fn is_non_city_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    NON_CITY_WORDS.contains(&lower.as_str())
}

/// Capitalize the first letter; lowercase the rest unless the word already mixes case.
fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest: String = chars.collect();
    let rest = if rest.chars().any(char::is_uppercase) && first.is_uppercase() {
        rest
    } else {
        rest.to_lowercase()
    };
    first.to_uppercase().chain(rest.chars()).collect()
}

pub(crate) fn same_city(a: &str, b: &str) -> bool {
    crate::cache::normalize_city(a) == crate::cache::normalize_city(b)
}

fn parse_count(raw: &str) -> Option<u8> {
    let lower = raw.to_lowercase();
    let lower = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    let n = match lower.as_str() {
        "one" => 1,
        "two" | "a couple of" | "couple of" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        digits => digits.parse::<u8>().ok()?,
    };
    Some(n)
}

// =============================================================================
// Tests
// =============================================================================
