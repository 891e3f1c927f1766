use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Conversational mode of a session.
///
/// `Unset` is only valid while the session has no city. Multi-day plans
/// always carry a concrete day count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TravelMode {
    #[default]
    Unset,
    /// General questions about the city.
    Chat,
    /// A single-day itinerary.
    OneDay,
    /// A day-by-day itinerary over several days.
    MultiDay { days: u8 },
}

impl TravelMode {
    pub fn is_unset(&self) -> bool {
        matches!(self, TravelMode::Unset)
    }

    /// Short label used in prompts and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TravelMode::Unset => "unset",
            TravelMode::Chat => "chat",
            TravelMode::OneDay => "day_plan",
            TravelMode::MultiDay { .. } => "multi_day",
        }
    }

    /// Number of days covered by an itinerary mode.
    pub fn days(&self) -> Option<u8> {
        match self {
            TravelMode::OneDay => Some(1),
            TravelMode::MultiDay { days } => Some(*days),
            _ => None,
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelMode::MultiDay { days } => write!(f, "multi_day({})", days),
            other => f.write_str(other.label()),
        }
    }
}

/// Dialogue state derived from a session: a session is active once it has a city.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingCity,
    Active,
}

/// One of the three informational data providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Weather,
    Events,
    Search,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Weather => "weather",
            ProviderKind::Events => "events",
            ProviderKind::Search => "search",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Opaque session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session id from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// A single message within a session. Never mutated after it is appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One user's conversation: destination, mode and transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub city: Option<String>,
    pub mode: TravelMode,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            city: None,
            mode: TravelMode::Unset,
            turns: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn state(&self) -> DialogueState {
        if self.city.is_some() {
            DialogueState::Active
        } else {
            DialogueState::AwaitingCity
        }
    }

    /// The most recent `window` turns, oldest first.
    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    /// User utterances, newest first.
    pub fn user_texts_newest_first(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }

    /// Whether `mode` is unset exactly when `city` is unset.
    pub fn mode_matches_city(&self) -> bool {
        self.mode.is_unset() == self.city.is_none()
    }
}

// =============================================================================
// External data
// =============================================================================

/// Current conditions for a city.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// One-line human readable summary.
    pub summary: String,
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    pub conditions: String,
    pub humidity: Option<u8>,
    pub wind_mps: Option<f64>,
}

/// A local event happening in the city.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub date: String,
    pub venue: String,
    pub link: Option<String>,
}

/// A single open-web search hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Live data gathered for one reply. Built per turn, never persisted.
///
/// When `partial` is set, `missing` names the providers that failed; the
/// remaining fields still hold whatever succeeded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalContext {
    pub city: String,
    pub weather: Option<WeatherReport>,
    pub events: Option<Vec<EventSummary>>,
    pub search_results: Option<Vec<SearchSnippet>>,
    pub fetched_at: DateTime<Utc>,
    pub partial: bool,
    pub missing: Vec<ProviderKind>,
}

impl ExternalContext {
    pub fn empty(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            weather: None,
            events: None,
            search_results: None,
            fetched_at: Utc::now(),
            partial: false,
            missing: Vec::new(),
        }
    }

    /// Record a provider failure.
    pub fn mark_missing(&mut self, kind: ProviderKind) {
        self.partial = true;
        if !self.missing.contains(&kind) {
            self.missing.push(kind);
        }
    }

    /// True when no provider contributed anything.
    pub fn is_empty(&self) -> bool {
        self.weather.is_none() && self.events.is_none() && self.search_results.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, text: &str) -> Turn {
        Turn {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_travel_mode_serialization() {
        let json = serde_json::to_string(&TravelMode::MultiDay { days: 3 }).unwrap();
        assert_eq!(json, r#"{"kind":"multi_day","days":3}"#);

        let back: TravelMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TravelMode::MultiDay { days: 3 });

        let json = serde_json::to_string(&TravelMode::Chat).unwrap();
        assert_eq!(json, r#"{"kind":"chat"}"#);
    }

    #[test]
    fn test_travel_mode_default_is_unset() {
        assert!(TravelMode::default().is_unset());
    }

    #[test]
    fn test_travel_mode_days() {
        assert_eq!(TravelMode::Chat.days(), None);
        assert_eq!(TravelMode::OneDay.days(), Some(1));
        assert_eq!(TravelMode::MultiDay { days: 5 }.days(), Some(5));
    }

    #[test]
    fn test_travel_mode_display() {
        assert_eq!(TravelMode::OneDay.to_string(), "day_plan");
        assert_eq!(TravelMode::MultiDay { days: 2 }.to_string(), "multi_day(2)");
    }

    #[test]
    fn test_session_id_parse() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_session_id_serializes_as_plain_uuid() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }

    #[test]
    fn test_new_session_awaits_city() {
        let session = Session::new(SessionId::new());
        assert_eq!(session.state(), DialogueState::AwaitingCity);
        assert!(session.mode.is_unset());
        assert!(session.mode_matches_city());
    }

    #[test]
    fn test_mode_matches_city_detects_violation() {
        let mut session = Session::new(SessionId::new());
        session.city = Some("Paris".to_string());
        assert!(!session.mode_matches_city());
        session.mode = TravelMode::Chat;
        assert!(session.mode_matches_city());
        assert_eq!(session.state(), DialogueState::Active);
    }

    #[test]
    fn test_recent_turns_window() {
        let mut session = Session::new(SessionId::new());
        for i in 0..5 {
            session.turns.push(turn(Role::User, &format!("msg {}", i)));
        }
        let recent = session.recent_turns(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "msg 3");
        assert_eq!(recent[1].text, "msg 4");
        assert_eq!(session.recent_turns(50).len(), 5);
        assert!(session.recent_turns(0).is_empty());
    }

    #[test]
    fn test_user_texts_newest_first_skips_assistant() {
        let mut session = Session::new(SessionId::new());
        session.turns.push(turn(Role::User, "first"));
        session.turns.push(turn(Role::Assistant, "reply"));
        session.turns.push(turn(Role::User, "second"));
        let texts: Vec<&str> = session.user_texts_newest_first().collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn test_external_context_mark_missing() {
        let mut ctx = ExternalContext::empty("Rome");
        assert!(!ctx.partial);
        assert!(ctx.is_empty());
        ctx.mark_missing(ProviderKind::Events);
        ctx.mark_missing(ProviderKind::Events);
        assert!(ctx.partial);
        assert_eq!(ctx.missing, vec![ProviderKind::Events]);
    }
}
