//! Types exchanged between the classifier, orchestrator and callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wayfarer_core::types::{DialogueState, ProviderKind, SessionId, TravelMode};

/// Mode asked for by an utterance, before defaults are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ModeRequest {
    Chat,
    OneDay,
    /// `days` is `None` when the user asked for several days without a count.
    MultiDay { days: Option<u8> },
}

impl ModeRequest {
    /// Request that reproduces an existing session mode.
    pub fn from_mode(mode: TravelMode) -> Self {
        match mode {
            TravelMode::Unset | TravelMode::Chat => ModeRequest::Chat,
            TravelMode::OneDay => ModeRequest::OneDay,
            TravelMode::MultiDay { days } => ModeRequest::MultiDay { days: Some(days) },
        }
    }
}

/// Outcome of classifying one utterance. Every utterance maps to exactly one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// No city known and none found in the utterance.
    NeedCity,
    /// A destination was named; `mode` is set when a mode signal accompanied it.
    CityResolved {
        city: String,
        mode: Option<ModeRequest>,
    },
    /// City already known; the mode to use for this turn.
    Mode(ModeRequest),
}

/// Result of one handled turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub reply: String,
    pub state: DialogueState,
    pub city: Option<String>,
    pub mode: TravelMode,
    /// Some live data was unavailable for this reply.
    pub partial: bool,
    pub missing: Vec<ProviderKind>,
    /// The reply is the fixed fallback rather than a generated answer.
    pub degraded: bool,
}

/// Which informational providers a turn may consult.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToggles {
    pub weather: bool,
    pub events: bool,
    pub search: bool,
}

impl ProviderToggles {
    pub fn allows(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Weather => self.weather,
            ProviderKind::Events => self.events,
            ProviderKind::Search => self.search,
        }
    }

    /// Keep only the allowed providers of `required`.
    pub fn narrow(&self, required: &[ProviderKind]) -> Vec<ProviderKind> {
        required.iter().copied().filter(|k| self.allows(*k)).collect()
    }
}

impl Default for ProviderToggles {
    fn default() -> Self {
        Self {
            weather: true,
            events: true,
            search: true,
        }
    }
}

/// Caller-supplied overrides for a single turn.
///
/// An explicit `city` or `mode` wins over whatever the utterance implies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnOptions {
    pub city: Option<String>,
    pub mode: Option<ModeRequest>,
    pub providers: ProviderToggles,
}

/// Lightweight listing entry for a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub city: Option<String>,
    pub mode: TravelMode,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_request_from_mode() {
        assert_eq!(ModeRequest::from_mode(TravelMode::Unset), ModeRequest::Chat);
        assert_eq!(ModeRequest::from_mode(TravelMode::Chat), ModeRequest::Chat);
        assert_eq!(ModeRequest::from_mode(TravelMode::OneDay), ModeRequest::OneDay);
        assert_eq!(
            ModeRequest::from_mode(TravelMode::MultiDay { days: 6 }),
            ModeRequest::MultiDay { days: Some(6) }
        );
    }

    #[test]
    fn test_toggles_narrow_required_providers() {
        let required = [ProviderKind::Weather, ProviderKind::Events, ProviderKind::Search];
        assert_eq!(ProviderToggles::default().narrow(&required), required.to_vec());

        let no_web = ProviderToggles {
            search: false,
            ..ProviderToggles::default()
        };
        assert_eq!(
            no_web.narrow(&required),
            vec![ProviderKind::Weather, ProviderKind::Events]
        );
    }

    #[test]
    fn test_turn_outcome_serializes() {
        let outcome = TurnOutcome {
            session_id: SessionId::new(),
            reply: "Here is your plan".to_string(),
            state: DialogueState::Active,
            city: Some("Lisbon".to_string()),
            mode: TravelMode::OneDay,
            partial: true,
            missing: vec![ProviderKind::Events],
            degraded: false,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["mode"]["kind"], "one_day");
        assert_eq!(json["missing"][0], "events");
    }
}
