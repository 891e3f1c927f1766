//! Prompt assembly for the generation backend.
//!
//! A [`PromptContext`] carries everything a generator needs: the system
//! prompt, bounded history, a context block built from live data (with
//! unavailable providers flagged) and the mode-specific instruction.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use wayfarer_core::types::{ExternalContext, ProviderKind, Role, Session, TravelMode, Turn};

/// System prompt for the travel assistant.
pub const SYSTEM_PROMPT: &str = "\
You are a travel guide and itinerary planner for one city at a time.

The current city and mode are given with every request. Assume questions are \
about that city unless the user clearly names another one.

Modes:
- chat: answer questions about the city (areas, sights, food, safety, where to stay).
- day_plan: a single-day itinerary in chronological blocks (morning, lunch, \
afternoon, evening, night) with approximate times and short travel hints.
- multi_day: a day-by-day itinerary for the requested number of days, 3 to 6 \
activities per day along a sensible route, mixing sights, food and rest.

Live data:
- Weather: decide indoor versus outdoor activities and what to wear or carry \
(above 30°C light clothes and water, below 15°C layers, rain an umbrella and an \
indoor backup, wind a windbreaker).
- Events: weave in events that fit the plan and always include their link.
- Web research: use it when opening hours, closures or current news matter.

A section marked UNAVAILABLE could not be fetched. Say so briefly when it \
matters and never invent the missing details. Use headings and bullet points \
for itineraries, time ranges like \"9:00-11:00\", approximate language for \
prices, and a friendly local tone.";

/// Everything a generator needs for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub system: String,
    pub city: Option<String>,
    pub mode: TravelMode,
    /// Prior turns, oldest first, excluding the current utterance.
    pub history: Vec<Turn>,
    /// Rendered live data; empty when none was gathered.
    pub context_block: String,
    pub external: Option<ExternalContext>,
    /// Final user-role content.
    pub instruction: String,
}

impl PromptContext {
    /// A single-shot prompt with no history or live data.
    pub fn bare(system: impl Into<String>, instruction: impl Into<String>, mode: TravelMode) -> Self {
        Self {
            system: system.into(),
            city: None,
            mode,
            history: Vec::new(),
            context_block: String::new(),
            external: None,
            instruction: instruction.into(),
        }
    }

    /// Flatten to plain text for backends without structured roles.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.system);
        if !self.context_block.is_empty() {
            let _ = writeln!(out, "{}\n", self.context_block);
        }
        for turn in &self.history {
            let _ = writeln!(out, "{}: {}", turn.role.as_str(), turn.text);
        }
        let _ = write!(out, "user: {}", self.instruction);
        out
    }
}

/// Builds prompts from a session and its gathered data.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    pub history_window: usize,
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// Build the prompt for `user_text`, the session's latest user turn.
    pub fn build(
        &self,
        session: &Session,
        external: Option<&ExternalContext>,
        user_text: &str,
    ) -> PromptContext {
        let prior = match session.turns.last() {
            Some(last) if last.role == Role::User && last.text == user_text => {
                &session.turns[..session.turns.len() - 1]
            }
            _ => &session.turns[..],
        };
        let start = prior.len().saturating_sub(self.history_window);
        let city = session.city.clone();

        PromptContext {
            system: SYSTEM_PROMPT.to_string(),
            context_block: context_block(city.as_deref(), session.mode, external),
            instruction: effective_instruction(city.as_deref(), session.mode, user_text),
            history: prior[start..].to_vec(),
            external: external.cloned(),
            mode: session.mode,
            city,
        }
    }
}

/// The user's request wrapped with mode-specific planning directions.
pub fn effective_instruction(city: Option<&str>, mode: TravelMode, user_text: &str) -> String {
    let city = city.unwrap_or("the city");
    let request = if user_text.trim().is_empty() {
        "none given"
    } else {
        user_text.trim()
    };
    match mode {
        TravelMode::OneDay => format!(
            "Plan a single full day in {city}. User preferences or constraints: {request}. \
             Create a realistic, enjoyable one-day plan with clear time blocks."
        ),
        TravelMode::MultiDay { days } => format!(
            "Plan a {days}-day trip in {city}. User description or constraints: {request}. \
             Create a day-by-day itinerary with balanced sightseeing, food and rest."
        ),
        TravelMode::Chat | TravelMode::Unset => user_text.trim().to_string(),
    }
}

fn context_block(city: Option<&str>, mode: TravelMode, external: Option<&ExternalContext>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current city: {}", city.unwrap_or("unknown"));
    let _ = writeln!(out, "Mode: {}", mode.label());
    if let Some(days) = mode.days().filter(|d| *d > 1) {
        let _ = writeln!(out, "Days: {days}");
    }

    let Some(ctx) = external else {
        return out;
    };
    let missing = |kind: ProviderKind| ctx.missing.contains(&kind);

    if let Some(weather) = &ctx.weather {
        let _ = writeln!(out, "\nWeather:\n{}", weather.summary);
    } else if missing(ProviderKind::Weather) {
        let _ = writeln!(out, "\nWeather: UNAVAILABLE");
    }

    if let Some(events) = &ctx.events {
        if events.is_empty() {
            let _ = writeln!(out, "\nLocal events: none found");
        } else {
            let _ = writeln!(out, "\nLocal events:");
            for event in events {
                let _ = write!(out, "- {}", event.name);
                if !event.date.is_empty() {
                    let _ = write!(out, " | When: {}", event.date);
                }
                if !event.venue.is_empty() {
                    let _ = write!(out, " | Venue: {}", event.venue);
                }
                if let Some(link) = &event.link {
                    let _ = write!(out, " | Link: {link}");
                }
                out.push('\n');
            }
        }
    } else if missing(ProviderKind::Events) {
        let _ = writeln!(out, "\nLocal events: UNAVAILABLE");
    }

    if let Some(results) = &ctx.search_results {
        let _ = writeln!(out, "\nWeb research:");
        for hit in results {
            let _ = writeln!(out, "- {}: {} ({})", hit.title, hit.snippet, hit.url);
        }
    } else if missing(ProviderKind::Search) {
        let _ = writeln!(out, "\nWeb research: UNAVAILABLE");
    }

    out
}
