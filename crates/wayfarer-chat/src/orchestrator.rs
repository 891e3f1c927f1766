//! Dialogue orchestrator: central coordinator wiring store, classifier,
//! aggregator and generator.
//!
//! Drives the two-state conversation (awaiting a city, then active with a
//! per-turn mode) and turns every user message into exactly one reply.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use wayfarer_core::config::{DialogueConfig, WayfarerConfig};
use wayfarer_core::types::{ProviderKind, Role, Session, SessionId, TravelMode};

use crate::aggregator::{required_providers, DataAggregator};
use crate::classifier::{extract_city_with_generator, resolve_mode, same_city, IntentClassifier};
use crate::error::ChatError;
use crate::prompt::{PromptBuilder, PromptContext};
use crate::provider::{Generator, ProviderSet};
use crate::store::SessionStore;
use crate::types::{Intent, ModeRequest, TurnOptions, TurnOutcome};

/// Reply while no destination is known.
pub const NEED_CITY_REPLY: &str = "Before I can help, tell me which city you're planning to visit \
                                   (for example: Jaipur, Paris, Bangkok).";

/// Reply when generation fails, times out or the turn runs out of time.
pub const FALLBACK_REPLY: &str =
    "I'm unable to reach the assistant right now. Please try again in a moment.";

/// Central dialogue coordinator.
pub struct DialogueOrchestrator {
    store: Arc<SessionStore>,
    classifier: IntentClassifier,
    aggregator: DataAggregator,
    generator: Arc<dyn Generator>,
    prompts: PromptBuilder,
    config: DialogueConfig,
    max_message_chars: usize,
}

impl DialogueOrchestrator {
    /// Create an orchestrator with its own session store.
    pub fn new(providers: ProviderSet, config: &WayfarerConfig) -> Self {
        let store = Arc::new(SessionStore::new(config.session.idle_timeout()));
        Self::with_store(store, providers, config)
    }

    /// Create an orchestrator over an existing store.
    pub fn with_store(store: Arc<SessionStore>, providers: ProviderSet, config: &WayfarerConfig) -> Self {
        Self {
            classifier: IntentClassifier::new(config.dialogue.max_trip_days),
            aggregator: DataAggregator::new(&providers, &config.aggregator),
            generator: providers.generator,
            prompts: PromptBuilder::new(config.session.history_window),
            config: config.dialogue.clone(),
            max_message_chars: config.session.max_message_chars,
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &DataAggregator {
        &self.aggregator
    }

    /// Open a new conversation in the awaiting-city state.
    pub fn start_session(&self) -> SessionId {
        self.store.create()
    }

    /// Handle one user message and produce the assistant's reply.
    ///
    /// Only an unknown or expired session is an error; provider and
    /// generation problems degrade into partial data or the fallback reply.
    pub async fn handle_turn(&self, id: SessionId, user_text: &str) -> Result<TurnOutcome, ChatError> {
        self.handle_turn_with(id, user_text, &TurnOptions::default())
            .await
    }

    /// [`handle_turn`](Self::handle_turn) with caller overrides for the
    /// city, the mode and which providers may be consulted.
    pub async fn handle_turn_with(
        &self,
        id: SessionId,
        user_text: &str,
        options: &TurnOptions,
    ) -> Result<TurnOutcome, ChatError> {
        let started = Instant::now();
        let _guard = self.store.begin_turn(id).await?;
        self.store.touch(id)?;

        let text = truncate_chars(user_text.trim(), self.max_message_chars);
        self.store.append_turn(id, Role::User, &text)?;

        let session = self.store.get(id)?;
        let intent = self.classify(&session, &text, options).await;

        let request = match intent {
            Intent::NeedCity => {
                debug!(session_id = %id, "No destination yet; asking for a city");
                return self.finish(id, NEED_CITY_REPLY.to_string(), Vec::new(), false, started);
            }
            Intent::CityResolved { city, mode } => {
                if session.city.is_some() {
                    info!(session_id = %id, from = ?session.city, to = %city, "Destination changed");
                }
                self.store.set_city(id, city)?;
                mode.unwrap_or(ModeRequest::Chat)
            }
            Intent::Mode(request) => request,
        };

        let mode = self.concrete_mode(request);
        self.store.set_mode(id, mode)?;

        let session = self.store.get(id)?;
        let city = session.city.clone().ok_or_else(|| {
            ChatError::InvalidModeTransition("active turn without a city".to_string())
        })?;

        if text.is_empty() {
            let reply = format!("You're set for {city}. What would you like to know or plan?");
            return self.finish(id, reply, Vec::new(), false, started);
        }

        let providers = options.providers.narrow(required_providers(mode));
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.turn_deadline_ms);

        let fetched = tokio::time::timeout_at(
            deadline,
            self.aggregator.fetch_selected(&city, mode, &text, &providers),
        )
        .await;
        let external = match fetched {
            Ok(external) => external,
            Err(_) => {
                // Calls that finished before the deadline left their results cached
                let external = self.aggregator.cached(&city, mode, &text, &providers);
                self.deadline_expired(id, &city, "aggregation");
                return self.finish(id, FALLBACK_REPLY.to_string(), external.missing, true, started);
            }
        };

        let prompt = self.prompts.build(&session, Some(&external), &text);
        let (reply, degraded) = match tokio::time::timeout_at(deadline, self.generate(id, &prompt)).await {
            Ok(Some(reply)) => (reply, false),
            Ok(None) => (FALLBACK_REPLY.to_string(), true),
            Err(_) => {
                self.deadline_expired(id, &city, "generation");
                (FALLBACK_REPLY.to_string(), true)
            }
        };

        self.finish(id, reply, external.missing, degraded, started)
    }

    /// Classify, applying caller overrides and, when enabled, asking the
    /// generator for a city the heuristics missed.
    async fn classify(&self, session: &Session, text: &str, options: &TurnOptions) -> Intent {
        let intent = match options.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(city) => self.city_override(session, text, city),
            None => self.classify_text(session, text).await,
        };

        match (intent, options.mode) {
            (Intent::CityResolved { city, .. }, Some(mode)) => Intent::CityResolved {
                city,
                mode: Some(mode),
            },
            (Intent::Mode(_), Some(mode)) => Intent::Mode(mode),
            (intent, _) => intent,
        }
    }

    fn city_override(&self, session: &Session, text: &str, city: &str) -> Intent {
        let unchanged = session
            .city
            .as_deref()
            .is_some_and(|current| same_city(current, city));
        if unchanged {
            return match self.classifier.classify(session, text) {
                // The override pins the city even if the text names another
                Intent::CityResolved { mode, .. } => {
                    Intent::Mode(mode.unwrap_or_else(|| ModeRequest::from_mode(session.mode)))
                }
                intent => intent,
            };
        }
        Intent::CityResolved {
            city: city.to_string(),
            mode: self.classifier.mode_for_new_city(session, text),
        }
    }

    async fn classify_text(&self, session: &Session, text: &str) -> Intent {
        let intent = self.classifier.classify(session, text);
        if intent != Intent::NeedCity || !self.config.llm_city_fallback || text.is_empty() {
            return intent;
        }

        let timeout = Duration::from_millis(self.config.city_fallback_timeout_ms);
        match extract_city_with_generator(self.generator.as_ref(), text, timeout).await {
            Some(city) => {
                debug!(session_id = %session.id, %city, "City found by generator");
                Intent::CityResolved {
                    city,
                    mode: self.classifier.mode_for_new_city(session, text),
                }
            }
            None => Intent::NeedCity,
        }
    }

    fn deadline_expired(&self, id: SessionId, city: &str, stage: &'static str) {
        warn!(
            session_id = %id,
            city,
            stage,
            deadline_ms = self.config.turn_deadline_ms,
            "Turn deadline expired; replying with fallback"
        );
    }

    fn concrete_mode(&self, request: ModeRequest) -> TravelMode {
        match resolve_mode(request, self.config.default_trip_days) {
            TravelMode::MultiDay { days } => TravelMode::MultiDay {
                days: days.min(self.config.max_trip_days),
            },
            other => other,
        }
    }

    async fn generate(&self, id: SessionId, prompt: &PromptContext) -> Option<String> {
        let timeout = Duration::from_millis(self.config.generation_timeout_ms);
        match tokio::time::timeout(timeout, self.generator.generate(prompt)).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => Some(reply.trim().to_string()),
            Ok(Ok(_)) => {
                warn!(session_id = %id, "Generator returned an empty reply");
                None
            }
            Ok(Err(e)) => {
                warn!(session_id = %id, error = %e, "Generation failed");
                None
            }
            Err(_) => {
                warn!(
                    session_id = %id,
                    timeout_ms = self.config.generation_timeout_ms,
                    "Generation timed out"
                );
                None
            }
        }
    }

    fn finish(
        &self,
        id: SessionId,
        reply: String,
        missing: Vec<ProviderKind>,
        degraded: bool,
        started: Instant,
    ) -> Result<TurnOutcome, ChatError> {
        self.store.append_turn(id, Role::Assistant, &reply)?;
        self.store.touch(id)?;
        let session = self.store.get(id)?;

        info!(
            session_id = %id,
            city = ?session.city,
            mode = %session.mode,
            partial = !missing.is_empty(),
            degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn handled"
        );

        Ok(TurnOutcome {
            session_id: id,
            reply,
            state: session.state(),
            city: session.city,
            mode: session.mode,
            partial: !missing.is_empty(),
            missing,
            degraded,
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
