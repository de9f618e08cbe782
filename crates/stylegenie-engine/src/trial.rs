use std::fmt;

use serde_json::{json, Value};
use stylegenie_contracts::endpoints::{EndpointList, EndpointStrategy};
use stylegenie_contracts::events::{
    EventWriter, CANDIDATE_FAILED, ENDPOINT_PROMOTED, TRIAL_FAILED, TRIAL_STARTED,
    TRIAL_SUCCEEDED,
};
use stylegenie_contracts::outfits::{parse_outfit_response, OutfitParseError, ParsedOutfits};
use stylegenie_contracts::preferences::StylePreferences;
use stylegenie_contracts::validation::ValidationError;
use thiserror::Error;

use crate::transport::StylingTransport;
use crate::{error_chain_text, truncate_text};

pub const AGGREGATE_FAILURE_MESSAGE: &str =
    "We couldn't connect to our styling service right now. Please try again.";

const BODY_SNIPPET_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(String),
    Status { code: u16, body: String },
    Parse(OutfitParseError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(text) => write!(f, "transport error: {text}"),
            FailureReason::Status { code, body } if body.is_empty() => {
                write!(f, "status {code}")
            }
            FailureReason::Status { code, body } => write!(f, "status {code}: {body}"),
            FailureReason::Parse(err) => write!(f, "{err}"),
        }
    }
}

/// One attempt that did not produce a usable payload. Logged, never shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub url: String,
    pub reason: FailureReason,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.url, self.reason)
    }
}

/// Every candidate failed. `Display` gives the diagnostic; the banner text
/// comes from `user_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFailure {
    pub tried: Vec<String>,
    pub failures: Vec<CandidateFailure>,
}

impl AggregateFailure {
    pub fn user_message(&self) -> &'static str {
        AGGREGATE_FAILURE_MESSAGE
    }

    pub fn last_failure(&self) -> Option<&CandidateFailure> {
        self.failures.last()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} styling endpoints failed ({})",
            self.tried.len(),
            self.tried.join(", ")
        )?;
        if let Some(last) = self.last_failure() {
            write!(f, "; last: {last}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("no styling endpoints are configured")]
    NoCandidates,
    #[error("{0}")]
    Exhausted(AggregateFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSuccess {
    pub endpoint: String,
    /// 1-indexed position of the winning candidate in this pass.
    pub attempts: usize,
    pub outfits: ParsedOutfits,
    pub suppressed_failures: Vec<CandidateFailure>,
}

/// Tries candidate endpoints one at a time until one answers with a
/// recognized outfit payload.
pub struct EndpointTrialClient<T> {
    transport: T,
    events: Option<EventWriter>,
}

impl<T: StylingTransport> EndpointTrialClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventWriter>) -> Self {
        self.events = events;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn run<S: EndpointStrategy>(
        &self,
        strategy: &mut S,
        candidates: &EndpointList,
        preferences: &StylePreferences,
    ) -> Result<TrialSuccess, TrialError> {
        preferences.validate()?;
        let order = strategy.trial_order(candidates);
        if order.is_empty() {
            return Err(TrialError::NoCandidates);
        }
        let payload = Value::Object(preferences.request_payload());
        self.emit(
            TRIAL_STARTED,
            json!({ "candidates": order, "known_working": strategy.known_working() }),
        );

        let mut failures: Vec<CandidateFailure> = Vec::new();
        for (idx, url) in order.iter().enumerate() {
            match self.attempt(url, &payload) {
                Ok(outfits) => {
                    let promoted = strategy.known_working() != Some(url.as_str());
                    strategy.record_success(url);
                    if promoted {
                        tracing::info!(url = %url, "promoted known-working styling endpoint");
                        self.emit(ENDPOINT_PROMOTED, json!({ "url": url }));
                    }
                    self.emit(
                        TRIAL_SUCCEEDED,
                        json!({
                            "url": url,
                            "attempts": idx + 1,
                            "suggestions": outfits.suggestions.len(),
                        }),
                    );
                    return Ok(TrialSuccess {
                        endpoint: url.clone(),
                        attempts: idx + 1,
                        outfits: outfits.normalized(),
                        suppressed_failures: failures,
                    });
                }
                Err(reason) => {
                    let failure = CandidateFailure {
                        url: url.clone(),
                        reason,
                    };
                    tracing::warn!(url = %failure.url, reason = %failure.reason, "styling endpoint failed");
                    self.emit(
                        CANDIDATE_FAILED,
                        json!({ "url": failure.url, "reason": failure.reason.to_string() }),
                    );
                    failures.push(failure);
                }
            }
        }

        let aggregate = AggregateFailure {
            tried: order,
            failures,
        };
        tracing::error!(diagnostic = %aggregate, "styling request failed on every endpoint");
        self.emit(
            TRIAL_FAILED,
            json!({ "tried": aggregate.tried, "diagnostic": aggregate.to_string() }),
        );
        Err(TrialError::Exhausted(aggregate))
    }

    fn attempt(&self, url: &str, payload: &Value) -> Result<ParsedOutfits, FailureReason> {
        let response = self
            .transport
            .post_json(url, payload)
            .map_err(|err| FailureReason::Transport(error_chain_text(&err, 512)))?;
        if !response.is_success() {
            return Err(FailureReason::Status {
                code: response.status,
                body: truncate_text(response.body.trim(), BODY_SNIPPET_CHARS),
            });
        }
        parse_outfit_response(&response.body).map_err(FailureReason::Parse)
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        if let Err(err) = events.emit_json(event_type, payload) {
            tracing::warn!(error = %err, "failed writing {event_type} event");
        }
    }
}
