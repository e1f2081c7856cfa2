//! Per-track flow: recognition → decision → webhooks and relays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use platewatch_core::metrics::{EVENTS, RELAY_TRIGGERS, TRACKS_DISCARDED, WEBHOOK_DELIVERIES};
use platewatch_core::{Clock, ConsolidatedEvent, Counters, EngineError, FinalizedTrack};
use platewatch_notify::{RelayController, WebhookDelivery, WebhookService};
use platewatch_recognition::Postprocessor;
use platewatch_rules::{Decision, DecisionEngine};

use crate::event_log::EventLog;

/// What one relay did in response to an event.
#[derive(Debug, Clone, Serialize)]
pub struct RelayReport {
    pub relay_id: String,
    /// `executed`, `debounced`, `inactive` or `error`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub deliveries: Vec<WebhookDelivery>,
    pub relays: Vec<RelayReport>,
}

/// Result of feeding one finalized track through the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackOutcome {
    /// No event: no plate, too little evidence, or a duplicate.
    Discarded {
        track_id: String,
        channel_id: String,
        reason: Option<String>,
        plate: Option<String>,
    },
    Emitted {
        event: ConsolidatedEvent,
        decision: Decision,
        dispatch: DispatchReport,
    },
}

impl TrackOutcome {
    pub fn is_emitted(&self) -> bool {
        matches!(self, TrackOutcome::Emitted { .. })
    }
}

pub struct RecognitionPipeline {
    postprocessor: Postprocessor,
    decisions: DecisionEngine,
    webhooks: WebhookService,
    relays: RelayController,
    events: EventLog,
    counters: Counters,
    clock: Arc<dyn Clock>,
}

impl RecognitionPipeline {
    pub fn new(
        postprocessor: Postprocessor,
        decisions: DecisionEngine,
        webhooks: WebhookService,
        relays: RelayController,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            postprocessor,
            decisions,
            webhooks,
            relays,
            events: EventLog::new(),
            counters: Counters::new(),
            clock,
        }
    }

    pub fn postprocessor(&self) -> &Postprocessor {
        &self.postprocessor
    }

    pub fn decisions(&self) -> &DecisionEngine {
        &self.decisions
    }

    pub fn webhooks(&self) -> &WebhookService {
        &self.webhooks
    }

    pub fn relays(&self) -> &RelayController {
        &self.relays
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Consolidate a finalized track and, if it yields a fresh plate,
    /// decide on it and run the resulting actions.
    ///
    /// Dispatch failures are reported in the outcome, never returned.
    /// Only payload serialization can fail the call.
    pub async fn process_track(&self, track: FinalizedTrack) -> Result<TrackOutcome, EngineError> {
        let now = self.clock.now();
        let result = self
            .postprocessor
            .process(&track.candidates, track.frames_with_plate, now);

        if !result.should_emit() {
            let reason = result.reason.map(|r| r.as_str());
            self.counters.inc(
                TRACKS_DISCARDED,
                &[
                    ("reason", reason.unwrap_or("unknown")),
                    ("channel", track.channel_id.as_str()),
                ],
            );
            debug!(
                track_id = %track.track_id,
                channel_id = %track.channel_id,
                reason = reason.unwrap_or("unknown"),
                "track discarded"
            );
            return Ok(TrackOutcome::Discarded {
                track_id: track.track_id,
                channel_id: track.channel_id,
                reason: reason.map(str::to_string),
                plate: result.plate,
            });
        }

        let event = ConsolidatedEvent::from_track(
            track,
            result.plate,
            result.confidence,
            result.country,
            now,
        );
        let decision = self.decisions.decide(&event, now);

        self.counters.inc(
            EVENTS,
            &[
                ("channel", event.channel_id.as_str()),
                ("country", event.country.as_deref().unwrap_or("unknown")),
            ],
        );
        info!(
            event_id = %event.id,
            channel_id = %event.channel_id,
            plate = event.plate.as_deref().unwrap_or("-"),
            confidence = event.confidence,
            rule = decision.rule_id.as_deref().unwrap_or("default"),
            actions = ?decision.actions.names(),
            suppressed = decision.suppressed_by_anti_flood,
            "event emitted"
        );
        self.events.append(event.clone(), decision.clone());

        let mut dispatch = DispatchReport::default();
        if decision.actions.send_webhook {
            dispatch.deliveries = self
                .webhooks
                .dispatch(&event, decision.list_type(), now)
                .await?;
            for delivery in &dispatch.deliveries {
                self.counters
                    .inc(WEBHOOK_DELIVERIES, &[("status", delivery.status.as_str())]);
            }
        }
        if decision.actions.trigger_relay {
            dispatch.relays = self.trigger_relays(&event.channel_id, now).await;
        }

        Ok(TrackOutcome::Emitted {
            event,
            decision,
            dispatch,
        })
    }

    async fn trigger_relays(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<RelayReport> {
        let results = self.relays.trigger_for_channel(channel_id, now).await;
        if results.is_empty() {
            debug!(channel_id, "no relay bound to channel");
        }
        results
            .into_iter()
            .map(|(relay_id, result)| {
                let report = match result {
                    Ok(outcome) => RelayReport {
                        relay_id,
                        outcome: outcome.as_str().to_string(),
                        error: None,
                    },
                    Err(e) => {
                        warn!(relay_id = %relay_id, error = %e, "relay trigger failed");
                        RelayReport {
                            relay_id,
                            outcome: "error".to_string(),
                            error: Some(e.to_string()),
                        }
                    }
                };
                self.counters
                    .inc(RELAY_TRIGGERS, &[("outcome", report.outcome.as_str())]);
                report
            })
            .collect()
    }

    /// Periodic housekeeping: retry due webhook deliveries and drop
    /// expired watch-list items.
    pub async fn tick(&self) -> Vec<WebhookDelivery> {
        let now = self.clock.now();
        let retried = self.webhooks.retry_due(now).await;
        for delivery in &retried {
            self.counters
                .inc(WEBHOOK_DELIVERIES, &[("status", delivery.status.as_str())]);
        }
        let purged = self.decisions.resolver().purge_expired(now);
        if !retried.is_empty() || purged > 0 {
            debug!(retried = retried.len(), purged, "tick");
        }
        retried
    }
}
