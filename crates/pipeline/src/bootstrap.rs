//! Assemble a [`RecognitionPipeline`] from [`Config`] and the YAML
//! documents in the rules directory.

use std::sync::Arc;

use tracing::info;

use platewatch_core::{Clock, Config};
use platewatch_notify::{
    RelayController, RelayDriver, RelaySpec, WebhookService, WebhookSubscription, WebhookTransport,
};
use platewatch_recognition::Postprocessor;
use platewatch_rules::loader::ConfigLoader;

use crate::error::PipelineError;
use crate::pipeline::RecognitionPipeline;

pub const SUBSCRIPTIONS_FILE: &str = "subscriptions";
pub const RELAYS_FILE: &str = "relays";

/// Build the full pipeline. Any invalid list, rule, subscription or relay
/// document aborts startup.
pub fn build_pipeline(
    config: &Config,
    transport: Arc<dyn WebhookTransport>,
    driver: Arc<dyn RelayDriver>,
    clock: Arc<dyn Clock>,
) -> Result<RecognitionPipeline, PipelineError> {
    let postprocessor = Postprocessor::from_config(&config.postprocess)?;

    let loader = ConfigLoader::from_config(&config.rules);
    let decisions = loader.load_decision_engine(&config.rules)?;

    let webhooks = WebhookService::new(&config.webhook, transport).with_clock(clock.clone());
    for subscription in loader.load_documents::<WebhookSubscription>(SUBSCRIPTIONS_FILE)? {
        webhooks.add_subscription(subscription)?;
    }

    let relays = RelayController::new(&config.relay, driver);
    for spec in loader.load_documents::<RelaySpec>(RELAYS_FILE)? {
        relays.add_relay(spec)?;
    }

    info!(
        dir = %loader.dir().display(),
        lists = decisions.resolver().lists().len(),
        rules = decisions.evaluator().rules().len(),
        subscriptions = webhooks.subscriptions().len(),
        countries = ?postprocessor.classifier().codes(),
        "pipeline assembled"
    );

    Ok(RecognitionPipeline::new(
        postprocessor,
        decisions,
        webhooks,
        relays,
        clock,
    ))
}
