use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use chrono::TimeZone;

use super::*;

/// Records every executed sequence; can be told to fail.
#[derive(Default)]
struct RecordingDriver {
    executed: StdMutex<Vec<(String, Vec<RelayCommand>)>>,
    fail: AtomicBool,
}

impl RecordingDriver {
    fn executed(&self) -> Vec<(String, Vec<RelayCommand>)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RelayDriver for RecordingDriver {
    async fn execute(&self, relay: &AlarmRelay, commands: &[RelayCommand]) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Relay("bus offline".to_string()));
        }
        self.executed
            .lock()
            .unwrap()
            .push((relay.id.clone(), commands.to_vec()));
        Ok(())
    }
}

fn config() -> RelayConfig {
    RelayConfig {
        default_mode: RelayMode::Toggle,
        debounce_ms: 200,
    }
}

fn controller() -> (Arc<RecordingDriver>, RelayController) {
    let driver = Arc::new(RecordingDriver::default());
    let controller = RelayController::new(&config(), driver.clone());
    (driver, controller)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn ms(n: i64) -> Duration {
    Duration::milliseconds(n)
}

#[test]
fn plans_per_mode() {
    use RelayState::{Closed, Open};
    let cmd = |state, after_ms| RelayCommand { state, after_ms };
    assert_eq!(plan_commands(RelayMode::Toggle, Open, 0), vec![cmd(Closed, 0)]);
    assert_eq!(plan_commands(RelayMode::Toggle, Closed, 0), vec![cmd(Open, 0)]);
    assert_eq!(
        plan_commands(RelayMode::CloseOpen, Open, 1500),
        vec![cmd(Closed, 0), cmd(Open, 1500)]
    );
    assert_eq!(
        plan_commands(RelayMode::OpenClose, Closed, 300),
        vec![cmd(Open, 0), cmd(Closed, 300)]
    );
    assert_eq!(plan_commands(RelayMode::HoldClose, Closed, 0), vec![cmd(Closed, 0)]);
    assert_eq!(plan_commands(RelayMode::HoldOpen, Open, 0), vec![cmd(Open, 0)]);
}

#[tokio::test]
async fn debounce_absorbs_rapid_triggers() {
    let (driver, controller) = controller();
    let relay = controller
        .register_relay("barrier", Some("gate"), None, None, Some(200))
        .unwrap();

    let first = controller.trigger(&relay.id, t0()).await.unwrap();
    assert!(first.is_executed());

    let second = controller.trigger(&relay.id, t0() + ms(100)).await.unwrap();
    assert_eq!(second.as_str(), "debounced");
    assert_eq!(second.relay().last_triggered_at, Some(t0()));

    let third = controller.trigger(&relay.id, t0() + ms(250)).await.unwrap();
    assert!(third.is_executed());
    assert_eq!(third.relay().last_triggered_at, Some(t0() + ms(250)));

    assert_eq!(driver.executed().len(), 2);
}

#[tokio::test]
async fn toggle_flips_state_each_trigger() {
    let (_driver, controller) = controller();
    let relay = controller
        .register_relay("lamp", None, Some(RelayMode::Toggle), None, Some(0))
        .unwrap();
    assert_eq!(relay.state, RelayState::Open);

    let out = controller.trigger(&relay.id, t0()).await.unwrap();
    assert_eq!(out.relay().state, RelayState::Closed);
    let out = controller.trigger(&relay.id, t0() + ms(1)).await.unwrap();
    assert_eq!(out.relay().state, RelayState::Open);
}

#[tokio::test]
async fn close_open_ends_open_with_delay() {
    let (driver, controller) = controller();
    let relay = controller
        .register_relay("barrier", None, Some(RelayMode::CloseOpen), Some(1500), None)
        .unwrap();
    assert_eq!(relay.debounce_ms, 200, "default debounce applies");

    let out = controller.trigger(&relay.id, t0()).await.unwrap();
    let RelayOutcome::Executed { relay, commands } = out else {
        panic!("expected executed outcome");
    };
    assert_eq!(relay.state, RelayState::Open);
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1].after_ms, 1500);
    assert_eq!(driver.executed()[0].1, commands);
}

#[tokio::test]
async fn unknown_relay_is_not_found() {
    let (_driver, controller) = controller();
    let err = controller.trigger("nope", t0()).await.unwrap_err();
    assert!(matches!(
        err,
        NotifyError::Engine(EngineError::NotFound { kind: "relay", .. })
    ));
}

#[tokio::test]
async fn inactive_relay_issues_nothing() {
    let (driver, controller) = controller();
    let relay = controller.register_relay("siren", None, None, None, None).unwrap();
    controller.set_active(&relay.id, false).await.unwrap();

    let out = controller.trigger(&relay.id, t0()).await.unwrap();
    assert_eq!(out.as_str(), "inactive");
    assert!(driver.executed().is_empty());
    assert!(controller.relay(&relay.id).await.unwrap().last_triggered_at.is_none());
}

#[tokio::test]
async fn driver_failure_leaves_relay_untouched() {
    let (driver, controller) = controller();
    let relay = controller.register_relay("siren", None, None, None, None).unwrap();
    driver.fail.store(true, Ordering::SeqCst);

    assert!(matches!(
        controller.trigger(&relay.id, t0()).await,
        Err(NotifyError::Relay(_))
    ));
    let after = controller.relay(&relay.id).await.unwrap();
    assert_eq!(after.state, RelayState::Open);
    assert!(after.last_triggered_at.is_none());

    // Not debounced: the failed trigger never counted.
    driver.fail.store(false, Ordering::SeqCst);
    assert!(controller.trigger(&relay.id, t0() + ms(1)).await.unwrap().is_executed());
}

#[tokio::test]
async fn trigger_for_channel_hits_only_bound_relays() {
    let (driver, controller) = controller();
    controller.register_relay("north-1", Some("north"), None, None, None).unwrap();
    controller.register_relay("north-2", Some("north"), None, None, None).unwrap();
    controller.register_relay("south", Some("south"), None, None, None).unwrap();
    controller.register_relay("unbound", None, None, None, None).unwrap();

    let outcomes = controller.trigger_for_channel("north", t0()).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, o)| o.as_ref().unwrap().is_executed()));
    assert_eq!(driver.executed().len(), 2);

    assert!(controller.trigger_for_channel("east", t0()).await.is_empty());
}

#[tokio::test]
async fn concurrent_triggers_on_one_relay_execute_once() {
    let (driver, controller) = controller();
    let relay = controller
        .register_relay("barrier", None, None, None, Some(1_000))
        .unwrap();

    let attempts = (0..8).map(|i| controller.trigger(&relay.id, t0() + ms(i)));
    let outcomes = join_all(attempts).await;
    let executed = outcomes
        .iter()
        .filter(|o| o.as_ref().unwrap().is_executed())
        .count();
    assert_eq!(executed, 1);
    assert_eq!(driver.executed().len(), 1);
}

#[test]
fn duplicate_relay_id_is_rejected() {
    let (_driver, controller) = controller();
    let spec = RelaySpec {
        id: Some("r1".to_string()),
        ..RelaySpec::new("one")
    };
    controller.add_relay(spec.clone()).unwrap();
    assert!(matches!(
        controller.add_relay(spec),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn relay_spec_from_yaml() {
    let spec: RelaySpec = serde_yaml::from_str(
        "id: barrier\nname: Barrier\nchannel_id: gate\nmode: close_open\ndelay_ms: 1500\n",
    )
    .unwrap();
    assert_eq!(spec.mode, Some(RelayMode::CloseOpen));
    assert_eq!(spec.debounce_ms, None);
    assert!(spec.is_active);
    assert!(serde_yaml::from_str::<RelaySpec>("name: x\nmode: blink\n").is_err());
}

#[tokio::test]
async fn logging_driver_runs_sequence() {
    let driver = LoggingRelayDriver;
    let relay = AlarmRelay {
        id: "r".to_string(),
        name: "r".to_string(),
        channel_id: None,
        mode: RelayMode::CloseOpen,
        delay_ms: 5,
        debounce_ms: 0,
        is_active: true,
        state: RelayState::Open,
        last_triggered_at: None,
    };
    let commands = plan_commands(relay.mode, relay.state, relay.delay_ms);
    driver.execute(&relay, &commands).await.unwrap();
}
