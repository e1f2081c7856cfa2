use std::collections::BTreeMap;

use chrono::{Duration, TimeZone};
use uuid::Uuid;

use platewatch_core::{Direction, ListType};

use super::*;
use crate::schema::RuleCondition;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn event(channel: &str, confidence: f64) -> ConsolidatedEvent {
    ConsolidatedEvent {
        id: Uuid::new_v4(),
        channel_id: channel.to_string(),
        track_id: "t-1".to_string(),
        plate: Some("AB123".to_string()),
        confidence,
        country: Some("EU".to_string()),
        bbox: None,
        direction: Some(Direction::Up),
        image_url: None,
        frames_with_plate: 3,
        metadata: BTreeMap::new(),
        created_at: t0(),
    }
}

fn black() -> ListMatch {
    ListMatch {
        list_id: "stolen".to_string(),
        list_name: "Stolen".to_string(),
        list_type: ListType::Black,
        priority: 10,
        item_id: "i-1".to_string(),
        pattern: "AB123".to_string(),
    }
}

fn relay_and_webhook() -> RuleAction {
    RuleAction {
        trigger_relay: true,
        send_webhook: true,
        record_clip: false,
        annotate_ui: true,
    }
}

fn evaluator() -> RuleEvaluator {
    RuleEvaluator::new(RuleAction::default())
}

#[test]
fn no_rules_means_default_actions() {
    let decision = evaluator().evaluate(&event("gate", 0.9), None, t0());
    assert!(decision.is_default());
    assert_eq!(decision.actions, RuleAction::default());
    assert!(!decision.actions.trigger_relay);
    assert!(!decision.actions.record_clip);
    assert!(!decision.suppressed_by_anti_flood);
}

#[test]
fn low_confidence_falls_through_to_next_rule() {
    let evaluator = evaluator();
    evaluator
        .register_rule(
            Rule::new(
                "confident",
                RuleCondition {
                    min_confidence: Some(0.6),
                    ..Default::default()
                },
                relay_and_webhook(),
            )
            .with_id("confident"),
        )
        .unwrap();
    evaluator
        .register_rule(
            Rule::new("fallback", RuleCondition::default(), RuleAction::none()).with_id("fallback"),
        )
        .unwrap();

    let decision = evaluator.evaluate(&event("gate", 0.5), None, t0());
    assert_eq!(decision.rule_id.as_deref(), Some("fallback"));
    assert!(decision.actions.is_empty());

    let decision = evaluator.evaluate(&event("gate", 0.7), None, t0());
    assert_eq!(decision.rule_id.as_deref(), Some("confident"));
    assert!(decision.actions.trigger_relay);
}

#[test]
fn low_confidence_falls_through_to_defaults() {
    let evaluator = evaluator();
    evaluator
        .register_rule(Rule::new(
            "confident",
            RuleCondition {
                min_confidence: Some(0.6),
                ..Default::default()
            },
            relay_and_webhook(),
        ))
        .unwrap();
    let decision = evaluator.evaluate(&event("gate", 0.5), None, t0());
    assert!(decision.is_default());
    assert_eq!(decision.actions, RuleAction::default());
}

#[test]
fn first_registered_match_wins() {
    let evaluator = evaluator();
    for id in ["a", "b"] {
        evaluator
            .register_rule(Rule::new(id, RuleCondition::default(), relay_and_webhook()).with_id(id))
            .unwrap();
    }
    let decision = evaluator.evaluate(&event("gate", 0.9), None, t0());
    assert_eq!(decision.rule_id.as_deref(), Some("a"));
    assert_eq!(decision.rule_name.as_deref(), Some("a"));
}

#[test]
fn list_match_is_carried_into_decision() {
    let evaluator = evaluator();
    evaluator
        .register_rule(Rule::new(
            "blacklist",
            RuleCondition {
                list_type: Some(ListType::Black),
                ..Default::default()
            },
            relay_and_webhook(),
        ))
        .unwrap();

    let hit = black();
    let decision = evaluator.evaluate(&event("gate", 0.9), Some(&hit), t0());
    assert_eq!(decision.list_type(), Some(ListType::Black));
    assert!(decision.actions.trigger_relay);

    let decision = evaluator.evaluate(&event("gate", 0.9), None, t0());
    assert!(decision.is_default());
    assert_eq!(decision.list_type(), None);
}

#[test]
fn anti_flood_suppresses_repeat_on_same_channel() {
    let evaluator = evaluator();
    evaluator
        .register_rule(
            Rule::new(
                "flood",
                RuleCondition {
                    anti_flood_seconds: Some(30),
                    ..Default::default()
                },
                relay_and_webhook(),
            )
            .with_id("flood"),
        )
        .unwrap();

    let first = evaluator.evaluate(&event("gate", 0.9), None, t0());
    assert!(!first.suppressed_by_anti_flood);
    assert!(first.actions.trigger_relay);

    let second = evaluator.evaluate(&event("gate", 0.9), None, t0() + Duration::seconds(10));
    assert!(second.suppressed_by_anti_flood);
    assert_eq!(second.rule_id.as_deref(), Some("flood"));
    assert!(second.actions.is_empty());

    let other_channel = evaluator.evaluate(&event("yard", 0.9), None, t0() + Duration::seconds(10));
    assert!(!other_channel.suppressed_by_anti_flood);

    let later = evaluator.evaluate(&event("gate", 0.9), None, t0() + Duration::seconds(30));
    assert!(!later.suppressed_by_anti_flood);
}

#[test]
fn duplicate_rule_id_is_rejected() {
    let evaluator = evaluator();
    let rule = Rule::new("r", RuleCondition::default(), RuleAction::default()).with_id("r");
    evaluator.register_rule(rule.clone()).unwrap();
    assert!(matches!(
        evaluator.register_rule(rule),
        Err(EngineError::Configuration(_))
    ));
    assert_eq!(evaluator.rules().len(), 1);
}

#[test]
fn out_of_range_confidence_is_rejected() {
    let rule = Rule::new(
        "r",
        RuleCondition {
            min_confidence: Some(1.5),
            ..Default::default()
        },
        RuleAction::default(),
    );
    assert!(evaluator().register_rule(rule).is_err());
}

#[test]
fn remove_rule() {
    let evaluator = evaluator();
    evaluator
        .register_rule(Rule::new("r", RuleCondition::default(), RuleAction::none()).with_id("r"))
        .unwrap();
    let removed = evaluator.remove_rule("r").unwrap();
    assert_eq!(removed.id, "r");
    assert!(evaluator.rules().is_empty());
    assert!(matches!(
        evaluator.remove_rule("r"),
        Err(EngineError::NotFound { kind: "rule", .. })
    ));
}

#[test]
fn default_actions_from_config() {
    let config = RulesConfig {
        rules_dir: "unused".into(),
        default_actions: vec!["annotate_ui".to_string()],
    };
    let evaluator = RuleEvaluator::from_config(&config).unwrap();
    let decision = evaluator.evaluate(&event("gate", 0.9), None, t0());
    assert!(!decision.actions.send_webhook);
    assert!(decision.actions.annotate_ui);

    let bad = RulesConfig {
        rules_dir: "unused".into(),
        default_actions: vec!["explode".to_string()],
    };
    assert!(RuleEvaluator::from_config(&bad).is_err());
}
