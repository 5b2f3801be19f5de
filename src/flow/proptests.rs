//! Property-based tests for the flow state machine
//!
//! Runs are driven through a small in-memory world that answers effects the
//! way the executor does, so properties cover whole runs rather than single
//! steps.

use super::transition::*;
use super::*;
use crate::config::Script;
use crate::error::{BotError, ErrorKind};
use crate::transport::Media;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> FlowContext {
    FlowContext::new("5491100000000", "Ana", "msg-1", Script::instant())
}

fn test_media() -> Media {
    Media {
        mimetype: "image/png".into(),
        data: "iVBORw0KGgo=".into(),
        filename: None,
    }
}

/// Answers effects for a simulated run
#[derive(Debug, Clone)]
struct World {
    balance: Option<i64>,
    /// Index of the executed effect that fails, if any
    fail_at: Option<usize>,
}

#[derive(Debug)]
struct Run {
    final_state: FlowState,
    effects: Vec<Effect>,
    balance: Option<i64>,
    /// Whether the injected failure fired
    failed: bool,
}

/// Message logging is best effort in the executor and never fails a run
fn can_fail(effect: &Effect) -> bool {
    !matches!(effect, Effect::LogMessage { .. })
}

fn simulate(kind: ContactKind, has_media: bool, mut world: World) -> Run {
    let context = test_context();
    let mut state = FlowState::Classifying;
    let mut executed = Vec::new();
    let mut failed = false;
    let mut pending = vec![Event::Classified {
        kind,
        text: "hola".into(),
        has_media,
    }];

    // Every run terminates well within this many events
    for _ in 0..32 {
        let Some(event) = pending.pop() else { break };
        let result = transition(&state, &context, event).expect("valid transition");
        state = result.new_state;

        for effect in result.effects {
            if world.fail_at == Some(executed.len()) && can_fail(&effect) && !state.is_terminal() {
                failed = true;
                executed.push(effect);
                pending.push(Event::StepFailed {
                    error: BotError::transport("injected"),
                });
                break;
            }

            let follow_up = match &effect {
                Effect::ReadBalance => Some(Event::BalanceRead {
                    balance: world.balance,
                }),
                Effect::SpendTokens { amount } => match world.balance {
                    Some(b) if b >= *amount => {
                        world.balance = Some(b - amount);
                        Some(Event::TokenSpent {
                            remaining: b - amount,
                        })
                    }
                    _ => Some(Event::SpendRefused),
                },
                Effect::DownloadMedia => Some(Event::MediaDownloaded {
                    media: test_media(),
                }),
                Effect::CompleteSteps => Some(Event::StepsCompleted),
                _ => None,
            };
            executed.push(effect);
            if let Some(event) = follow_up {
                pending.push(event);
            }
        }
    }

    Run {
        final_state: state,
        effects: executed,
        balance: world.balance,
        failed,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_kind() -> impl Strategy<Value = ContactKind> {
    prop_oneof![Just(ContactKind::New), Just(ContactKind::Known)]
}

fn arb_world() -> impl Strategy<Value = World> {
    (
        proptest::option::of(-2i64..10),
        proptest::option::weighted(0.3, 0usize..16),
    )
        .prop_map(|(balance, fail_at)| World { balance, fail_at })
}

fn arb_live_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        Just(FlowState::Classifying),
        Just(FlowState::Welcoming),
        Just(FlowState::CheckingBalance),
        (0i64..10).prop_map(|balance| FlowState::Charging { balance }),
        (0i64..10).prop_map(|remaining| FlowState::Converting { remaining }),
        (0i64..10).prop_map(|remaining| FlowState::Delivering { remaining }),
        Just(FlowState::Rejecting),
        Just(FlowState::Closing {
            outcome: Outcome::Welcomed
        }),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Welcomed),
        Just(Outcome::Logged),
        (0i64..10).prop_map(|remaining| Outcome::Converted { remaining }),
        Just(Outcome::Rejected),
        "[a-z ]{1,20}".prop_map(|message| Outcome::Aborted {
            error_kind: ErrorKind::StoreUnavailable,
            message
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_kind(), any::<bool>()).prop_map(|(kind, has_media)| Event::Classified {
            kind,
            text: String::new(),
            has_media
        }),
        proptest::option::of(0i64..10).prop_map(|balance| Event::BalanceRead { balance }),
        (0i64..10).prop_map(|remaining| Event::TokenSpent { remaining }),
        Just(Event::SpendRefused),
        Just(Event::MediaDownloaded {
            media: test_media()
        }),
        Just(Event::StepsCompleted),
        Just(Event::StepFailed {
            error: BotError::store("down")
        }),
    ]
}

fn spends(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::SpendTokens { .. }))
        .count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every run ends in Done
    #[test]
    fn prop_runs_terminate(kind in arb_kind(), has_media in any::<bool>(), world in arb_world()) {
        let run = simulate(kind, has_media, world);
        prop_assert!(run.final_state.is_terminal(), "stuck in {:?}", run.final_state);
    }

    /// At most one token is spent per inbound event
    #[test]
    fn prop_at_most_one_spend(kind in arb_kind(), has_media in any::<bool>(), world in arb_world()) {
        let run = simulate(kind, has_media, world);
        prop_assert!(spends(&run.effects) <= 1);
    }

    /// A contact's first message is never converted, media or not
    #[test]
    fn prop_new_contact_never_spends(has_media in any::<bool>(), world in arb_world()) {
        let before = world.balance;
        let run = simulate(ContactKind::New, has_media, world);
        prop_assert_eq!(spends(&run.effects), 0);
        prop_assert!(!run.effects.contains(&Effect::DownloadMedia));
        prop_assert_eq!(run.balance, before);
    }

    /// Known contact without media: logged, nothing sent
    #[test]
    fn prop_text_only_is_silent(world in arb_world()) {
        let run = simulate(ContactKind::Known, false, world);
        prop_assert!(!run.effects.iter().any(Effect::is_outbound));
        prop_assert!(!run.effects.iter().any(|e| matches!(e, Effect::ShowTyping)));
        prop_assert_eq!(spends(&run.effects), 0);
    }

    /// A sticker is sent only after a spend, and the follow-up count matches
    /// the ledger
    #[test]
    fn prop_sticker_implies_spend(world in arb_world()) {
        let run = simulate(ContactKind::Known, true, world);
        let stickers = run
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::SendSticker { .. }))
            .count();
        prop_assert!(stickers <= spends(&run.effects));

        if let Some(Outcome::Converted { remaining }) = run.final_state.outcome() {
            prop_assert_eq!(Some(*remaining), run.balance);
            prop_assert_eq!(stickers, 1);
        }
    }

    /// A balance below one never converts
    #[test]
    fn prop_empty_balance_rejects(balance in proptest::option::of(-5i64..1)) {
        let run = simulate(ContactKind::Known, true, World { balance, fail_at: None });
        prop_assert_eq!(run.final_state.outcome(), Some(&Outcome::Rejected));
        prop_assert_eq!(spends(&run.effects), 0);
        prop_assert!(!run.effects.contains(&Effect::CloseChat));
    }

    /// Nothing runs after a failed step
    #[test]
    fn prop_failure_stops_the_run(
        kind in arb_kind(),
        has_media in any::<bool>(),
        balance in proptest::option::of(0i64..10),
        fail_at in 0usize..16,
    ) {
        let run = simulate(kind, has_media, World { balance, fail_at: Some(fail_at) });
        if run.failed {
            prop_assert_eq!(run.effects.len(), fail_at + 1);
            let aborted = matches!(run.final_state.outcome(), Some(Outcome::Aborted { .. }));
            prop_assert!(aborted);
        }
    }

    /// StepFailed aborts from every live state, with no effects
    #[test]
    fn prop_step_failed_aborts(state in arb_live_state()) {
        let result = transition(&state, &test_context(), Event::StepFailed {
            error: BotError::transport("timeout"),
        }).unwrap();
        prop_assert!(result.effects.is_empty());
        let aborted = matches!(
            result.new_state,
            FlowState::Done { outcome: Outcome::Aborted { error_kind: ErrorKind::TransportFailure, .. } }
        );
        prop_assert!(aborted);
    }

    /// Terminal states accept no events
    #[test]
    fn prop_done_is_final(outcome in arb_outcome(), event in arb_event()) {
        let result = transition(&FlowState::Done { outcome }, &test_context(), event);
        prop_assert!(matches!(result, Err(TransitionError::Finished)));
    }

    /// The transition function is deterministic
    #[test]
    fn prop_transition_is_pure(state in arb_live_state(), event in arb_event()) {
        let a = transition(&state, &test_context(), event.clone());
        let b = transition(&state, &test_context(), event);
        match (a, b) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.new_state, b.new_state);
                prop_assert_eq!(a.effects, b.effects);
            }
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "same input, different result"),
        }
    }
}
