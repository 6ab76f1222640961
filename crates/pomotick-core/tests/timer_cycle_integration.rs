//! Integration tests for full focus/break cycles.
//!
//! Drives the engine through whole segments on a hand-driven clock and checks
//! the mode sequence, the focus counter and the completion events.

use std::cell::RefCell;
use std::rc::Rc;

use pomotick_core::{
    FocusCompleted, ManualClock, SettingsPatch, TimerEngine, TimerMode, TimerSettings, TimerStatus,
};
use proptest::prelude::*;

const T0: u64 = 1_767_225_600_000; // 2026-01-01T00:00:00Z

fn engine_with(settings: TimerSettings) -> (TimerEngine<ManualClock>, ManualClock) {
    let clock = ManualClock::new(T0);
    (TimerEngine::with_clock(settings, clock.clone()), clock)
}

/// Run the current focus segment to zero and return the mode it hands over to.
fn complete_focus(engine: &mut TimerEngine<ManualClock>, clock: &ManualClock) -> TimerMode {
    engine.set_mode(TimerMode::Focus);
    let started = engine.start();
    clock.advance(started.remaining_ms);
    engine.tick().mode
}

#[test]
fn default_cycle_ends_in_long_break() {
    let (mut engine, clock) = engine_with(TimerSettings::default());
    let completions = Rc::new(RefCell::new(Vec::<FocusCompleted>::new()));
    let sink = Rc::clone(&completions);
    let _sub = engine.on_focus_completed(move |c| sink.borrow_mut().push(c));

    let modes: Vec<TimerMode> = (0..4).map(|_| complete_focus(&mut engine, &clock)).collect();

    assert_eq!(
        modes,
        vec![
            TimerMode::ShortBreak,
            TimerMode::ShortBreak,
            TimerMode::ShortBreak,
            TimerMode::LongBreak
        ]
    );
    let state = engine.get_state();
    assert_eq!(state.completed_focus, 4);
    assert_eq!(state.status, TimerStatus::Idle);
    assert_eq!(state.duration_ms, 15 * 60_000);

    let completions = completions.borrow();
    assert_eq!(completions.len(), 4);
    assert!(completions.iter().all(|c| c.planned_duration_ms == 25 * 60_000));
    assert_eq!(completions[0].ended_at_ms, T0 + 25 * 60_000);
}

#[test]
fn long_break_every_two() {
    let (mut engine, clock) = engine_with(TimerSettings::default());
    engine.update_settings(&SettingsPatch {
        long_break_every: Some(2.0),
        ..SettingsPatch::default()
    });

    assert_eq!(complete_focus(&mut engine, &clock), TimerMode::ShortBreak);
    assert_eq!(complete_focus(&mut engine, &clock), TimerMode::LongBreak);
    assert_eq!(engine.completed_focus(), 2);
}

#[test]
fn skip_twice_counts_nothing() {
    let (mut engine, _) = engine_with(TimerSettings::default());
    let completions = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&completions);
    let _sub = engine.on_focus_completed(move |_| *sink.borrow_mut() += 1);

    let first = engine.skip();
    assert_eq!(first.mode, TimerMode::ShortBreak);
    assert_eq!(first.completed_focus, 0);

    let second = engine.skip();
    assert_eq!(second.mode, TimerMode::Focus);
    assert_eq!(second.completed_focus, 0);
    assert_eq!(*completions.borrow(), 0);
}

#[test]
fn auto_start_runs_the_whole_cycle_unattended() {
    let settings = TimerSettings {
        auto_start_next: true,
        ..TimerSettings::default()
    };
    let (mut engine, clock) = engine_with(settings);
    engine.start();

    // focus, short break, focus
    clock.advance(25 * 60_000);
    assert_eq!(engine.tick().mode, TimerMode::ShortBreak);
    clock.advance(5 * 60_000);
    let state = engine.tick();
    assert_eq!(state.mode, TimerMode::Focus);
    assert_eq!(state.status, TimerStatus::Running);
    assert_eq!(state.completed_focus, 1);
    assert!(engine.ticker_interval().is_some());
}

#[test]
fn late_observation_completes_exactly_once() {
    let (mut engine, clock) = engine_with(TimerSettings::default());
    engine.start();
    clock.advance(3 * 60 * 60_000);

    let state = engine.get_state();
    assert_eq!(state.mode, TimerMode::ShortBreak);
    assert_eq!(state.status, TimerStatus::Idle);
    assert_eq!(state.completed_focus, 1);
    assert_eq!(engine.tick().completed_focus, 1);
}

proptest! {
    #[test]
    fn kth_completion_follows_the_modulus(every in 1u32..7, completions in 1usize..15) {
        let settings = TimerSettings {
            long_break_every: every,
            focus_minutes: 0.01,
            ..TimerSettings::default()
        };
        let (mut engine, clock) = engine_with(settings);

        for k in 1..=completions {
            let next = complete_focus(&mut engine, &clock);
            let expected = if k as u32 % every == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::ShortBreak
            };
            prop_assert_eq!(next, expected);
            prop_assert_eq!(engine.completed_focus(), k as u64);
        }
    }

    #[test]
    fn snapshot_duration_tracks_active_settings(
        focus in 0.01f64..120.0,
        short in 0.01f64..60.0,
        long in 0.01f64..90.0,
    ) {
        let (mut engine, _) = engine_with(TimerSettings::default());
        let state = engine.update_settings(&SettingsPatch {
            focus_minutes: Some(focus),
            short_break_minutes: Some(short),
            long_break_minutes: Some(long),
            ..SettingsPatch::default()
        });
        prop_assert_eq!(state.duration_ms, (focus * 60_000.0).round() as u64);

        let state = engine.set_mode(TimerMode::LongBreak);
        prop_assert_eq!(state.duration_ms, (long * 60_000.0).round() as u64);
        prop_assert_eq!(state.remaining_ms, state.duration_ms);
    }

    #[test]
    fn paused_update_never_grows_remaining(elapsed in 1u64..(25 * 60_000), focus in 0.5f64..60.0) {
        let (mut engine, clock) = engine_with(TimerSettings::default());
        engine.start();
        clock.advance(elapsed);
        let paused = engine.pause();
        prop_assume!(paused.status == TimerStatus::Paused);

        let updated = engine.update_settings(&SettingsPatch {
            focus_minutes: Some(focus),
            ..SettingsPatch::default()
        });
        prop_assert!(updated.remaining_ms <= paused.remaining_ms);
        prop_assert!(updated.remaining_ms <= updated.duration_ms);

        let resumed = engine.start();
        prop_assert_eq!(resumed.remaining_ms, updated.remaining_ms);
    }
}
