// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Goal progress scoring.
//!
//! A goal's progress blends two signals: the fraction of its milestones that
//! are complete (weight 0.6 when any milestone exists) and the mean trailing
//! 30-day completion rate of its habits (weight 0.4 when any habit exists).
//! When only one category exists the result is renormalized by the weight
//! actually present, so a goal with a single habit at 50% scores 50, not 20.
//!
//! Scoring is pure: "now" is an explicit argument and the same inputs always
//! produce the same output.

use time::Date;

use crate::{Habit, HabitCompletion, HabitFrequency, HabitId, Milestone};

pub const MILESTONE_WEIGHT: f64 = 0.6;
pub const HABIT_WEIGHT: f64 = 0.4;

/// Trailing window length in days; a completion on day `now - 29` through
/// `now` counts, anything older or in the future does not.
pub const WINDOW_DAYS: i64 = 30;

/// Overall progress for one goal, 0-100.
///
/// `completions` may contain rows for unrelated habits; each habit counts
/// only its own rows. Both lists empty scores 0.
pub fn goal_progress(
    habits: &[Habit],
    milestones: &[Milestone],
    completions: &[HabitCompletion],
    now: Date,
) -> u8 {
    if habits.is_empty() && milestones.is_empty() {
        return 0;
    }

    let mut completed_weight = 0.0;
    let mut total_weight = 0.0;

    if !milestones.is_empty() {
        let done = milestones.iter().filter(|m| m.completed).count();
        completed_weight += MILESTONE_WEIGHT * done as f64 / milestones.len() as f64;
        total_weight += MILESTONE_WEIGHT;
    }

    if !habits.is_empty() {
        let sum: f64 = habits
            .iter()
            .map(|habit| habit_score(habit, completions, now))
            .sum();
        completed_weight += HABIT_WEIGHT * sum / habits.len() as f64;
        total_weight += HABIT_WEIGHT;
    }

    let percent = (100.0 * completed_weight / total_weight).round();
    percent.clamp(0.0, 100.0) as u8
}

/// One habit's trailing-window completion rate, capped at 1.0.
///
/// Duplicate rows for the same date inflate the observed count; the cap keeps
/// the score from exceeding a fully-met habit.
pub fn habit_score(habit: &Habit, completions: &[HabitCompletion], now: Date) -> f64 {
    let expected = expected_completions(habit.frequency, habit.frequency_value);
    let observed = completions_in_window(habit.id, completions, now);
    (observed as f64 / expected as f64).min(1.0)
}

/// Expected completions over one 30-day window.
///
/// `frequency_value` is a per-period count, except for custom where it is the
/// period length in days ("every N days"). The result is clamped to at least
/// 1 so the completion ratio stays defined when N exceeds the window.
pub fn expected_completions(frequency: HabitFrequency, frequency_value: i32) -> u32 {
    let value = frequency_value.max(1) as u32;
    let expected = match frequency {
        HabitFrequency::Daily => 30 * value,
        // floor(30/7) whole weeks fit in the window.
        HabitFrequency::Weekly => 4 * value,
        HabitFrequency::Monthly => value,
        HabitFrequency::Custom => 30 / value,
    };
    expected.max(1)
}

fn completions_in_window(habit_id: HabitId, completions: &[HabitCompletion], now: Date) -> u32 {
    completions
        .iter()
        .filter(|completion| completion.habit_id == habit_id)
        .filter(|completion| {
            let age = (now - completion.completed_at.date()).whole_days();
            (0..WINDOW_DAYS).contains(&age)
        })
        .count() as u32
}
