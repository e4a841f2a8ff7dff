// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Month-grid assembly and per-date habit bucketing for the calendar tab.

use time::{Date, Month};

use crate::{Habit, HabitCompletion, HabitId, WeekStart};

// Calendar navigation stays inside the range `time` can represent.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9998;

/// A month laid out as whole weeks. Cells before the first and after the
/// last day of the month are `None`.
pub fn month_grid(year: i32, month: Month, week_start: WeekStart) -> Vec<[Option<Date>; 7]> {
    let year = year.clamp(MIN_YEAR, MAX_YEAR);
    let first = Date::from_calendar_date(year, month, 1).expect("derived date is valid");
    let lead = match week_start {
        WeekStart::Sunday => first.weekday().number_days_from_sunday(),
        WeekStart::Monday => first.weekday().number_days_from_monday(),
    } as usize;

    let mut cells: Vec<Option<Date>> = vec![None; lead];
    for day in 1..=time::util::days_in_year_month(year, month) {
        cells.push(Some(
            Date::from_calendar_date(year, month, day).expect("derived date is valid"),
        ));
    }
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    cells
        .chunks(7)
        .map(|chunk| {
            let mut week = [None; 7];
            week.copy_from_slice(chunk);
            week
        })
        .collect()
}

pub const fn weekday_labels(week_start: WeekStart) -> [&'static str; 7] {
    match week_start {
        WeekStart::Sunday => ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"],
        WeekStart::Monday => ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
    }
}

/// Month arithmetic for calendar navigation, clamped to representable years.
pub fn shift_month(year: i32, month: Month, delta: i32) -> (i32, Month) {
    let index = year * 12 + (month as u8 as i32 - 1) + delta;
    let index = index.clamp(MIN_YEAR * 12, MAX_YEAR * 12 + 11);
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8).expect("derived month is valid");
    (index.div_euclid(12), month)
}

/// Habits whose due date falls on `date`. Habits without a due date never
/// appear in the calendar.
pub fn habits_due_on(habits: &[Habit], date: Date) -> Vec<&Habit> {
    habits
        .iter()
        .filter(|habit| habit.due_date == Some(date))
        .collect()
}

/// Whether a completion row exists for (habit, calendar date).
pub fn completed_on(completions: &[HabitCompletion], habit_id: HabitId, date: Date) -> bool {
    completions
        .iter()
        .any(|completion| completion.habit_id == habit_id && completion.completed_at.date() == date)
}

#[cfg(test)]
mod tests {
    use super::{completed_on, habits_due_on, month_grid, shift_month, weekday_labels};
    use crate::{
        CompletionId, GoalId, Habit, HabitCompletion, HabitFrequency, HabitId, ProfileId,
        WeekStart,
    };
    use time::{Date, Month};

    fn day(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).expect("valid date")
    }

    fn habit_due(id: i64, due: Option<Date>) -> Habit {
        let created = day(2026, Month::January, 1)
            .with_hms(9, 0, 0)
            .expect("valid time")
            .assume_utc();
        Habit {
            id: HabitId::new(id),
            profile_id: ProfileId::new(1),
            goal_id: GoalId::new(1),
            title: format!("habit {id}"),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: due,
            order_index: 0,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn february_2026_fills_exact_weeks_from_sunday() {
        let grid = month_grid(2026, Month::February, WeekStart::Sunday);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0][0], Some(day(2026, Month::February, 1)));
        assert_eq!(grid[3][6], Some(day(2026, Month::February, 28)));
    }

    #[test]
    fn monday_start_shifts_leading_blanks() {
        let grid = month_grid(2026, Month::February, WeekStart::Monday);
        assert_eq!(grid.len(), 5);
        // Feb 1 2026 is a Sunday, the last cell of a Monday-start week.
        assert_eq!(grid[0][..6], [None; 6]);
        assert_eq!(grid[0][6], Some(day(2026, Month::February, 1)));
    }

    #[test]
    fn trailing_cells_pad_partial_weeks() {
        let grid = month_grid(2026, Month::March, WeekStart::Sunday);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[4][2], Some(day(2026, Month::March, 31)));
        assert_eq!(grid[4][3..], [None; 4]);
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(
            shift_month(2026, Month::January, -1),
            (2025, Month::December)
        );
        assert_eq!(
            shift_month(2026, Month::November, 2),
            (2027, Month::January)
        );
        assert_eq!(shift_month(2026, Month::June, 0), (2026, Month::June));
    }

    #[test]
    fn weekday_labels_match_week_start() {
        assert_eq!(weekday_labels(WeekStart::Sunday)[0], "Su");
        assert_eq!(weekday_labels(WeekStart::Monday)[0], "Mo");
        assert_eq!(weekday_labels(WeekStart::Monday)[6], "Su");
    }

    #[test]
    fn habits_bucket_by_due_date_only() {
        let target = day(2026, Month::February, 19);
        let habits = vec![
            habit_due(1, Some(target)),
            habit_due(2, Some(day(2026, Month::February, 20))),
            habit_due(3, None),
        ];
        let due = habits_due_on(&habits, target);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, HabitId::new(1));
    }

    #[test]
    fn completion_match_ignores_time_of_day() {
        let target = day(2026, Month::February, 19);
        let late = target.with_hms(23, 59, 59).expect("valid time").assume_utc();
        let completions = vec![HabitCompletion {
            id: CompletionId::new(1),
            profile_id: ProfileId::new(1),
            habit_id: HabitId::new(7),
            completed_at: late,
            created_at: late,
        }];
        assert!(completed_on(&completions, HabitId::new(7), target));
        assert!(!completed_on(
            &completions,
            HabitId::new(7),
            day(2026, Month::February, 20)
        ));
        assert!(!completed_on(&completions, HabitId::new(8), target));
    }
}
