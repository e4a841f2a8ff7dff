// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use ontrack_app::{GoalStatus, HabitFrequency};
use ontrack_db::{
    NewGoal, NewHabit, NewMilestone, Store, UpdateGoal, UpdateHabit, UpdateMilestone,
    validate_db_path,
};
use time::{Date, Duration, Month};

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/ontrack.db").is_ok());
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.raw_connection().execute_batch(
        "
            ALTER TABLE goals RENAME TO goals_old;
            CREATE TABLE goals (
              id INTEGER PRIMARY KEY,
              profile_id INTEGER NOT NULL,
              title TEXT NOT NULL,
              description TEXT NOT NULL DEFAULT '',
              start_date TEXT,
              target_date TEXT,
              progress INTEGER NOT NULL DEFAULT 0,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            DROP TABLE goals_old;
            ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `goals` is missing required columns"));
    assert!(message.contains("status"));
    Ok(())
}

#[test]
fn sign_up_normalizes_email_and_round_trips() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let profile = store.sign_up("  Ada@Example.com ", "Ada Lovelace", "engine")?;
    assert_eq!(profile.email, "ada@example.com");
    assert_eq!(profile.full_name, "Ada Lovelace");

    let back = store.sign_in("ada@example.com", "engine")?;
    assert_eq!(back.id, profile.id);

    let wrong_password = store
        .sign_in("ada@example.com", "difference")
        .expect_err("wrong password should fail");
    assert!(
        wrong_password
            .to_string()
            .contains("email or password is incorrect")
    );

    let unknown = store
        .sign_in("grace@example.com", "engine")
        .expect_err("unknown email should fail");
    assert!(unknown.to_string().contains("no account found"));

    let duplicate = store
        .sign_up("ADA@example.com", "Ada Again", "engine")
        .expect_err("duplicate email should fail");
    assert!(duplicate.to_string().contains("already exists"));
    Ok(())
}

#[test]
fn list_goals_uses_deterministic_tiebreaker() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let first = store.create_goal(
        profile.id,
        &NewGoal {
            title: "A".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let second = store.create_goal(
        profile.id,
        &NewGoal {
            title: "B".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;

    store.raw_connection().execute(
        "UPDATE goals SET updated_at = ? WHERE id IN (?, ?)",
        rusqlite::params!["2026-06-15T12:00:00Z", first.get(), second.get()],
    )?;

    let goals = store.list_goals(profile.id)?;
    assert_eq!(goals.len(), 2);
    assert_eq!(goals[0].id, second);
    assert_eq!(goals[1].id, first);
    Ok(())
}

#[test]
fn goal_update_persists_fields() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Initial".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;

    store.update_goal(
        profile.id,
        goal_id,
        &UpdateGoal {
            title: "Updated".to_owned(),
            description: "Sharper scope".to_owned(),
            start_date: Some(Date::from_calendar_date(2026, Month::May, 1)?),
            target_date: Some(Date::from_calendar_date(2026, Month::December, 31)?),
            status: GoalStatus::Paused,
        },
    )?;

    let goal = store.get_goal(profile.id, goal_id)?;
    assert_eq!(goal.title, "Updated");
    assert_eq!(goal.description, "Sharper scope");
    assert_eq!(goal.status, GoalStatus::Paused);
    assert_eq!(
        goal.start_date,
        Some(Date::from_calendar_date(2026, Month::May, 1)?)
    );
    assert_eq!(
        goal.target_date,
        Some(Date::from_calendar_date(2026, Month::December, 31)?)
    );
    Ok(())
}

#[test]
fn goal_delete_cascades_to_children() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Run a Marathon".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Morning Run".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;
    let milestone_id = store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "First 5K".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;
    store.toggle_habit_completion(profile.id, habit_id, today, today, true)?;

    store.delete_goal(profile.id, goal_id)?;

    assert!(store.get_goal(profile.id, goal_id).is_err());
    assert!(store.get_habit(profile.id, habit_id).is_err());
    assert!(store.get_milestone(profile.id, milestone_id).is_err());
    assert!(store.list_completions(profile.id)?.is_empty());
    Ok(())
}

#[test]
fn toggle_twice_restores_original_state() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Habit".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;

    let first = store.toggle_habit_completion(profile.id, habit_id, today, today, true)?;
    assert!(first);
    let rows: i64 =
        store
            .raw_connection()
            .query_row("SELECT COUNT(*) FROM habit_completions", [], |row| {
                row.get(0)
            })?;
    assert_eq!(rows, 1);

    let second = store.toggle_habit_completion(profile.id, habit_id, today, today, true)?;
    assert!(!second);
    let rows: i64 =
        store
            .raw_connection()
            .query_row("SELECT COUNT(*) FROM habit_completions", [], |row| {
                row.get(0)
            })?;
    assert_eq!(rows, 0);
    Ok(())
}

#[test]
fn toggle_matches_rows_regardless_of_time_of_day() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Habit".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;

    // Hosted exports store full timestamps; the toggle must match on the date
    // portion alone.
    store.raw_connection().execute(
        "
        INSERT INTO habit_completions (profile_id, habit_id, completed_at, created_at)
        VALUES (?, ?, '2026-06-10T18:30:00Z', '2026-06-10T18:30:00Z')
        ",
        rusqlite::params![profile.id.get(), habit_id.get()],
    )?;

    let on = Date::from_calendar_date(2026, Month::June, 10)?;
    let completed = store.toggle_habit_completion(profile.id, habit_id, on, today, true)?;
    assert!(!completed, "toggle should remove the evening row");

    let rows: i64 =
        store
            .raw_connection()
            .query_row("SELECT COUNT(*) FROM habit_completions", [], |row| {
                row.get(0)
            })?;
    assert_eq!(rows, 0);
    Ok(())
}

#[test]
fn toggle_refreshes_stored_goal_progress() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Run a Marathon".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let done = store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "First 5K".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;
    store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "First 10K".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;
    store.set_milestone_completed(profile.id, done, true, today, true)?;

    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Morning Run".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;
    for offset in 0..30 {
        let on = today - Duration::days(offset);
        store.toggle_habit_completion(profile.id, habit_id, on, today, true)?;
    }

    // Half the milestones at weight 0.6 plus a fully met habit at weight 0.4.
    let goal = store.get_goal(profile.id, goal_id)?;
    assert_eq!(goal.progress, 70);
    Ok(())
}

#[test]
fn milestone_toggle_persists_goal_progress() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Write a Novel".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let outline = store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "Outline".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;
    store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "First draft".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;

    store.set_milestone_completed(profile.id, outline, true, today, true)?;
    let goal = store.get_goal(profile.id, goal_id)?;
    assert_eq!(goal.progress, 50, "milestones-only goals renormalize");

    store.set_milestone_completed(profile.id, outline, false, today, true)?;
    let goal = store.get_goal(profile.id, goal_id)?;
    assert_eq!(goal.progress, 0);
    Ok(())
}

#[test]
fn guest_toggle_skips_progress_persistence() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Habit".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;

    store.toggle_habit_completion(profile.id, habit_id, today, today, false)?;

    let goal = store.get_goal(profile.id, goal_id)?;
    assert_eq!(goal.progress, 0, "stored progress should be untouched");

    let recomputed = store.recompute_goal_progress(profile.id, goal_id, today)?;
    assert!(recomputed > 0);
    Ok(())
}

#[test]
fn malformed_due_date_reads_as_unset() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Habit".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: Some(Date::from_calendar_date(2026, Month::July, 1)?),
        },
    )?;

    store.raw_connection().execute(
        "UPDATE habits SET due_date = 'not-a-date' WHERE id = ?",
        rusqlite::params![habit_id.get()],
    )?;

    let habits = store.list_habits(profile.id)?;
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0].due_date, None);
    Ok(())
}

#[test]
fn habit_reorder_swaps_neighbors() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let mut habit_ids = Vec::new();
    for title in ["First", "Second", "Third"] {
        habit_ids.push(store.create_habit(
            profile.id,
            &NewHabit {
                goal_id,
                title: title.to_owned(),
                description: String::new(),
                frequency: HabitFrequency::Daily,
                frequency_value: 1,
                start_date: None,
                due_date: None,
            },
        )?);
    }

    let moved = store.move_habit(profile.id, habit_ids[2], true)?;
    assert!(moved);
    let habits = store.list_habits_for_goal(profile.id, goal_id)?;
    let titles: Vec<&str> = habits.iter().map(|habit| habit.title.as_str()).collect();
    assert_eq!(titles, ["First", "Third", "Second"]);
    let orders: Vec<i32> = habits.iter().map(|habit| habit.order_index).collect();
    assert_eq!(orders, [0, 1, 2]);

    let at_edge = store.move_habit(profile.id, habit_ids[0], true)?;
    assert!(!at_edge, "top habit cannot move further up");
    Ok(())
}

#[test]
fn habit_update_persists_fields() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let habit_id = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id,
            title: "Initial".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;

    store.update_habit(
        profile.id,
        habit_id,
        &UpdateHabit {
            title: "Strength Training".to_owned(),
            description: "Legs and core".to_owned(),
            frequency: HabitFrequency::Weekly,
            frequency_value: 3,
            start_date: Some(Date::from_calendar_date(2026, Month::May, 16)?),
            due_date: Some(Date::from_calendar_date(2026, Month::September, 13)?),
        },
    )?;

    let habit = store.get_habit(profile.id, habit_id)?;
    assert_eq!(habit.title, "Strength Training");
    assert_eq!(habit.frequency, HabitFrequency::Weekly);
    assert_eq!(habit.frequency_value, 3);
    assert_eq!(
        habit.start_date,
        Some(Date::from_calendar_date(2026, Month::May, 16)?)
    );
    assert_eq!(
        habit.due_date,
        Some(Date::from_calendar_date(2026, Month::September, 13)?)
    );
    Ok(())
}

#[test]
fn milestone_update_persists_fields() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;

    let goal_id = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let milestone_id = store.create_milestone(
        profile.id,
        &NewMilestone {
            goal_id,
            title: "Initial".to_owned(),
            description: String::new(),
            target_date: None,
        },
    )?;

    store.update_milestone(
        profile.id,
        milestone_id,
        &UpdateMilestone {
            title: "Half Marathon Ready".to_owned(),
            description: "Complete a 21K".to_owned(),
            target_date: Some(Date::from_calendar_date(2026, Month::July, 30)?),
        },
    )?;

    let milestone = store.get_milestone(profile.id, milestone_id)?;
    assert_eq!(milestone.title, "Half Marathon Ready");
    assert_eq!(milestone.description, "Complete a 21K");
    assert_eq!(
        milestone.target_date,
        Some(Date::from_calendar_date(2026, Month::July, 30)?)
    );
    assert!(!milestone.completed);
    Ok(())
}

#[test]
fn create_habit_requires_owned_goal() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let ada = store.sign_up("ada@example.com", "Ada", "pw")?;
    let grace = store.sign_up("grace@example.com", "Grace", "pw")?;

    let goal_id = store.create_goal(
        grace.id,
        &NewGoal {
            title: "Private goal".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;

    let err = store
        .create_habit(
            ada.id,
            &NewHabit {
                goal_id,
                title: "Habit".to_owned(),
                description: String::new(),
                frequency: HabitFrequency::Daily,
                frequency_value: 1,
                start_date: None,
                due_date: None,
            },
        )
        .expect_err("habit must not attach to another profile's goal");
    assert!(format!("{err:#}").contains("attach habit to goal"));

    assert!(store.get_goal(ada.id, goal_id).is_err());
    assert!(store.get_goal(grace.id, goal_id).is_ok());
    Ok(())
}

#[test]
fn dashboard_stats_counts_today_completions() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let profile = store.sign_up("ada@example.com", "Ada", "pw")?;
    let today = Date::from_calendar_date(2026, Month::June, 15)?;

    let active = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Active".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    let finished = store.create_goal(
        profile.id,
        &NewGoal {
            title: "Finished".to_owned(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        },
    )?;
    store.set_goal_status(profile.id, finished, GoalStatus::Completed)?;

    let tracked = store.create_habit(
        profile.id,
        &NewHabit {
            goal_id: active,
            title: "Tracked".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;
    store.create_habit(
        profile.id,
        &NewHabit {
            goal_id: active,
            title: "Untouched".to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        },
    )?;

    store.toggle_habit_completion(profile.id, tracked, today, today, true)?;
    // Yesterday's completion must not count toward today's rate.
    store.toggle_habit_completion(profile.id, tracked, today - Duration::days(1), today, true)?;

    let stats = store.dashboard_stats(profile.id, today)?;
    assert_eq!(stats.active_goals, 1);
    assert_eq!(stats.completed_goals, 1);
    assert_eq!(stats.total_habits, 2);
    assert_eq!(stats.completion_rate, 50);
    Ok(())
}

#[test]
fn seed_demo_data_builds_guest_dataset() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let now = Date::from_calendar_date(2026, Month::June, 15)?
        .midnight()
        .assume_utc();

    let profile = store.seed_demo_data(now)?;
    assert_eq!(profile.email, "demo@ontrack.local");

    let goals = store.list_goals(profile.id)?;
    let titles: Vec<&str> = goals.iter().map(|goal| goal.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Write a Novel",
            "Learn Spanish",
            "Run a Marathon",
            "Build a Mobile App",
        ]
    );

    let habits = store.list_habits(profile.id)?;
    assert_eq!(habits.len(), 5);
    let morning_run = habits
        .iter()
        .find(|habit| habit.title == "Morning Run")
        .expect("demo dataset should include Morning Run");
    let completions = store.list_completions_for_habit(profile.id, morning_run.id)?;
    assert_eq!(completions.len(), 24);

    let stats = store.dashboard_stats(profile.id, now.date())?;
    assert_eq!(stats.active_goals, 3);
    assert_eq!(stats.completed_goals, 1);
    assert_eq!(stats.total_habits, 5);
    assert_eq!(stats.completion_rate, 80);
    Ok(())
}

#[test]
fn open_creates_database_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("ontrack.db");

    let store = Store::open(&db_path)?;
    store.bootstrap()?;
    assert!(db_path.exists());
    Ok(())
}

#[test]
fn reopen_existing_database_validates_schema() -> Result<()> {
    let (_dir, db_path) = ontrack_testkit::temp_db_path()?;

    {
        let store = Store::open(&db_path)?;
        store.bootstrap()?;
        store.sign_up("ada@example.com", "Ada", "engine")?;
    }

    let store = Store::open(&db_path)?;
    store.bootstrap()?;
    let profile = store.sign_in("ada@example.com", "engine")?;
    assert_eq!(profile.email, "ada@example.com");
    Ok(())
}
