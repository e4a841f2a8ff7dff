// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use ontrack_app::{
    AppSetting, CompletionId, DashboardStats, Goal, GoalId, GoalStatus, Habit, HabitCompletion,
    HabitFrequency, HabitId, Milestone, MilestoneId, Profile, ProfileId, SettingKey, SettingValue,
    WeekStart, progress,
};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Weekday};

pub mod validation;

pub const APP_NAME: &str = "ontrack";

const DEMO_EMAIL: &str = "demo@ontrack.local";
const DEMO_FULL_NAME: &str = "Demo User";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "profiles",
        &[
            "id",
            "email",
            "full_name",
            "credential_sha256",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "goals",
        &[
            "id",
            "profile_id",
            "title",
            "description",
            "start_date",
            "target_date",
            "status",
            "progress",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "habits",
        &[
            "id",
            "profile_id",
            "goal_id",
            "title",
            "description",
            "frequency",
            "frequency_value",
            "start_date",
            "due_date",
            "order_index",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "milestones",
        &[
            "id",
            "profile_id",
            "goal_id",
            "title",
            "description",
            "target_date",
            "completed",
            "order_index",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "habit_completions",
        &["id", "profile_id", "habit_id", "completed_at", "created_at"],
    ),
    ("settings", &["key", "value", "updated_at"]),
];

struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_profiles_email",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_email ON profiles (email);",
    },
    RequiredIndex {
        name: "idx_goals_profile_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_goals_profile_id ON goals (profile_id);",
    },
    RequiredIndex {
        name: "idx_habits_profile_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_habits_profile_id ON habits (profile_id);",
    },
    RequiredIndex {
        name: "idx_habits_goal_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_habits_goal_id ON habits (goal_id);",
    },
    RequiredIndex {
        name: "idx_milestones_profile_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_milestones_profile_id ON milestones (profile_id);",
    },
    RequiredIndex {
        name: "idx_milestones_goal_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_milestones_goal_id ON milestones (goal_id);",
    },
    RequiredIndex {
        name: "idx_habit_completions_profile_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_habit_completions_profile_id ON habit_completions (profile_id);",
    },
    RequiredIndex {
        name: "idx_habit_completions_habit_date",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_habit_completions_habit_date ON habit_completions (habit_id, completed_at);",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoal {
    pub title: String,
    pub description: String,
    pub start_date: Option<Date>,
    pub target_date: Option<Date>,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateGoal {
    pub title: String,
    pub description: String,
    pub start_date: Option<Date>,
    pub target_date: Option<Date>,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHabit {
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub frequency: HabitFrequency,
    pub frequency_value: i32,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateHabit {
    pub title: String,
    pub description: String,
    pub frequency: HabitFrequency,
    pub frequency_value: i32,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMilestone {
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub target_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMilestone {
    pub title: String,
    pub description: String,
    pub target_date: Option<Date>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn sign_up(&self, email: &str, full_name: &str, password: &str) -> Result<Profile> {
        let normalized = email.trim().to_ascii_lowercase();
        if self.find_profile_id(&normalized)?.is_some() {
            bail!("an account for {normalized} already exists -- sign in instead");
        }

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO profiles (email, full_name, credential_sha256, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    normalized,
                    full_name.trim(),
                    credential_sha256(&normalized, password),
                    now,
                    now,
                ],
            )
            .context("insert profile")?;

        self.get_profile(ProfileId::new(self.conn.last_insert_rowid()))
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let normalized = email.trim().to_ascii_lowercase();
        let row = self
            .conn
            .query_row(
                "SELECT id, credential_sha256 FROM profiles WHERE email = ?",
                params![normalized],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .with_context(|| format!("look up account {normalized}"))?;

        let Some((profile_id, stored_digest)) = row else {
            bail!("no account found for {normalized} -- choose Sign up to create one");
        };
        if stored_digest != credential_sha256(&normalized, password) {
            bail!("email or password is incorrect -- check the password and retry");
        }

        self.get_profile(ProfileId::new(profile_id))
    }

    pub fn get_profile(&self, profile_id: ProfileId) -> Result<Profile> {
        self.conn
            .query_row(
                "
                SELECT id, email, full_name, created_at, updated_at
                FROM profiles
                WHERE id = ?
                ",
                params![profile_id.get()],
                |row| {
                    let created_at_raw: String = row.get(3)?;
                    let updated_at_raw: String = row.get(4)?;
                    Ok(Profile {
                        id: ProfileId::new(row.get(0)?),
                        email: row.get(1)?,
                        full_name: row.get(2)?,
                        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
                        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
                    })
                },
            )
            .with_context(|| format!("load profile {}", profile_id.get()))
    }

    fn find_profile_id(&self, email: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT id FROM profiles WHERE email = ?",
                params![email],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .with_context(|| format!("look up account {email}"))
    }

    pub fn create_goal(&self, profile_id: ProfileId, new_goal: &NewGoal) -> Result<GoalId> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO goals (
                  profile_id, title, description, start_date, target_date,
                  status, progress, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
                ",
                params![
                    profile_id.get(),
                    new_goal.title,
                    new_goal.description,
                    new_goal.start_date.map(format_date),
                    new_goal.target_date.map(format_date),
                    new_goal.status.as_str(),
                    now,
                    now,
                ],
            )
            .context("insert goal")?;

        Ok(GoalId::new(self.conn.last_insert_rowid()))
    }

    pub fn update_goal(
        &self,
        profile_id: ProfileId,
        goal_id: GoalId,
        update: &UpdateGoal,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE goals
                SET
                  title = ?,
                  description = ?,
                  start_date = ?,
                  target_date = ?,
                  status = ?,
                  updated_at = ?
                WHERE id = ? AND profile_id = ?
                ",
                params![
                    update.title,
                    update.description,
                    update.start_date.map(format_date),
                    update.target_date.map(format_date),
                    update.status.as_str(),
                    now,
                    goal_id.get(),
                    profile_id.get(),
                ],
            )
            .context("update goal")?;
        if rows_affected == 0 {
            bail!(
                "goal {} not found -- refresh the goals list and retry",
                goal_id.get()
            );
        }
        Ok(())
    }

    pub fn set_goal_status(
        &self,
        profile_id: ProfileId,
        goal_id: GoalId,
        status: GoalStatus,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE goals SET status = ?, updated_at = ? WHERE id = ? AND profile_id = ?",
                params![status.as_str(), now, goal_id.get(), profile_id.get()],
            )
            .context("update goal status")?;
        if rows_affected == 0 {
            bail!(
                "goal {} not found -- refresh the goals list and retry",
                goal_id.get()
            );
        }
        Ok(())
    }

    pub fn get_goal(&self, profile_id: ProfileId, goal_id: GoalId) -> Result<Goal> {
        fetch_goal(&self.conn, profile_id, goal_id)
    }

    pub fn list_goals(&self, profile_id: ProfileId) -> Result<Vec<Goal>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, profile_id, title, description, start_date,
                  target_date, status, progress, created_at, updated_at
                FROM goals
                WHERE profile_id = ?
                ORDER BY updated_at DESC, id DESC
                ",
            )
            .context("prepare goals query")?;
        let rows = stmt
            .query_map(params![profile_id.get()], map_goal_row)
            .context("query goals")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect goals")
    }

    /// Removes the goal together with its habits, milestones, and completion
    /// history in one transaction.
    pub fn delete_goal(&self, profile_id: ProfileId, goal_id: GoalId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin goal delete")?;
        tx.execute(
            "
            DELETE FROM habit_completions
            WHERE profile_id = ?
              AND habit_id IN (SELECT id FROM habits WHERE goal_id = ?)
            ",
            params![profile_id.get(), goal_id.get()],
        )
        .context("delete goal completions")?;
        tx.execute(
            "DELETE FROM milestones WHERE profile_id = ? AND goal_id = ?",
            params![profile_id.get(), goal_id.get()],
        )
        .context("delete goal milestones")?;
        tx.execute(
            "DELETE FROM habits WHERE profile_id = ? AND goal_id = ?",
            params![profile_id.get(), goal_id.get()],
        )
        .context("delete goal habits")?;
        let rows_affected = tx
            .execute(
                "DELETE FROM goals WHERE id = ? AND profile_id = ?",
                params![goal_id.get(), profile_id.get()],
            )
            .context("delete goal")?;
        if rows_affected == 0 {
            bail!(
                "goal {} not found -- refresh the goals list and retry",
                goal_id.get()
            );
        }
        tx.commit().context("commit goal delete")
    }

    pub fn recompute_goal_progress(
        &self,
        profile_id: ProfileId,
        goal_id: GoalId,
        today: Date,
    ) -> Result<u8> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin progress refresh")?;
        let progress = refresh_goal_progress(&tx, profile_id, goal_id, today)?;
        tx.commit().context("commit progress refresh")?;
        Ok(progress)
    }

    pub fn create_habit(&self, profile_id: ProfileId, new_habit: &NewHabit) -> Result<HabitId> {
        fetch_goal(&self.conn, profile_id, new_habit.goal_id)
            .with_context(|| format!("attach habit to goal {}", new_habit.goal_id.get()))?;

        let next_order: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(order_index) + 1, 0) FROM habits WHERE goal_id = ?",
                params![new_habit.goal_id.get()],
                |row| row.get(0),
            )
            .context("compute habit order")?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO habits (
                  profile_id, goal_id, title, description, frequency,
                  frequency_value, start_date, due_date, order_index,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    profile_id.get(),
                    new_habit.goal_id.get(),
                    new_habit.title,
                    new_habit.description,
                    new_habit.frequency.as_str(),
                    new_habit.frequency_value,
                    new_habit.start_date.map(format_date),
                    new_habit.due_date.map(format_date),
                    next_order,
                    now,
                    now,
                ],
            )
            .context("insert habit")?;

        Ok(HabitId::new(self.conn.last_insert_rowid()))
    }

    pub fn update_habit(
        &self,
        profile_id: ProfileId,
        habit_id: HabitId,
        update: &UpdateHabit,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE habits
                SET
                  title = ?,
                  description = ?,
                  frequency = ?,
                  frequency_value = ?,
                  start_date = ?,
                  due_date = ?,
                  updated_at = ?
                WHERE id = ? AND profile_id = ?
                ",
                params![
                    update.title,
                    update.description,
                    update.frequency.as_str(),
                    update.frequency_value,
                    update.start_date.map(format_date),
                    update.due_date.map(format_date),
                    now,
                    habit_id.get(),
                    profile_id.get(),
                ],
            )
            .context("update habit")?;
        if rows_affected == 0 {
            bail!(
                "habit {} not found -- refresh the habits list and retry",
                habit_id.get()
            );
        }
        Ok(())
    }

    pub fn get_habit(&self, profile_id: ProfileId, habit_id: HabitId) -> Result<Habit> {
        fetch_habit(&self.conn, profile_id, habit_id)
    }

    pub fn list_habits(&self, profile_id: ProfileId) -> Result<Vec<Habit>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, profile_id, goal_id, title, description, frequency,
                  frequency_value, start_date, due_date, order_index,
                  created_at, updated_at
                FROM habits
                WHERE profile_id = ?
                ORDER BY order_index ASC, id ASC
                ",
            )
            .context("prepare habits query")?;
        let rows = stmt
            .query_map(params![profile_id.get()], map_habit_row)
            .context("query habits")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect habits")
    }

    pub fn list_habits_for_goal(
        &self,
        profile_id: ProfileId,
        goal_id: GoalId,
    ) -> Result<Vec<Habit>> {
        goal_habits(&self.conn, profile_id, goal_id)
    }

    /// Swaps the habit with its neighbor in the goal's display order. Returns
    /// false when the habit is already at the edge.
    pub fn move_habit(&self, profile_id: ProfileId, habit_id: HabitId, up: bool) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin habit reorder")?;
        let habit = fetch_habit(&tx, profile_id, habit_id)?;
        let mut habits = goal_habits(&tx, profile_id, habit.goal_id)?;
        let Some(position) = habits.iter().position(|entry| entry.id == habit_id) else {
            bail!(
                "habit {} not found -- refresh the habits list and retry",
                habit_id.get()
            );
        };

        let target = if up {
            position.checked_sub(1)
        } else {
            (position + 1 < habits.len()).then_some(position + 1)
        };
        let Some(target) = target else {
            return Ok(false);
        };

        habits.swap(position, target);
        let now = now_rfc3339()?;
        for (index, entry) in habits.iter().enumerate() {
            let order = i64::try_from(index).unwrap_or(0);
            tx.execute(
                "UPDATE habits SET order_index = ?, updated_at = ? WHERE id = ?",
                params![order, now, entry.id.get()],
            )
            .context("renumber habits")?;
        }

        tx.commit().context("commit habit reorder")?;
        Ok(true)
    }

    pub fn delete_habit(&self, profile_id: ProfileId, habit_id: HabitId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin habit delete")?;
        tx.execute(
            "DELETE FROM habit_completions WHERE profile_id = ? AND habit_id = ?",
            params![profile_id.get(), habit_id.get()],
        )
        .context("delete habit completions")?;
        let rows_affected = tx
            .execute(
                "DELETE FROM habits WHERE id = ? AND profile_id = ?",
                params![habit_id.get(), profile_id.get()],
            )
            .context("delete habit")?;
        if rows_affected == 0 {
            bail!(
                "habit {} not found -- refresh the habits list and retry",
                habit_id.get()
            );
        }
        tx.commit().context("commit habit delete")
    }

    pub fn create_milestone(
        &self,
        profile_id: ProfileId,
        new_milestone: &NewMilestone,
    ) -> Result<MilestoneId> {
        fetch_goal(&self.conn, profile_id, new_milestone.goal_id)
            .with_context(|| format!("attach milestone to goal {}", new_milestone.goal_id.get()))?;

        let next_order: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(order_index) + 1, 0) FROM milestones WHERE goal_id = ?",
                params![new_milestone.goal_id.get()],
                |row| row.get(0),
            )
            .context("compute milestone order")?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO milestones (
                  profile_id, goal_id, title, description, target_date,
                  completed, order_index, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
                ",
                params![
                    profile_id.get(),
                    new_milestone.goal_id.get(),
                    new_milestone.title,
                    new_milestone.description,
                    new_milestone.target_date.map(format_date),
                    next_order,
                    now,
                    now,
                ],
            )
            .context("insert milestone")?;

        Ok(MilestoneId::new(self.conn.last_insert_rowid()))
    }

    pub fn update_milestone(
        &self,
        profile_id: ProfileId,
        milestone_id: MilestoneId,
        update: &UpdateMilestone,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE milestones
                SET title = ?, description = ?, target_date = ?, updated_at = ?
                WHERE id = ? AND profile_id = ?
                ",
                params![
                    update.title,
                    update.description,
                    update.target_date.map(format_date),
                    now,
                    milestone_id.get(),
                    profile_id.get(),
                ],
            )
            .context("update milestone")?;
        if rows_affected == 0 {
            bail!(
                "milestone {} not found -- refresh the goal and retry",
                milestone_id.get()
            );
        }
        Ok(())
    }

    pub fn get_milestone(
        &self,
        profile_id: ProfileId,
        milestone_id: MilestoneId,
    ) -> Result<Milestone> {
        fetch_milestone(&self.conn, profile_id, milestone_id)
    }

    pub fn list_milestones_for_goal(
        &self,
        profile_id: ProfileId,
        goal_id: GoalId,
    ) -> Result<Vec<Milestone>> {
        goal_milestones(&self.conn, profile_id, goal_id)
    }

    /// Flips the milestone's completed flag. When `persist_progress` is set
    /// the owning goal's stored progress is refreshed in the same transaction.
    pub fn set_milestone_completed(
        &self,
        profile_id: ProfileId,
        milestone_id: MilestoneId,
        completed: bool,
        today: Date,
        persist_progress: bool,
    ) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin milestone toggle")?;
        let milestone = fetch_milestone(&tx, profile_id, milestone_id)?;
        let now = now_rfc3339()?;
        tx.execute(
            "UPDATE milestones SET completed = ?, updated_at = ? WHERE id = ? AND profile_id = ?",
            params![
                i64::from(completed),
                now,
                milestone_id.get(),
                profile_id.get(),
            ],
        )
        .context("update milestone completion")?;

        if persist_progress {
            refresh_goal_progress(&tx, profile_id, milestone.goal_id, today)?;
        }

        tx.commit().context("commit milestone toggle")
    }

    pub fn delete_milestone(&self, profile_id: ProfileId, milestone_id: MilestoneId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM milestones WHERE id = ? AND profile_id = ?",
                params![milestone_id.get(), profile_id.get()],
            )
            .context("delete milestone")?;
        if rows_affected == 0 {
            bail!(
                "milestone {} not found -- refresh the goal and retry",
                milestone_id.get()
            );
        }
        Ok(())
    }

    /// Toggles the habit's completion mark for a calendar day. Completion rows
    /// match on the date portion only, so a second toggle always restores the
    /// previous state. Returns true when the day ends up marked complete.
    pub fn toggle_habit_completion(
        &self,
        profile_id: ProfileId,
        habit_id: HabitId,
        on: Date,
        today: Date,
        persist_progress: bool,
    ) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin completion toggle")?;
        let habit = fetch_habit(&tx, profile_id, habit_id)?;
        let day_key = format_date(on);

        let existing: i64 = tx
            .query_row(
                "
                SELECT COUNT(*)
                FROM habit_completions
                WHERE profile_id = ? AND habit_id = ? AND substr(completed_at, 1, 10) = ?
                ",
                params![profile_id.get(), habit_id.get(), day_key],
                |row| row.get(0),
            )
            .context("count completions for day")?;

        let completed_now = if existing > 0 {
            tx.execute(
                "
                DELETE FROM habit_completions
                WHERE profile_id = ? AND habit_id = ? AND substr(completed_at, 1, 10) = ?
                ",
                params![profile_id.get(), habit_id.get(), day_key],
            )
            .context("remove completion")?;
            false
        } else {
            let now = now_rfc3339()?;
            tx.execute(
                "
                INSERT INTO habit_completions (profile_id, habit_id, completed_at, created_at)
                VALUES (?, ?, ?, ?)
                ",
                params![
                    profile_id.get(),
                    habit_id.get(),
                    format!("{day_key}T00:00:00Z"),
                    now,
                ],
            )
            .context("insert completion")?;
            true
        };

        if persist_progress {
            refresh_goal_progress(&tx, profile_id, habit.goal_id, today)?;
        }

        tx.commit().context("commit completion toggle")?;
        Ok(completed_now)
    }

    pub fn list_completions(&self, profile_id: ProfileId) -> Result<Vec<HabitCompletion>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, profile_id, habit_id, completed_at, created_at
                FROM habit_completions
                WHERE profile_id = ?
                ORDER BY completed_at ASC, id ASC
                ",
            )
            .context("prepare completions query")?;
        let rows = stmt
            .query_map(params![profile_id.get()], map_completion_row)
            .context("query completions")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect completions")
    }

    pub fn list_completions_for_habit(
        &self,
        profile_id: ProfileId,
        habit_id: HabitId,
    ) -> Result<Vec<HabitCompletion>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, profile_id, habit_id, completed_at, created_at
                FROM habit_completions
                WHERE profile_id = ? AND habit_id = ?
                ORDER BY completed_at ASC, id ASC
                ",
            )
            .context("prepare habit completions query")?;
        let rows = stmt
            .query_map(
                params![profile_id.get(), habit_id.get()],
                map_completion_row,
            )
            .context("query habit completions")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect habit completions")
    }

    pub fn dashboard_stats(&self, profile_id: ProfileId, today: Date) -> Result<DashboardStats> {
        let active_goals: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM goals WHERE profile_id = ? AND status = 'active'",
                params![profile_id.get()],
                |row| row.get(0),
            )
            .context("count active goals")?;

        let completed_goals: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM goals WHERE profile_id = ? AND status = 'completed'",
                params![profile_id.get()],
                |row| row.get(0),
            )
            .context("count completed goals")?;

        let total_habits: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM habits WHERE profile_id = ?",
                params![profile_id.get()],
                |row| row.get(0),
            )
            .context("count habits")?;

        let completed_today: i64 = self
            .conn
            .query_row(
                "
                SELECT COUNT(DISTINCT habit_id)
                FROM habit_completions
                WHERE profile_id = ? AND substr(completed_at, 1, 10) = ?
                ",
                params![profile_id.get(), format_date(today)],
                |row| row.get(0),
            )
            .context("count habits completed today")?;

        let completion_rate = if total_habits > 0 {
            ((completed_today as f64 / total_habits as f64) * 100.0)
                .round()
                .clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Ok(DashboardStats {
            active_goals: usize::try_from(active_goals).unwrap_or(0),
            completed_goals: usize::try_from(completed_goals).unwrap_or(0),
            total_habits: usize::try_from(total_habits).unwrap_or(0),
            completion_rate,
        })
    }

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting {key}"))
    }

    fn put_setting_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert setting {key}"))?;
        Ok(())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        let raw = self.get_setting_raw(key.as_str())?;
        raw.map(|value| {
            SettingValue::parse_for_key(key, &value).ok_or_else(|| {
                anyhow!(
                    "setting `{}` has invalid value `{}`; run `ontrack --check`, then set a valid value in Settings",
                    key.as_str(),
                    value
                )
            })
        })
        .transpose()
    }

    pub fn put_setting(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        let raw = value.to_storage(key).ok_or_else(|| {
            anyhow!(
                "setting `{}` expected {:?} value; reopen Settings and choose a valid option",
                key.as_str(),
                key.expected_value_kind()
            )
        })?;
        self.put_setting_raw(key.as_str(), &raw)
    }

    pub fn list_settings(&self) -> Result<Vec<AppSetting>> {
        let mut settings = Vec::with_capacity(SettingKey::ALL.len());
        for key in SettingKey::ALL {
            let value = self
                .get_setting(key)?
                .unwrap_or_else(|| default_setting_value(key));
            settings.push(AppSetting { key, value });
        }
        Ok(settings)
    }

    pub fn get_show_dashboard(&self) -> Result<bool> {
        match self.get_setting(SettingKey::UiShowDashboard)? {
            Some(SettingValue::Bool(value)) => Ok(value),
            Some(_) => bail!(
                "setting `{}` must be on/off; open Settings and toggle it",
                SettingKey::UiShowDashboard.as_str()
            ),
            None => Ok(true),
        }
    }

    pub fn put_show_dashboard(&self, show: bool) -> Result<()> {
        self.put_setting(SettingKey::UiShowDashboard, SettingValue::Bool(show))
    }

    pub fn get_week_start(&self) -> Result<WeekStart> {
        match self.get_setting(SettingKey::UiWeekStart)? {
            Some(SettingValue::Week(value)) => Ok(value),
            Some(_) => bail!(
                "setting `{}` must be sunday or monday; open Settings and choose a week start",
                SettingKey::UiWeekStart.as_str()
            ),
            None => Ok(WeekStart::Sunday),
        }
    }

    pub fn put_week_start(&self, week_start: WeekStart) -> Result<()> {
        self.put_setting(SettingKey::UiWeekStart, SettingValue::Week(week_start))
    }

    pub fn get_ai_model(&self) -> Result<Option<String>> {
        match self.get_setting(SettingKey::AiModel)? {
            Some(SettingValue::Text(value)) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_owned()))
                }
            }
            Some(_) => bail!(
                "setting `{}` must be text; open Settings and choose a model name",
                SettingKey::AiModel.as_str()
            ),
            None => Ok(None),
        }
    }

    pub fn put_ai_model(&self, model: &str) -> Result<()> {
        self.put_setting(SettingKey::AiModel, SettingValue::Text(model.to_owned()))
    }

    /// Populates a fresh database with the guest walkthrough dataset and
    /// returns its profile. Timestamps are anchored to `now` so streaks and
    /// progress read naturally on any day.
    pub fn seed_demo_data(&self, now: OffsetDateTime) -> Result<Profile> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin demo seed")?;
        let profile = self.sign_up(DEMO_EMAIL, DEMO_FULL_NAME, "demo")?;
        let today = now.date();

        let goal_specs: [(&str, &str, i64, i64, GoalStatus, i64, i64, i64); 4] = [
            (
                "Run a Marathon",
                "Complete my first 26.2-mile marathon race by the end of the year",
                -30,
                90,
                GoalStatus::Active,
                65,
                -30,
                0,
            ),
            (
                "Learn Spanish",
                "Achieve conversational fluency in Spanish for my upcoming trip to Spain",
                -45,
                120,
                GoalStatus::Active,
                40,
                -45,
                0,
            ),
            (
                "Write a Novel",
                "Complete the first draft of my science fiction novel",
                -60,
                180,
                GoalStatus::Active,
                25,
                -60,
                0,
            ),
            (
                "Build a Mobile App",
                "Develop and launch my first mobile application on the App Store",
                -15,
                150,
                GoalStatus::Completed,
                100,
                -90,
                -5,
            ),
        ];

        let mut goal_ids = Vec::with_capacity(goal_specs.len());
        for (title, description, start, target, status, progress, created, updated) in goal_specs {
            tx.execute(
                "
                INSERT INTO goals (
                  profile_id, title, description, start_date, target_date,
                  status, progress, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    profile.id.get(),
                    title,
                    description,
                    format_date(offset_date(today, start)),
                    format_date(offset_date(today, target)),
                    status.as_str(),
                    progress,
                    rfc3339_offset(now, created)?,
                    rfc3339_offset(now, updated)?,
                ],
            )
            .with_context(|| format!("insert demo goal {title}"))?;
            goal_ids.push(self.conn.last_insert_rowid());
        }

        let habit_specs: [(usize, &str, &str, HabitFrequency, i32, i64, i64); 5] = [
            (
                0,
                "Morning Run",
                "Run 5K every morning to build endurance",
                HabitFrequency::Daily,
                1,
                -30,
                0,
            ),
            (
                0,
                "Strength Training",
                "Focus on leg strength and core stability",
                HabitFrequency::Weekly,
                3,
                -30,
                1,
            ),
            (
                1,
                "Daily Spanish Practice",
                "Practice Spanish vocabulary and grammar for 30 minutes",
                HabitFrequency::Daily,
                1,
                -45,
                0,
            ),
            (
                1,
                "Spanish Conversation",
                "Practice speaking with native speakers online",
                HabitFrequency::Weekly,
                2,
                -45,
                1,
            ),
            (
                2,
                "Daily Writing",
                "Write at least 500 words every day",
                HabitFrequency::Daily,
                1,
                -60,
                0,
            ),
        ];

        let mut habit_ids = Vec::with_capacity(habit_specs.len());
        for (goal_index, title, description, frequency, value, started, order) in habit_specs {
            tx.execute(
                "
                INSERT INTO habits (
                  profile_id, goal_id, title, description, frequency,
                  frequency_value, start_date, due_date, order_index,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
                ",
                params![
                    profile.id.get(),
                    goal_ids[goal_index],
                    title,
                    description,
                    frequency.as_str(),
                    value,
                    format_date(offset_date(today, started)),
                    order,
                    rfc3339_offset(now, started)?,
                    rfc3339_offset(now, 0)?,
                ],
            )
            .with_context(|| format!("insert demo habit {title}"))?;
            habit_ids.push(self.conn.last_insert_rowid());
        }

        let milestone_specs: [(usize, &str, &str, i64, bool, i64, i64, i64); 7] = [
            (
                0,
                "Complete First 5K",
                "Run 5K without stopping",
                -15,
                true,
                0,
                -30,
                -15,
            ),
            (
                0,
                "Complete 10K Run",
                "Successfully finish a 10K race",
                15,
                false,
                1,
                -30,
                0,
            ),
            (
                0,
                "Half Marathon Ready",
                "Complete a 21K half marathon",
                45,
                false,
                2,
                -30,
                0,
            ),
            (
                1,
                "Basic Vocabulary (500 words)",
                "Learn and retain 500 essential Spanish words",
                -10,
                true,
                0,
                -45,
                -10,
            ),
            (
                1,
                "Hold Basic Conversation",
                "Have a 10-minute conversation with a native speaker",
                30,
                false,
                1,
                -45,
                0,
            ),
            (
                2,
                "Complete Book Outline",
                "Finish detailed chapter-by-chapter outline",
                -50,
                true,
                0,
                -60,
                -50,
            ),
            (
                2,
                "First Draft - 25% Complete",
                "Complete first quarter of the novel",
                20,
                false,
                1,
                -60,
                0,
            ),
        ];

        for (goal_index, title, description, target, done, order, created, updated) in
            milestone_specs
        {
            tx.execute(
                "
                INSERT INTO milestones (
                  profile_id, goal_id, title, description, target_date,
                  completed, order_index, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    profile.id.get(),
                    goal_ids[goal_index],
                    title,
                    description,
                    format_date(offset_date(today, target)),
                    i64::from(done),
                    order,
                    rfc3339_offset(now, created)?,
                    rfc3339_offset(now, updated)?,
                ],
            )
            .with_context(|| format!("insert demo milestone {title}"))?;
        }

        for day in 0..30_i64 {
            let date = offset_date(today, -day);
            let weekday = date.weekday();

            // Skip patterns keep the streaks uneven without pulling in an RNG.
            let mut completed = Vec::new();
            if day % 5 != 2 {
                completed.push(habit_ids[0]);
            }
            if !matches!(day % 10, 1 | 4 | 7) {
                completed.push(habit_ids[2]);
            }
            if day % 4 != 3 {
                completed.push(habit_ids[4]);
            }
            if matches!(
                weekday,
                Weekday::Monday | Weekday::Wednesday | Weekday::Friday
            ) && day % 5 != 2
            {
                completed.push(habit_ids[1]);
            }
            if matches!(weekday, Weekday::Tuesday | Weekday::Saturday)
                && !matches!(day % 10, 1 | 4 | 7)
            {
                completed.push(habit_ids[3]);
            }

            for habit_rowid in completed {
                let stamp = format!("{}T00:00:00Z", format_date(date));
                tx.execute(
                    "
                    INSERT INTO habit_completions (profile_id, habit_id, completed_at, created_at)
                    VALUES (?, ?, ?, ?)
                    ",
                    params![profile.id.get(), habit_rowid, stamp, stamp],
                )
                .context("insert demo completion")?;
            }
        }

        tx.commit().context("commit demo seed")?;
        Ok(profile)
    }
}

fn map_goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
    let status_raw: String = row.get(6)?;
    let status = GoalStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown goal status {status_raw}"),
            )),
        )
    })?;

    let start_date_raw: Option<String> = row.get(4)?;
    let target_date_raw: Option<String> = row.get(5)?;
    let progress_raw: i64 = row.get(7)?;
    let created_at_raw: String = row.get(8)?;
    let updated_at_raw: String = row.get(9)?;

    Ok(Goal {
        id: GoalId::new(row.get(0)?),
        profile_id: ProfileId::new(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        start_date: parse_opt_date(start_date_raw),
        target_date: parse_opt_date(target_date_raw),
        status,
        progress: u8::try_from(progress_raw.clamp(0, 100)).unwrap_or(0),
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn map_habit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Habit> {
    let frequency_raw: String = row.get(5)?;
    let frequency = HabitFrequency::parse(&frequency_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown habit frequency {frequency_raw}"),
            )),
        )
    })?;

    let start_date_raw: Option<String> = row.get(7)?;
    let due_date_raw: Option<String> = row.get(8)?;
    let created_at_raw: String = row.get(10)?;
    let updated_at_raw: String = row.get(11)?;

    Ok(Habit {
        id: HabitId::new(row.get(0)?),
        profile_id: ProfileId::new(row.get(1)?),
        goal_id: GoalId::new(row.get(2)?),
        title: row.get(3)?,
        description: row.get(4)?,
        frequency,
        frequency_value: row.get(6)?,
        start_date: parse_opt_date(start_date_raw),
        due_date: parse_opt_date(due_date_raw),
        order_index: row.get(9)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn map_milestone_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Milestone> {
    let completed_raw: i64 = row.get(6)?;
    let target_date_raw: Option<String> = row.get(5)?;
    let created_at_raw: String = row.get(8)?;
    let updated_at_raw: String = row.get(9)?;

    Ok(Milestone {
        id: MilestoneId::new(row.get(0)?),
        profile_id: ProfileId::new(row.get(1)?),
        goal_id: GoalId::new(row.get(2)?),
        title: row.get(3)?,
        description: row.get(4)?,
        target_date: parse_opt_date(target_date_raw),
        completed: completed_raw != 0,
        order_index: row.get(7)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn map_completion_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HabitCompletion> {
    let completed_at_raw: String = row.get(3)?;
    let created_at_raw: String = row.get(4)?;

    Ok(HabitCompletion {
        id: CompletionId::new(row.get(0)?),
        profile_id: ProfileId::new(row.get(1)?),
        habit_id: HabitId::new(row.get(2)?),
        completed_at: parse_datetime(&completed_at_raw).map_err(to_sql_error)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn fetch_goal(conn: &Connection, profile_id: ProfileId, goal_id: GoalId) -> Result<Goal> {
    conn.query_row(
        "
        SELECT
          id, profile_id, title, description, start_date,
          target_date, status, progress, created_at, updated_at
        FROM goals
        WHERE id = ? AND profile_id = ?
        ",
        params![goal_id.get(), profile_id.get()],
        map_goal_row,
    )
    .with_context(|| format!("load goal {}", goal_id.get()))
}

fn fetch_habit(conn: &Connection, profile_id: ProfileId, habit_id: HabitId) -> Result<Habit> {
    conn.query_row(
        "
        SELECT
          id, profile_id, goal_id, title, description, frequency,
          frequency_value, start_date, due_date, order_index,
          created_at, updated_at
        FROM habits
        WHERE id = ? AND profile_id = ?
        ",
        params![habit_id.get(), profile_id.get()],
        map_habit_row,
    )
    .with_context(|| format!("load habit {}", habit_id.get()))
}

fn fetch_milestone(
    conn: &Connection,
    profile_id: ProfileId,
    milestone_id: MilestoneId,
) -> Result<Milestone> {
    conn.query_row(
        "
        SELECT
          id, profile_id, goal_id, title, description, target_date,
          completed, order_index, created_at, updated_at
        FROM milestones
        WHERE id = ? AND profile_id = ?
        ",
        params![milestone_id.get(), profile_id.get()],
        map_milestone_row,
    )
    .with_context(|| format!("load milestone {}", milestone_id.get()))
}

fn goal_habits(conn: &Connection, profile_id: ProfileId, goal_id: GoalId) -> Result<Vec<Habit>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT
              id, profile_id, goal_id, title, description, frequency,
              frequency_value, start_date, due_date, order_index,
              created_at, updated_at
            FROM habits
            WHERE profile_id = ? AND goal_id = ?
            ORDER BY order_index ASC, id ASC
            ",
        )
        .context("prepare goal habits query")?;
    let rows = stmt
        .query_map(params![profile_id.get(), goal_id.get()], map_habit_row)
        .context("query goal habits")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("collect goal habits")
}

fn goal_milestones(
    conn: &Connection,
    profile_id: ProfileId,
    goal_id: GoalId,
) -> Result<Vec<Milestone>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT
              id, profile_id, goal_id, title, description, target_date,
              completed, order_index, created_at, updated_at
            FROM milestones
            WHERE profile_id = ? AND goal_id = ?
            ORDER BY order_index ASC, id ASC
            ",
        )
        .context("prepare goal milestones query")?;
    let rows = stmt
        .query_map(params![profile_id.get(), goal_id.get()], map_milestone_row)
        .context("query goal milestones")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("collect goal milestones")
}

fn goal_completions(
    conn: &Connection,
    profile_id: ProfileId,
    goal_id: GoalId,
) -> Result<Vec<HabitCompletion>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT
              completions.id, completions.profile_id, completions.habit_id,
              completions.completed_at, completions.created_at
            FROM habit_completions AS completions
            JOIN habits ON habits.id = completions.habit_id
            WHERE completions.profile_id = ? AND habits.goal_id = ?
            ORDER BY completions.completed_at ASC, completions.id ASC
            ",
        )
        .context("prepare goal completions query")?;
    let rows = stmt
        .query_map(params![profile_id.get(), goal_id.get()], map_completion_row)
        .context("query goal completions")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("collect goal completions")
}

fn refresh_goal_progress(
    conn: &Connection,
    profile_id: ProfileId,
    goal_id: GoalId,
    today: Date,
) -> Result<u8> {
    let habits = goal_habits(conn, profile_id, goal_id)?;
    let milestones = goal_milestones(conn, profile_id, goal_id)?;
    let completions = goal_completions(conn, profile_id, goal_id)?;
    let progress = progress::goal_progress(&habits, &milestones, &completions, today);

    let now = now_rfc3339()?;
    let rows_affected = conn
        .execute(
            "UPDATE goals SET progress = ?, updated_at = ? WHERE id = ? AND profile_id = ?",
            params![i64::from(progress), now, goal_id.get(), profile_id.get()],
        )
        .context("store goal progress")?;
    if rows_affected == 0 {
        bail!(
            "goal {} not found -- refresh the goals list and retry",
            goal_id.get()
        );
    }
    Ok(progress)
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ONTRACK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ONTRACK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("ontrack.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use an ontrack-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn default_setting_value(key: SettingKey) -> SettingValue {
    match key {
        SettingKey::UiShowDashboard => SettingValue::Bool(true),
        SettingKey::UiWeekStart => SettingValue::Week(WeekStart::Sunday),
        SettingKey::AiModel => SettingValue::Text(String::new()),
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn rfc3339_offset(base: OffsetDateTime, days: i64) -> Result<String> {
    offset_datetime(base, days)
        .format(&Rfc3339)
        .context("format demo timestamp")
}

fn offset_datetime(base: OffsetDateTime, days: i64) -> OffsetDateTime {
    base.checked_add(Duration::days(days)).unwrap_or(base)
}

fn offset_date(base: Date, days: i64) -> Date {
    base.checked_add(Duration::days(days)).unwrap_or(base)
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }

    // Hosted exports may store date columns as full timestamps; normalize to date.
    let date_time = parse_datetime(raw)?;
    Ok(date_time.date())
}

/// Optional date columns sometimes carry malformed values in imported
/// databases; those read back as unset rather than failing the whole row.
fn parse_opt_date(raw: Option<String>) -> Option<Date> {
    raw.as_deref().and_then(|value| parse_date(value).ok())
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

fn credential_sha256(email: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{email}:{password}").as_bytes());
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
