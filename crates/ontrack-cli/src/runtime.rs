// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! SQLite-backed [`AppRuntime`] implementation.
//!
//! Authenticated sessions read and write the on-disk store. A guest session
//! swaps in a seeded in-memory store, so nothing a guest does survives the
//! process; signing out swaps the on-disk store back in.

use anyhow::{Result, anyhow};
use ontrack_ai::{BreakdownSource, SuggestionQuota};
use ontrack_app::{
    AppSetting, DashboardStats, FormPayload, Goal, GoalFormInput, GoalId, GoalStatus, Habit,
    HabitCompletion, HabitFormInput, HabitFrequency, HabitId, Milestone, MilestoneFormInput,
    MilestoneId, ProfileId, Session, SettingKey, SettingValue, SignInInput, SignUpInput, WeekStart,
    progress,
};
use ontrack_db::{NewGoal, NewHabit, NewMilestone, Store, UpdateGoal, UpdateHabit, UpdateMilestone};
use ontrack_tui::{
    SuggestionBreakdown, SuggestionHabit, SuggestionMilestone, SuggestionSource,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::{Date, OffsetDateTime};

pub struct DbRuntime {
    store: Store,
    ai: Option<ontrack_ai::Client>,
    show_help_bar: bool,
    session: Option<Session>,
    /// Path of the on-disk store, restored after a guest session ends.
    /// `None` when the process was launched against an in-memory store.
    db_path: Option<PathBuf>,
}

impl DbRuntime {
    pub fn new(
        store: Store,
        ai: Option<ontrack_ai::Client>,
        show_help_bar: bool,
        db_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            ai,
            show_help_bar,
            session: None,
            db_path,
        }
    }

    fn profile_id(&self) -> Result<ProfileId> {
        self.session
            .as_ref()
            .map(|session| session.profile.id)
            .ok_or_else(|| anyhow!("not signed in"))
    }

    /// Guest writes keep the stored progress column untouched; there is no
    /// point persisting advisory values into a database that will be dropped.
    fn persist_progress(&self) -> bool {
        !self.session.as_ref().is_some_and(Session::is_guest)
    }

    fn reopen_primary_store(&mut self) -> Result<()> {
        let store = match &self.db_path {
            Some(path) => Store::open(path)?,
            None => Store::open_memory()?,
        };
        store.bootstrap()?;
        self.store = store;
        Ok(())
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

impl ontrack_tui::AppRuntime for DbRuntime {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn today(&self) -> Date {
        now().date()
    }

    fn show_help_bar(&self) -> bool {
        self.show_help_bar
    }

    fn sign_in(&mut self, input: &SignInInput) -> Result<()> {
        let profile = self.store.sign_in(&input.email, &input.password)?;
        self.session = Some(Session::authenticated(profile));
        Ok(())
    }

    fn sign_up(&mut self, input: &SignUpInput) -> Result<()> {
        let profile = self
            .store
            .sign_up(&input.email, &input.full_name, &input.password)?;
        self.session = Some(Session::authenticated(profile));
        Ok(())
    }

    fn start_guest_session(&mut self) -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let profile = store.seed_demo_data(now())?;
        self.store = store;
        self.session = Some(Session::guest(profile));
        Ok(())
    }

    fn sign_out(&mut self) -> Result<()> {
        let was_guest = self.session.as_ref().is_some_and(Session::is_guest);
        self.session = None;
        if was_guest {
            self.reopen_primary_store()?;
        }
        Ok(())
    }

    fn load_dashboard_stats(&mut self) -> Result<DashboardStats> {
        let profile_id = self.profile_id()?;
        self.store.dashboard_stats(profile_id, self.today())
    }

    fn load_goals(&mut self) -> Result<Vec<Goal>> {
        let profile_id = self.profile_id()?;
        let today = self.today();
        let completions = self.store.list_completions(profile_id)?;
        let mut goals = self.store.list_goals(profile_id)?;
        // Guest sessions show the stored demo progress as-is; signed-in
        // views recompute it from current rows.
        if self.session.as_ref().is_some_and(Session::is_guest) {
            return Ok(goals);
        }
        for goal in &mut goals {
            let habits = self.store.list_habits_for_goal(profile_id, goal.id)?;
            let milestones = self.store.list_milestones_for_goal(profile_id, goal.id)?;
            goal.progress = progress::goal_progress(&habits, &milestones, &completions, today);
        }
        Ok(goals)
    }

    fn load_goal_items(&mut self, goal_id: GoalId) -> Result<(Vec<Habit>, Vec<Milestone>)> {
        let profile_id = self.profile_id()?;
        let habits = self.store.list_habits_for_goal(profile_id, goal_id)?;
        let milestones = self.store.list_milestones_for_goal(profile_id, goal_id)?;
        Ok((habits, milestones))
    }

    fn load_habits(&mut self) -> Result<Vec<Habit>> {
        let profile_id = self.profile_id()?;
        self.store.list_habits(profile_id)
    }

    fn load_completions(&mut self) -> Result<Vec<HabitCompletion>> {
        let profile_id = self.profile_id()?;
        self.store.list_completions(profile_id)
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
        payload.validate()?;
        let profile_id = self.profile_id()?;

        match payload {
            FormPayload::Goal(form) => {
                self.store.create_goal(
                    profile_id,
                    &NewGoal {
                        title: form.title.clone(),
                        description: form.description.clone(),
                        start_date: form.start_date,
                        target_date: form.target_date,
                        status: form.status,
                    },
                )?;
            }
            FormPayload::Habit(form) => {
                self.store.create_habit(
                    profile_id,
                    &NewHabit {
                        goal_id: form.goal_id,
                        title: form.title.clone(),
                        description: form.description.clone(),
                        frequency: form.frequency,
                        frequency_value: form.frequency_value,
                        start_date: form.start_date,
                        due_date: form.due_date,
                    },
                )?;
            }
            FormPayload::Milestone(form) => {
                self.store.create_milestone(
                    profile_id,
                    &NewMilestone {
                        goal_id: form.goal_id,
                        title: form.title.clone(),
                        description: form.description.clone(),
                        target_date: form.target_date,
                    },
                )?;
            }
        }

        Ok(())
    }

    fn update_goal(&mut self, goal_id: GoalId, input: &GoalFormInput) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.update_goal(
            profile_id,
            goal_id,
            &UpdateGoal {
                title: input.title.clone(),
                description: input.description.clone(),
                start_date: input.start_date,
                target_date: input.target_date,
                status: input.status,
            },
        )
    }

    fn update_habit(&mut self, habit_id: HabitId, input: &HabitFormInput) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.update_habit(
            profile_id,
            habit_id,
            &UpdateHabit {
                title: input.title.clone(),
                description: input.description.clone(),
                frequency: input.frequency,
                frequency_value: input.frequency_value,
                start_date: input.start_date,
                due_date: input.due_date,
            },
        )
    }

    fn update_milestone(
        &mut self,
        milestone_id: MilestoneId,
        input: &MilestoneFormInput,
    ) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.update_milestone(
            profile_id,
            milestone_id,
            &UpdateMilestone {
                title: input.title.clone(),
                description: input.description.clone(),
                target_date: input.target_date,
            },
        )
    }

    fn set_goal_status(&mut self, goal_id: GoalId, status: GoalStatus) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.set_goal_status(profile_id, goal_id, status)
    }

    fn delete_goal(&mut self, goal_id: GoalId) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.delete_goal(profile_id, goal_id)
    }

    fn delete_habit(&mut self, habit_id: HabitId) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.delete_habit(profile_id, habit_id)
    }

    fn delete_milestone(&mut self, milestone_id: MilestoneId) -> Result<()> {
        let profile_id = self.profile_id()?;
        self.store.delete_milestone(profile_id, milestone_id)
    }

    fn toggle_habit_completion(&mut self, habit_id: HabitId, on: Date) -> Result<bool> {
        let profile_id = self.profile_id()?;
        let persist = self.persist_progress();
        self.store
            .toggle_habit_completion(profile_id, habit_id, on, self.today(), persist)
    }

    fn set_milestone_completed(
        &mut self,
        milestone_id: MilestoneId,
        completed: bool,
    ) -> Result<()> {
        let profile_id = self.profile_id()?;
        let persist = self.persist_progress();
        self.store
            .set_milestone_completed(profile_id, milestone_id, completed, self.today(), persist)
    }

    fn move_habit(&mut self, habit_id: HabitId, up: bool) -> Result<bool> {
        let profile_id = self.profile_id()?;
        self.store.move_habit(profile_id, habit_id, up)
    }

    fn list_settings(&mut self) -> Result<Vec<AppSetting>> {
        self.store.list_settings()
    }

    fn put_setting(&mut self, setting: &AppSetting) -> Result<()> {
        self.store.put_setting(setting.key, setting.value.clone())?;
        // A model change takes effect on the next suggestion request.
        if setting.key == SettingKey::AiModel
            && let (Some(client), SettingValue::Text(model)) = (&mut self.ai, &setting.value)
            && !model.trim().is_empty()
        {
            client.set_model(model.trim());
        }
        Ok(())
    }

    fn week_start(&mut self) -> Result<WeekStart> {
        self.store.get_week_start()
    }

    fn run_breakdown(
        &mut self,
        goal_title: &str,
        goal_description: &str,
    ) -> Result<SuggestionBreakdown> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("sign in to request suggestions"))?;
        let quota = match session.suggestion_limit() {
            Some(limit) => SuggestionQuota::limited(session.ai_queries_used, limit),
            None => SuggestionQuota::unlimited(),
        };

        let breakdown = ontrack_ai::suggest_or_fallback(
            self.ai.as_ref(),
            quota,
            goal_title,
            goal_description,
            now(),
        );

        // Only successful remote responses consume the guest quota.
        if breakdown.source == BreakdownSource::Remote
            && let Some(session) = &mut self.session
        {
            session.record_remote_suggestion();
        }

        let source = match breakdown.source {
            BreakdownSource::Remote => SuggestionSource::Remote {
                model: breakdown.model.unwrap_or_default(),
            },
            BreakdownSource::Template => SuggestionSource::Template,
        };
        Ok(SuggestionBreakdown {
            habits: breakdown
                .habits
                .into_iter()
                .map(|habit| SuggestionHabit {
                    title: habit.title,
                    description: habit.description,
                    frequency: habit.frequency,
                    frequency_value: habit.frequency_value,
                    estimated_duration: habit.estimated_duration,
                })
                .collect(),
            milestones: breakdown
                .milestones
                .into_iter()
                .map(|milestone| SuggestionMilestone {
                    title: milestone.title,
                    description: milestone.description,
                    target_date_offset: milestone.target_date_offset,
                    estimated_completion_time: milestone.estimated_completion_time,
                })
                .collect(),
            source,
        })
    }

    fn apply_breakdown(
        &mut self,
        goal_id: GoalId,
        breakdown: &SuggestionBreakdown,
        habit_picks: &BTreeSet<usize>,
        milestone_picks: &BTreeSet<usize>,
    ) -> Result<(usize, usize)> {
        let profile_id = self.profile_id()?;
        let today = self.today();
        let goal = self.store.get_goal(profile_id, goal_id)?;
        // Milestone offsets are relative to the goal's start date.
        let anchor = goal.start_date.unwrap_or(today);

        let mut habit_count = 0;
        for index in habit_picks {
            let Some(habit) = breakdown.habits.get(*index) else {
                continue;
            };
            let frequency = HabitFrequency::parse(&habit.frequency.trim().to_ascii_lowercase())
                .unwrap_or(HabitFrequency::Daily);
            self.store.create_habit(
                profile_id,
                &NewHabit {
                    goal_id,
                    title: habit.title.clone(),
                    description: habit.description.clone(),
                    frequency,
                    frequency_value: habit.frequency_value.max(1),
                    start_date: Some(today),
                    due_date: None,
                },
            )?;
            habit_count += 1;
        }

        let mut milestone_count = 0;
        for index in milestone_picks {
            let Some(milestone) = breakdown.milestones.get(*index) else {
                continue;
            };
            self.store.create_milestone(
                profile_id,
                &NewMilestone {
                    goal_id,
                    title: milestone.title.clone(),
                    description: milestone.description.clone(),
                    target_date: ontrack_db::validation::add_days(
                        anchor,
                        milestone.target_date_offset,
                    ),
                },
            )?;
            milestone_count += 1;
        }

        Ok((habit_count, milestone_count))
    }
}
