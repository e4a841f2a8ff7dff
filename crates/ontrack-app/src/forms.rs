// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;

use crate::{FormKind, GoalId, GoalStatus, HabitFrequency};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalFormInput {
    pub title: String,
    pub description: String,
    pub start_date: Option<Date>,
    pub target_date: Option<Date>,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitFormInput {
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub frequency: HabitFrequency,
    pub frequency_value: i32,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneFormInput {
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub target_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpInput {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Goal(GoalFormInput),
    Habit(HabitFormInput),
    Milestone(MilestoneFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Goal(_) => FormKind::Goal,
            Self::Habit(_) => FormKind::Habit,
            Self::Milestone(_) => FormKind::Milestone,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Goal(goal) => goal.validate(),
            Self::Habit(habit) => habit.validate(),
            Self::Milestone(milestone) => milestone.validate(),
        }
    }
}

impl GoalFormInput {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            start_date: None,
            target_date: None,
            status: GoalStatus::Active,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("goal title is required -- enter a title and retry");
        }
        if let (Some(start_date), Some(target_date)) = (self.start_date, self.target_date)
            && target_date < start_date
        {
            bail!("goal target date must be on/after start date");
        }
        Ok(())
    }
}

impl HabitFormInput {
    pub fn blank(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            title: String::new(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.goal_id.get() <= 0 {
            bail!("habit goal is required -- select a goal and retry");
        }
        if self.title.trim().is_empty() {
            bail!("habit title is required -- enter a title and retry");
        }
        if self.frequency_value < 1 {
            bail!("habit frequency value must be at least 1");
        }
        if let (Some(start_date), Some(due_date)) = (self.start_date, self.due_date)
            && due_date < start_date
        {
            bail!("habit due date must be on/after start date");
        }
        Ok(())
    }
}

impl MilestoneFormInput {
    pub fn blank(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            title: String::new(),
            description: String::new(),
            target_date: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.goal_id.get() <= 0 {
            bail!("milestone goal is required -- select a goal and retry");
        }
        if self.title.trim().is_empty() {
            bail!("milestone title is required -- enter a title and retry");
        }
        Ok(())
    }
}

impl SignInInput {
    pub fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            bail!("enter a valid email address and retry");
        }
        if self.password.is_empty() {
            bail!("password is required");
        }
        Ok(())
    }
}

impl SignUpInput {
    pub fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            bail!("enter a valid email address and retry");
        }
        if self.full_name.trim().is_empty() {
            bail!("full name is required -- enter your name and retry");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            bail!("password must be at least {MIN_PASSWORD_LEN} characters");
        }
        Ok(())
    }
}
