// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
}

impl GoalStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Completed, Self::Paused];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HabitFrequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl HabitFrequency {
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Custom];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Meaning of `frequency_value` for this frequency, for form hints.
    pub const fn value_hint(self) -> &'static str {
        match self {
            Self::Daily => "times per day",
            Self::Weekly => "times per week",
            Self::Monthly => "times per month",
            Self::Custom => "every N days",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "sunday",
            Self::Monday => "monday",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunday" | "sun" => Some(Self::Sunday),
            "monday" | "mon" => Some(Self::Monday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Dashboard,
    Goals,
    Calendar,
    Settings,
}

impl TabKind {
    pub const ALL: [Self; 4] = [Self::Dashboard, Self::Goals, Self::Calendar, Self::Settings];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Goals => "goals",
            Self::Calendar => "calendar",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    UiShowDashboard,
    UiWeekStart,
    AiModel,
}

impl SettingKey {
    pub const ALL: [Self; 3] = [Self::UiShowDashboard, Self::UiWeekStart, Self::AiModel];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UiShowDashboard => "ui.show_dashboard",
            Self::UiWeekStart => "ui.week_start",
            Self::AiModel => "ai.model",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ui.show_dashboard" => Some(Self::UiShowDashboard),
            "ui.week_start" => Some(Self::UiWeekStart),
            "ai.model" => Some(Self::AiModel),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::UiShowDashboard => "dashboard startup",
            Self::UiWeekStart => "week starts on",
            Self::AiModel => "suggestion model",
        }
    }

    pub const fn expected_value_kind(self) -> SettingValueKind {
        match self {
            Self::UiShowDashboard => SettingValueKind::Bool,
            Self::UiWeekStart => SettingValueKind::WeekStart,
            Self::AiModel => SettingValueKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValueKind {
    Bool,
    Text,
    WeekStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
    Week(WeekStart),
}

impl SettingValue {
    pub fn parse_for_key(key: SettingKey, raw: &str) -> Option<Self> {
        match key.expected_value_kind() {
            SettingValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(Self::Bool(true)),
                "0" | "false" | "off" | "no" => Some(Self::Bool(false)),
                _ => None,
            },
            SettingValueKind::Text => Some(Self::Text(raw.to_owned())),
            SettingValueKind::WeekStart => WeekStart::parse(raw).map(Self::Week),
        }
    }

    pub fn to_storage(&self, key: SettingKey) -> Option<String> {
        match (key.expected_value_kind(), self) {
            (SettingValueKind::Bool, Self::Bool(value)) => {
                Some(if *value { "true" } else { "false" }.to_owned())
            }
            (SettingValueKind::Text, Self::Text(value)) => Some(value.clone()),
            (SettingValueKind::WeekStart, Self::Week(value)) => Some(value.as_str().to_owned()),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Bool(true) => "on".to_owned(),
            Self::Bool(false) => "off".to_owned(),
            Self::Text(value) => value.clone(),
            Self::Week(value) => value.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSetting {
    pub key: SettingKey,
    pub value: SettingValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Goal,
    Habit,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Edit,
    Form(FormKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub email: String,
    pub full_name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub profile_id: ProfileId,
    pub title: String,
    pub description: String,
    pub start_date: Option<Date>,
    pub target_date: Option<Date>,
    pub status: GoalStatus,
    /// Stored advisory value; display recomputes from current rows except in
    /// guest sessions.
    pub progress: u8,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub profile_id: ProfileId,
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub frequency: HabitFrequency,
    /// Count per period, or period length in days for custom frequency.
    pub frequency_value: i32,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
    pub order_index: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub profile_id: ProfileId,
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub target_date: Option<Date>,
    pub completed: bool,
    pub order_index: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub id: CompletionId,
    pub profile_id: ProfileId,
    pub habit_id: HabitId,
    /// Only the calendar date of this timestamp is meaningful for equality.
    pub completed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DashboardStats {
    pub active_goals: usize,
    pub completed_goals: usize,
    pub total_habits: usize,
    /// Percentage of habits completed today, 0 when there are no habits.
    pub completion_rate: u8,
}
