// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use ontrack_app::{GoalStatus, HabitFrequency};
use std::path::PathBuf;
use time::{Date, Duration, Month};

const GOAL_AREAS: [&str; 8] = [
    "Fitness",
    "Learning",
    "Career",
    "Creative",
    "Finance",
    "Health",
    "Mindfulness",
    "Travel",
];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Sage", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Finley", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const EMAIL_DOMAINS: [&str; 5] = [
    "example.com",
    "example.net",
    "mail.test",
    "inbox.local",
    "tracker.dev",
];

const GOAL_STATUSES: [GoalStatus; 3] = [
    GoalStatus::Active,
    GoalStatus::Completed,
    GoalStatus::Paused,
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFixture {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalFixture {
    pub title: String,
    pub area: String,
    pub status: GoalStatus,
    pub description: String,
    pub start_date: Option<Date>,
    pub target_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitFixture {
    pub title: String,
    pub description: String,
    pub frequency: HabitFrequency,
    pub frequency_value: i32,
    pub start_date: Option<Date>,
    pub due_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneFixture {
    pub title: String,
    pub description: String,
    pub target_date: Option<Date>,
    pub completed: bool,
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Deterministic fixture generator for goal-tracker tests. The same seed
/// always yields the same sequence of fixtures.
#[derive(Debug, Clone)]
pub struct GoalFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl GoalFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn profile(&mut self) -> ProfileFixture {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&EMAIL_DOMAINS);
        ProfileFixture {
            email: format!(
                "{}.{}{}@{domain}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase(),
                self.int_range_i32(1, 99),
            ),
            full_name: format!("{first} {last}"),
            password: format!("{}-{:04}", self.pick(&WORDS), self.int_range_i32(0, 9_999)),
        }
    }

    pub fn goal(&mut self, area: &str) -> GoalFixture {
        let titles = goal_titles(area);
        let title = if titles.is_empty() {
            format!("Improve {}", area.to_ascii_lowercase())
        } else {
            self.pick(titles).to_owned()
        };

        let status_index =
            (self.seed as usize + self.rng.int_n(GOAL_STATUSES.len())) % GOAL_STATUSES.len();
        let status = GOAL_STATUSES[status_index];
        let today = reference_today();
        let start = self.random_date_between(today - Duration::days(365), today);
        let mut goal = GoalFixture {
            title,
            area: area.to_owned(),
            status,
            description: self.sentence(8, 20),
            start_date: Some(start),
            target_date: None,
        };

        goal.target_date = Some(if status == GoalStatus::Completed {
            self.random_date_between(start, today)
        } else {
            self.random_date_between(today + Duration::days(30), today + Duration::days(365))
        });
        goal
    }

    pub fn habit(&mut self, area: &str) -> HabitFixture {
        let options = habit_options(area);
        if options.is_empty() {
            return HabitFixture {
                title: "Daily check-in".to_owned(),
                description: String::new(),
                frequency: HabitFrequency::Daily,
                frequency_value: 1,
                start_date: None,
                due_date: None,
            };
        }

        let (title, frequency, frequency_value, notes) = options[self.rng.int_n(options.len())];
        let mut habit = HabitFixture {
            title: title.to_owned(),
            description: notes.to_owned(),
            frequency,
            frequency_value,
            start_date: None,
            due_date: None,
        };

        let today = reference_today();
        if self.int_range_i32(1, 10) <= 7 {
            habit.start_date = Some(self.random_date_between(today - Duration::days(90), today));
        }
        if self.int_range_i32(1, 10) <= 3 {
            habit.due_date =
                Some(self.random_date_between(today + Duration::days(30), today + Duration::days(180)));
        }
        habit
    }

    pub fn milestone(&mut self, area: &str) -> MilestoneFixture {
        let titles = milestone_titles(area);
        let title = if titles.is_empty() {
            format!("Next {} checkpoint", area.to_ascii_lowercase())
        } else {
            self.pick(titles).to_owned()
        };

        let completed = self.rng.bool();
        let today = reference_today();
        let target = if completed {
            self.random_date_between(today - Duration::days(120), today)
        } else {
            self.random_date_between(today + Duration::days(14), today + Duration::days(180))
        };
        MilestoneFixture {
            title,
            description: self.sentence(5, 12),
            target_date: Some(target),
            completed,
        }
    }

    pub fn date_in_year(&mut self, year: i32) -> Date {
        let start = Date::from_calendar_date(year, Month::January, 1).expect("valid year start");
        let end = Date::from_calendar_date(year, Month::December, 31).expect("valid year end");
        self.random_date_between(start, end)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i32(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let offset = (self.rng.next_u64() % (span as u64)) as i64;
        (i64::from(min) + offset) as i32
    }

    fn random_date_between(&mut self, start: Date, end: Date) -> Date {
        let start_day = start.to_julian_day();
        let end_day = end.to_julian_day();
        if end_day <= start_day {
            return start;
        }
        let span = (end_day - start_day) as u64;
        let offset = self.rng.next_u64() % (span + 1);
        Date::from_julian_day(start_day + offset as i32).expect("valid julian day")
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        let count = self.int_range_i32(min_words as i32, max_words as i32) as usize;
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(self.pick(&WORDS).to_owned());
        }
        let mut sentence = parts.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

const WORDS: [&str; 30] = [
    "practice",
    "review",
    "streak",
    "session",
    "schedule",
    "progress",
    "weekly",
    "morning",
    "routine",
    "notebook",
    "language",
    "training",
    "draft",
    "budget",
    "mileage",
    "checkpoint",
    "momentum",
    "focus",
    "habit",
    "plan",
    "track",
    "journal",
    "target",
    "outline",
    "warmup",
    "recovery",
    "consistency",
    "baseline",
    "stretch",
    "pace",
];

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("ontrack.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-06-15T12:34:56Z"
}

pub fn goal_areas() -> &'static [&'static str] {
    &GOAL_AREAS
}

fn reference_today() -> Date {
    Date::from_calendar_date(REFERENCE_YEAR, Month::June, 15).expect("valid calendar date")
}

fn goal_titles(area: &str) -> &'static [&'static str] {
    match area {
        "Fitness" => &[
            "Run a Marathon",
            "Cycle 1000 Miles",
            "Swim Twice a Week",
            "Finish a Triathlon",
        ],
        "Learning" => &[
            "Learn Spanish",
            "Read 24 Books",
            "Finish an Online Course",
            "Learn to Play Guitar",
        ],
        "Career" => &[
            "Earn a Promotion",
            "Ship a Side Project",
            "Speak at a Conference",
            "Mentor a Junior Colleague",
        ],
        "Creative" => &[
            "Write a Novel",
            "Record an Album",
            "Fill a Sketchbook",
            "Publish a Short Story",
        ],
        "Finance" => &[
            "Build an Emergency Fund",
            "Pay Off a Credit Card",
            "Save for a House Deposit",
            "Track Every Expense",
        ],
        "Health" => &[
            "Lose Ten Pounds",
            "Sleep Eight Hours",
            "Cook at Home More",
            "Quit Refined Sugar",
        ],
        "Mindfulness" => &[
            "Meditate Daily",
            "Keep a Gratitude Journal",
            "Take a Digital Sabbath",
            "Practice Yoga",
        ],
        "Travel" => &[
            "Visit Three New Countries",
            "Hike a Long Trail",
            "Plan a Road Trip",
            "Learn Travel Photography",
        ],
        _ => &[],
    }
}

fn habit_options(area: &str) -> &'static [(&'static str, HabitFrequency, i32, &'static str)] {
    match area {
        "Fitness" => &[
            ("Morning run", HabitFrequency::Daily, 1, "easy pace"),
            ("Strength training", HabitFrequency::Weekly, 3, "legs and core"),
            ("Stretching", HabitFrequency::Daily, 1, "ten minutes"),
        ],
        "Learning" => &[
            ("Vocabulary drill", HabitFrequency::Daily, 1, "thirty minutes"),
            (
                "Conversation practice",
                HabitFrequency::Weekly,
                2,
                "with a native speaker",
            ),
            ("Review flashcards", HabitFrequency::Custom, 2, "spaced repetition"),
        ],
        "Career" => &[
            ("Deep work block", HabitFrequency::Daily, 1, "mornings"),
            ("Write a devlog entry", HabitFrequency::Weekly, 1, "short updates"),
            ("Reach out to a contact", HabitFrequency::Weekly, 2, "keep it brief"),
        ],
        "Creative" => &[
            ("Write 500 words", HabitFrequency::Daily, 1, "draft quality"),
            ("Sketch study", HabitFrequency::Weekly, 3, "reference based"),
            ("Editing pass", HabitFrequency::Custom, 7, "previous chapter"),
        ],
        "Finance" => &[
            ("Log expenses", HabitFrequency::Daily, 1, "every receipt"),
            ("Review budget", HabitFrequency::Weekly, 1, "sunday evening"),
            ("Transfer to savings", HabitFrequency::Monthly, 1, "payday"),
        ],
        "Health" => &[
            ("Cook dinner at home", HabitFrequency::Weekly, 4, "batch prep helps"),
            ("Walk after lunch", HabitFrequency::Daily, 1, "twenty minutes"),
            ("Log meals", HabitFrequency::Daily, 1, ""),
        ],
        "Mindfulness" => &[
            ("Morning meditation", HabitFrequency::Daily, 1, "ten minutes"),
            ("Gratitude journal", HabitFrequency::Daily, 1, "three lines"),
            ("Yoga session", HabitFrequency::Weekly, 2, ""),
        ],
        "Travel" => &[
            ("Research destinations", HabitFrequency::Weekly, 1, ""),
            ("Practice phrases", HabitFrequency::Daily, 1, "for the next trip"),
            ("Review trail maps", HabitFrequency::Custom, 14, ""),
        ],
        _ => &[],
    }
}

fn milestone_titles(area: &str) -> &'static [&'static str] {
    match area {
        "Fitness" => &["Complete First 5K", "Complete 10K Run", "Half Marathon Ready"],
        "Learning" => &[
            "Basic Vocabulary (500 words)",
            "Hold Basic Conversation",
            "Finish Beginner Course",
        ],
        "Career" => &[
            "Draft the Proposal",
            "First Demo Shipped",
            "Quarterly Review Passed",
        ],
        "Creative" => &[
            "Complete Book Outline",
            "First Draft - 25% Complete",
            "First Chapter Revised",
        ],
        "Finance" => &[
            "One Month of Expenses Saved",
            "Card Balance Under Half",
            "Automatic Transfers Set Up",
        ],
        "Health" => &[
            "First Five Pounds Down",
            "Two Weeks of Home Cooking",
            "Consistent Sleep Schedule",
        ],
        "Mindfulness" => &[
            "Ten Sessions Logged",
            "Thirty-Day Streak",
            "First Silent Morning",
        ],
        "Travel" => &["Passport Renewed", "Itinerary Drafted", "First Trip Booked"],
        _ => &[],
    }
}
