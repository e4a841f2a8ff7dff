// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Explicit session context.
//!
//! Every operation that needs to know who is acting, or whether writes may
//! persist, takes this value (or the owner id extracted from it) as an
//! argument. There is no ambient current-user state.

use serde::{Deserialize, Serialize};

use crate::Profile;

/// Remote suggestion calls allowed per guest session. Template fallbacks do
/// not count.
pub const GUEST_SUGGESTION_LIMIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    Authenticated,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub profile: Profile,
    pub kind: SessionKind,
    /// Successful remote suggestion calls made so far this session.
    pub ai_queries_used: u32,
}

impl Session {
    pub fn authenticated(profile: Profile) -> Self {
        Self {
            profile,
            kind: SessionKind::Authenticated,
            ai_queries_used: 0,
        }
    }

    /// Guest sessions are backed by in-memory demo data and are never
    /// persisted; a fresh session resets the suggestion counter.
    pub fn guest(profile: Profile) -> Self {
        Self {
            profile,
            kind: SessionKind::Guest,
            ai_queries_used: 0,
        }
    }

    pub const fn is_guest(&self) -> bool {
        matches!(self.kind, SessionKind::Guest)
    }

    /// `None` means unlimited.
    pub const fn suggestion_limit(&self) -> Option<u32> {
        match self.kind {
            SessionKind::Authenticated => None,
            SessionKind::Guest => Some(GUEST_SUGGESTION_LIMIT),
        }
    }

    pub fn record_remote_suggestion(&mut self) {
        self.ai_queries_used = self.ai_queries_used.saturating_add(1);
    }
}
