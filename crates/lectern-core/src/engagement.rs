//! Engagement tiers and the append-only classification log entries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, StudentId};

/// Discrete engagement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementTier {
    /// Fast and correct.
    Active,
    /// Neither clearly active nor passive.
    Moderate,
    /// Slow or incorrect.
    Passive,
}

impl EngagementTier {
    /// All tiers, in dashboard display order.
    pub const ALL: [Self; 3] = [Self::Active, Self::Moderate, Self::Passive];

    /// Lowercase wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Moderate => "moderate",
            Self::Passive => "passive",
        }
    }
}

impl fmt::Display for EngagementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngagementTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "moderate" => Ok(Self::Moderate),
            "passive" => Ok(Self::Passive),
            other => Err(format!("unknown engagement tier: {other}")),
        }
    }
}

/// An event that has been classified but not yet appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEngagementEvent {
    /// Student the classification belongs to.
    pub student_id: StudentId,
    /// Session the response was given in.
    pub session_id: SessionId,
    /// Classified tier.
    pub tier: EngagementTier,
    /// Classification time.
    pub recorded_at: DateTime<Utc>,
}

/// An immutable entry of the engagement log.
///
/// `id` is assigned by the log on append and increases with insertion order,
/// so it breaks ties between events sharing a `recorded_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    /// Log-assigned identifier.
    pub id: u64,
    /// Student the classification belongs to.
    pub student_id: StudentId,
    /// Session the response was given in.
    pub session_id: SessionId,
    /// Classified tier.
    pub tier: EngagementTier,
    /// Classification time.
    pub recorded_at: DateTime<Utc>,
}

impl EngagementEvent {
    /// Attach a log identifier to a pending event.
    #[must_use]
    pub fn from_new(id: u64, event: NewEngagementEvent) -> Self {
        Self {
            id,
            student_id: event.student_id,
            session_id: event.session_id,
            tier: event.tier,
            recorded_at: event.recorded_at,
        }
    }

    /// Whether `self` supersedes `other` as the "current" event.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        (self.recorded_at, self.id) > (other.recorded_at, other.id)
    }
}

/// Latest tier per student over an arbitrary slice of the log.
pub fn latest_tiers<'a>(
    events: impl IntoIterator<Item = &'a EngagementEvent>,
) -> BTreeMap<StudentId, EngagementTier> {
    let mut latest: BTreeMap<StudentId, &EngagementEvent> = BTreeMap::new();
    for event in events {
        match latest.get(&event.student_id) {
            Some(current) if !event.is_newer_than(current) => {}
            _ => {
                let _ = latest.insert(event.student_id, event);
            }
        }
    }
    latest.into_iter().map(|(id, e)| (id, e.tier)).collect()
}

/// Count of distinct students per tier, using each student's latest tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSummary {
    /// Students currently ACTIVE.
    pub active: usize,
    /// Students currently MODERATE.
    pub moderate: usize,
    /// Students currently PASSIVE.
    pub passive: usize,
}

impl TierSummary {
    /// Build a summary from one tier per student.
    pub fn from_tiers(tiers: impl IntoIterator<Item = EngagementTier>) -> Self {
        let mut summary = Self::default();
        for tier in tiers {
            *summary.slot_mut(tier) += 1;
        }
        summary
    }

    /// Count for a single tier.
    #[must_use]
    pub fn count(&self, tier: EngagementTier) -> usize {
        match tier {
            EngagementTier::Active => self.active,
            EngagementTier::Moderate => self.moderate,
            EngagementTier::Passive => self.passive,
        }
    }

    /// Number of distinct classified students.
    #[must_use]
    pub fn total(&self) -> usize {
        self.active + self.moderate + self.passive
    }

    fn slot_mut(&mut self, tier: EngagementTier) -> &mut usize {
        match tier {
            EngagementTier::Active => &mut self.active,
            EngagementTier::Moderate => &mut self.moderate,
            EngagementTier::Passive => &mut self.passive,
        }
    }
}
