//! Childcare tracking records: attendance, naps, meals, diapers, incidents.
//!
//! # Invariants
//! - A child has at most one attendance row per date.
//! - A nap without `end` is open; a child has at most one open nap.
//! - Check-out and nap end never precede their start time.

use super::{require_text, PersonId, RecordId, SchoolYearId, ValidationError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

db_enum!(AttendanceStatus {
    Present => "Present",
    Absent => "Absent",
});

/// One child's attendance for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_in_by: Option<PersonId>,
    pub check_out: Option<NaiveTime>,
    pub check_out_by: Option<PersonId>,
    pub absence_reason: Option<String>,
    /// Staff member who created the row.
    pub recorded_by: PersonId,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Returns whether the child is checked in and not yet checked out.
    pub fn is_on_site(&self) -> bool {
        self.status == AttendanceStatus::Present
            && self.check_in.is_some()
            && self.check_out.is_none()
    }

    /// Minutes between check-in and check-out, when both are recorded.
    pub fn minutes_on_site(&self) -> Option<i64> {
        match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }
}

/// How well the child slept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NapQuality {
    Restless,
    Light,
    Sound,
}

db_enum!(NapQuality {
    Restless => "Restless",
    Light => "Light",
    Sound => "Sound",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NapRecord {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
    pub quality: Option<NapQuality>,
    pub notes: Option<String>,
    pub recorded_by: PersonId,
    pub created_at: DateTime<Utc>,
}

impl NapRecord {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Minutes slept for closed naps.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.end.map(|end| (end - self.start).num_minutes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    MorningSnack,
    Lunch,
    AfternoonSnack,
    Dinner,
}

db_enum!(MealType {
    Breakfast => "Breakfast",
    MorningSnack => "Morning Snack",
    Lunch => "Lunch",
    AfternoonSnack => "Afternoon Snack",
    Dinner => "Dinner",
});

/// Portion of the served meal the child ate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealQuantity {
    None,
    Little,
    Some,
    Most,
    All,
}

db_enum!(MealQuantity {
    None => "None",
    Little => "Little",
    Some => "Some",
    Most => "Most",
    All => "All",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub quantity: MealQuantity,
    pub notes: Option<String>,
    pub recorded_by: PersonId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiaperType {
    Wet,
    Soiled,
    Both,
    Dry,
}

db_enum!(DiaperType {
    Wet => "Wet",
    Soiled => "Soiled",
    Both => "Both",
    Dry => "Dry",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaperRecord {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub diaper_type: DiaperType,
    pub notes: Option<String>,
    pub recorded_by: PersonId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentType {
    Injury,
    Illness,
    Behaviour,
    AllergicReaction,
    Other,
}

db_enum!(IncidentType {
    Injury => "Injury",
    Illness => "Illness",
    Behaviour => "Behaviour",
    AllergicReaction => "Allergic Reaction",
    Other => "Other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncidentSeverity {
    Minor,
    Moderate,
    Serious,
}

db_enum!(IncidentSeverity {
    Minor => "Minor",
    Moderate => "Moderate",
    Serious => "Serious",
});

impl IncidentSeverity {
    /// Serious incidents require same-day parent notification.
    pub fn requires_immediate_notification(self) -> bool {
        matches!(self, Self::Serious)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub description: String,
    pub action_taken: Option<String>,
    pub parent_notified_at: Option<DateTime<Utc>>,
    pub parent_acknowledged_at: Option<DateTime<Utc>>,
    pub reported_by: PersonId,
    pub created_at: DateTime<Utc>,
}

impl IncidentRecord {
    pub fn is_parent_notified(&self) -> bool {
        self.parent_notified_at.is_some()
    }
}

/// Write model for a new incident report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncident {
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub description: String,
    pub action_taken: Option<String>,
    pub reported_by: PersonId,
}

impl NewIncident {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("incident description", &self.description)
    }
}

/// Write model for a meal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMeal {
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub quantity: MealQuantity,
    pub notes: Option<String>,
    pub recorded_by: PersonId,
}

/// Write model for a diaper change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiaper {
    pub school_year_id: SchoolYearId,
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub diaper_type: DiaperType,
    pub notes: Option<String>,
    pub recorded_by: PersonId,
}
