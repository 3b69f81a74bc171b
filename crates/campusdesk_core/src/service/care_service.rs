//! Childcare day-tracking use-cases.
//!
//! # Responsibility
//! - Enforce the daily attendance and nap sequences before writing.
//! - Assemble per-child daily summaries for parents and staff.
//!
//! # Invariants
//! - One attendance row per child per date; check-out follows check-in.
//! - A child has at most one open nap; nap end never precedes its start.
//! - Parents acknowledge an incident only after being notified.

use crate::model::care::{
    AttendanceRecord, AttendanceStatus, DiaperRecord, IncidentRecord, MealRecord, NapQuality,
    NapRecord, NewDiaper, NewIncident, NewMeal,
};
use crate::model::{PersonId, RecordId, SchoolYearId, ValidationError};
use crate::repo::care_repo::{CareDayQuery, CareRepository, IncidentQuery};
use crate::repo::RepoError;
use chrono::{NaiveDate, NaiveTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CareServiceError {
    /// The child already has an attendance row for the date.
    AlreadyRecorded { person_id: PersonId, date: NaiveDate },
    NotCheckedIn { person_id: PersonId, date: NaiveDate },
    AlreadyCheckedOut { person_id: PersonId, date: NaiveDate },
    /// An end time precedes its start time.
    EndBeforeStart { start: NaiveTime, end: NaiveTime },
    NapAlreadyOpen { person_id: PersonId, nap_id: RecordId },
    NoOpenNap(PersonId),
    /// Care was logged for a child marked absent that day.
    MarkedAbsent { person_id: PersonId, date: NaiveDate },
    IncidentNotFound(RecordId),
    ParentNotNotified(RecordId),
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for CareServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRecorded { person_id, date } => {
                write!(f, "attendance for child {person_id} on {date} already recorded")
            }
            Self::NotCheckedIn { person_id, date } => {
                write!(f, "child {person_id} is not checked in on {date}")
            }
            Self::AlreadyCheckedOut { person_id, date } => {
                write!(f, "child {person_id} already checked out on {date}")
            }
            Self::EndBeforeStart { start, end } => {
                write!(f, "end time {end} is before start time {start}")
            }
            Self::NapAlreadyOpen { person_id, nap_id } => {
                write!(f, "child {person_id} already has open nap {nap_id}")
            }
            Self::NoOpenNap(person_id) => write!(f, "child {person_id} has no open nap"),
            Self::MarkedAbsent { person_id, date } => {
                write!(f, "child {person_id} is marked absent on {date}")
            }
            Self::IncidentNotFound(id) => write!(f, "incident not found: {id}"),
            Self::ParentNotNotified(id) => {
                write!(f, "incident {id} cannot be acknowledged before parents are notified")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CareServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CareServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for CareServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type CareResult<T> = Result<T, CareServiceError>;

/// Everything recorded for one child on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub person_id: PersonId,
    pub date: NaiveDate,
    pub attendance: Option<AttendanceRecord>,
    pub naps: Vec<NapRecord>,
    /// Sum over closed naps.
    pub minutes_slept: i64,
    pub meals: Vec<MealRecord>,
    pub diaper_changes: usize,
    pub incidents: Vec<IncidentRecord>,
}

/// Care use-cases scoped to one school year.
pub struct CareService<R: CareRepository> {
    repo: R,
    school_year_id: SchoolYearId,
}

impl<R: CareRepository> CareService<R> {
    pub fn new(repo: R, school_year_id: SchoolYearId) -> Self {
        Self {
            repo,
            school_year_id,
        }
    }

    pub fn check_in(
        &self,
        person_id: PersonId,
        date: NaiveDate,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> CareResult<AttendanceRecord> {
        if self.repo.get_attendance(person_id, date)?.is_some() {
            return Err(CareServiceError::AlreadyRecorded { person_id, date });
        }
        self.repo
            .create_check_in(self.school_year_id, person_id, date, time, staff_id)
            .map_err(|err| already_recorded_or(err, person_id, date))?;
        info!("event=care_check_in module=care status=ok person_id={person_id} date={date}");
        self.read_attendance(person_id, date)
    }

    pub fn check_out(
        &self,
        person_id: PersonId,
        date: NaiveDate,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> CareResult<AttendanceRecord> {
        let attendance = self
            .repo
            .get_attendance(person_id, date)?
            .ok_or(CareServiceError::NotCheckedIn { person_id, date })?;
        let check_in = attendance
            .check_in
            .ok_or(CareServiceError::NotCheckedIn { person_id, date })?;
        if attendance.check_out.is_some() {
            return Err(CareServiceError::AlreadyCheckedOut { person_id, date });
        }
        if time < check_in {
            return Err(CareServiceError::EndBeforeStart {
                start: check_in,
                end: time,
            });
        }

        self.repo.set_check_out(attendance.id, time, staff_id)?;
        let attendance = self.read_attendance(person_id, date)?;
        info!(
            "event=care_check_out module=care status=ok person_id={} date={} minutes_on_site={}",
            person_id,
            date,
            attendance.minutes_on_site().unwrap_or_default()
        );
        Ok(attendance)
    }

    pub fn mark_absent(
        &self,
        person_id: PersonId,
        date: NaiveDate,
        reason: Option<&str>,
        staff_id: PersonId,
    ) -> CareResult<AttendanceRecord> {
        if self.repo.get_attendance(person_id, date)?.is_some() {
            return Err(CareServiceError::AlreadyRecorded { person_id, date });
        }
        let reason = reason.map(str::trim).filter(|reason| !reason.is_empty());
        self.repo
            .create_absence(self.school_year_id, person_id, date, reason, staff_id)
            .map_err(|err| already_recorded_or(err, person_id, date))?;
        info!("event=care_absence module=care status=ok person_id={person_id} date={date}");
        self.read_attendance(person_id, date)
    }

    pub fn start_nap(
        &self,
        person_id: PersonId,
        date: NaiveDate,
        start: NaiveTime,
        staff_id: PersonId,
    ) -> CareResult<NapRecord> {
        self.ensure_not_absent(person_id, date)?;
        if let Some(open) = self.repo.find_open_nap(person_id)? {
            return Err(CareServiceError::NapAlreadyOpen {
                person_id,
                nap_id: open.id,
            });
        }
        self.repo
            .create_nap(self.school_year_id, person_id, date, start, staff_id)?;
        self.repo
            .find_open_nap(person_id)?
            .ok_or(CareServiceError::NoOpenNap(person_id))
    }

    /// Closes the child's open nap.
    pub fn end_nap(
        &self,
        person_id: PersonId,
        end: NaiveTime,
        quality: Option<NapQuality>,
        notes: Option<&str>,
    ) -> CareResult<NapRecord> {
        let open = self
            .repo
            .find_open_nap(person_id)?
            .ok_or(CareServiceError::NoOpenNap(person_id))?;
        if end < open.start {
            return Err(CareServiceError::EndBeforeStart {
                start: open.start,
                end,
            });
        }

        self.repo.close_nap(open.id, end, quality, notes)?;
        let naps = self
            .repo
            .list_naps(&CareDayQuery::for_child(self.school_year_id, open.date, person_id))?;
        let closed = naps
            .into_iter()
            .find(|nap| nap.id == open.id)
            .ok_or(CareServiceError::NoOpenNap(person_id))?;
        info!(
            "event=care_nap module=care status=ok person_id={} nap_id={} minutes={}",
            person_id,
            closed.id,
            closed.duration_minutes().unwrap_or_default()
        );
        Ok(closed)
    }

    pub fn log_meal(&self, meal: &NewMeal) -> CareResult<RecordId> {
        self.ensure_not_absent(meal.person_id, meal.date)?;
        Ok(self.repo.create_meal(meal)?)
    }

    pub fn log_diaper(&self, diaper: &NewDiaper) -> CareResult<RecordId> {
        self.ensure_not_absent(diaper.person_id, diaper.date)?;
        Ok(self.repo.create_diaper(diaper)?)
    }

    pub fn report_incident(&self, incident: &NewIncident) -> CareResult<IncidentRecord> {
        incident.validate()?;
        let id = self.repo.create_incident(incident)?;
        if incident.severity.requires_immediate_notification() {
            warn!(
                "event=care_incident module=care status=needs_notification incident_id={} person_id={} severity={}",
                id, incident.person_id, incident.severity
            );
        } else {
            info!(
                "event=care_incident module=care status=ok incident_id={} person_id={} severity={}",
                id, incident.person_id, incident.severity
            );
        }
        self.read_incident(id)
    }

    /// Stamps parent notification; repeated calls keep the first timestamp.
    pub fn mark_parent_notified(&self, id: RecordId) -> CareResult<IncidentRecord> {
        let incident = self.read_incident(id)?;
        if incident.is_parent_notified() {
            return Ok(incident);
        }
        self.repo.set_incident_notified(id, Utc::now())?;
        self.read_incident(id)
    }

    pub fn acknowledge_incident(&self, id: RecordId) -> CareResult<IncidentRecord> {
        let incident = self.read_incident(id)?;
        if !incident.is_parent_notified() {
            return Err(CareServiceError::ParentNotNotified(id));
        }
        if incident.parent_acknowledged_at.is_some() {
            return Ok(incident);
        }
        self.repo.set_incident_acknowledged(id, Utc::now())?;
        self.read_incident(id)
    }

    /// Incidents in this school year whose parents were not told yet.
    pub fn pending_notifications(&self) -> CareResult<Vec<IncidentRecord>> {
        Ok(self.repo.list_incidents(&IncidentQuery {
            school_year_id: Some(self.school_year_id),
            unnotified_only: true,
            ..IncidentQuery::default()
        })?)
    }

    pub fn list_incidents(&self, query: &IncidentQuery) -> CareResult<Vec<IncidentRecord>> {
        Ok(self.repo.list_incidents(query)?)
    }

    pub fn attendance_on(&self, date: NaiveDate) -> CareResult<Vec<AttendanceRecord>> {
        Ok(self.repo.list_attendance(&self.day(date))?)
    }

    pub fn naps_on(&self, date: NaiveDate) -> CareResult<Vec<NapRecord>> {
        Ok(self.repo.list_naps(&self.day(date))?)
    }

    pub fn meals_on(&self, date: NaiveDate) -> CareResult<Vec<MealRecord>> {
        Ok(self.repo.list_meals(&self.day(date))?)
    }

    pub fn diapers_on(&self, date: NaiveDate) -> CareResult<Vec<DiaperRecord>> {
        Ok(self.repo.list_diapers(&self.day(date))?)
    }

    pub fn daily_summary(&self, person_id: PersonId, date: NaiveDate) -> CareResult<DailySummary> {
        let query = CareDayQuery::for_child(self.school_year_id, date, person_id);
        let naps = self.repo.list_naps(&query)?;
        let minutes_slept = naps.iter().filter_map(NapRecord::duration_minutes).sum();
        let incidents = self.repo.list_incidents(&IncidentQuery {
            school_year_id: Some(self.school_year_id),
            person_id: Some(person_id),
            date_from: Some(date),
            date_to: Some(date),
            ..IncidentQuery::default()
        })?;

        Ok(DailySummary {
            person_id,
            date,
            attendance: self.repo.get_attendance(person_id, date)?,
            naps,
            minutes_slept,
            meals: self.repo.list_meals(&query)?,
            diaper_changes: self.repo.list_diapers(&query)?.len(),
            incidents,
        })
    }

    fn day(&self, date: NaiveDate) -> CareDayQuery {
        CareDayQuery {
            school_year_id: self.school_year_id,
            date,
            person_id: None,
        }
    }

    fn ensure_not_absent(&self, person_id: PersonId, date: NaiveDate) -> CareResult<()> {
        match self.repo.get_attendance(person_id, date)? {
            Some(attendance) if attendance.status == AttendanceStatus::Absent => {
                Err(CareServiceError::MarkedAbsent { person_id, date })
            }
            _ => Ok(()),
        }
    }

    fn read_attendance(&self, person_id: PersonId, date: NaiveDate) -> CareResult<AttendanceRecord> {
        self.repo
            .get_attendance(person_id, date)?
            .ok_or(CareServiceError::NotCheckedIn { person_id, date })
    }

    fn read_incident(&self, id: RecordId) -> CareResult<IncidentRecord> {
        self.repo
            .get_incident(id)?
            .ok_or(CareServiceError::IncidentNotFound(id))
    }
}

fn already_recorded_or(err: RepoError, person_id: PersonId, date: NaiveDate) -> CareServiceError {
    if err.is_constraint_violation() {
        return CareServiceError::AlreadyRecorded { person_id, date };
    }
    err.into()
}
