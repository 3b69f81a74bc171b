//! Childcare gateway over attendance, nap, meal, diaper and incident tables.
//!
//! # Responsibility
//! - Provide named create/update/list APIs for daily care records.
//! - Keep SQL details inside the care persistence boundary.
//!
//! # Invariants
//! - `careAttendance` holds one row per child per date (unique index).
//! - `careNap` holds at most one open row per child (partial unique index).

use super::{enum_column, optional_enum_column, RepoError, RepoResult};
use crate::model::care::{
    AttendanceRecord, AttendanceStatus, DiaperRecord, DiaperType, IncidentRecord,
    IncidentSeverity, IncidentType, MealQuantity, MealRecord, MealType, NapQuality, NapRecord,
    NewDiaper, NewIncident, NewMeal,
};
use crate::model::{PersonId, RecordId, SchoolYearId};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ATTENDANCE_SELECT_SQL: &str = "SELECT
    careAttendanceID,
    schoolYearID,
    personID,
    careAttendanceDate,
    careAttendanceStatus,
    careAttendanceCheckIn,
    careAttendanceCheckInBy,
    careAttendanceCheckOut,
    careAttendanceCheckOutBy,
    careAttendanceAbsenceReason,
    careAttendanceRecordedBy,
    careAttendanceTimestampCreated
FROM careAttendance";

const NAP_SELECT_SQL: &str = "SELECT
    careNapID,
    schoolYearID,
    personID,
    careNapDate,
    careNapStart,
    careNapEnd,
    careNapQuality,
    careNapNotes,
    careNapRecordedBy,
    careNapTimestampCreated
FROM careNap";

const MEAL_SELECT_SQL: &str = "SELECT
    careMealID,
    schoolYearID,
    personID,
    careMealDate,
    careMealType,
    careMealQuantity,
    careMealNotes,
    careMealRecordedBy,
    careMealTimestampCreated
FROM careMeal";

const DIAPER_SELECT_SQL: &str = "SELECT
    careDiaperID,
    schoolYearID,
    personID,
    careDiaperDate,
    careDiaperTime,
    careDiaperType,
    careDiaperNotes,
    careDiaperRecordedBy,
    careDiaperTimestampCreated
FROM careDiaper";

const INCIDENT_SELECT_SQL: &str = "SELECT
    careIncidentID,
    schoolYearID,
    personID,
    careIncidentDate,
    careIncidentTime,
    careIncidentType,
    careIncidentSeverity,
    careIncidentDescription,
    careIncidentActionTaken,
    careIncidentParentNotifiedAt,
    careIncidentParentAcknowledgedAt,
    careIncidentReportedBy,
    careIncidentTimestampCreated
FROM careIncident";

/// Day-scoped filter used by every per-date care listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareDayQuery {
    pub school_year_id: SchoolYearId,
    pub date: NaiveDate,
    /// Restricts the listing to one child.
    pub person_id: Option<PersonId>,
}

impl CareDayQuery {
    pub fn for_child(school_year_id: SchoolYearId, date: NaiveDate, person_id: PersonId) -> Self {
        Self {
            school_year_id,
            date,
            person_id: Some(person_id),
        }
    }
}

/// Filter options for incident listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    pub school_year_id: Option<SchoolYearId>,
    pub person_id: Option<PersonId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_severity: Option<IncidentSeverity>,
    /// Only incidents whose parents have not been notified yet.
    pub unnotified_only: bool,
}

/// Gateway interface for daily care records.
pub trait CareRepository {
    fn create_check_in(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<RecordId>;
    fn create_absence(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        reason: Option<&str>,
        staff_id: PersonId,
    ) -> RepoResult<RecordId>;
    fn set_check_out(
        &self,
        attendance_id: RecordId,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<()>;
    fn get_attendance(
        &self,
        person_id: PersonId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>>;
    fn list_attendance(&self, query: &CareDayQuery) -> RepoResult<Vec<AttendanceRecord>>;

    fn create_nap(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        start: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<RecordId>;
    fn find_open_nap(&self, person_id: PersonId) -> RepoResult<Option<NapRecord>>;
    fn close_nap(
        &self,
        nap_id: RecordId,
        end: NaiveTime,
        quality: Option<NapQuality>,
        notes: Option<&str>,
    ) -> RepoResult<()>;
    fn list_naps(&self, query: &CareDayQuery) -> RepoResult<Vec<NapRecord>>;

    fn create_meal(&self, meal: &NewMeal) -> RepoResult<RecordId>;
    fn list_meals(&self, query: &CareDayQuery) -> RepoResult<Vec<MealRecord>>;

    fn create_diaper(&self, diaper: &NewDiaper) -> RepoResult<RecordId>;
    fn list_diapers(&self, query: &CareDayQuery) -> RepoResult<Vec<DiaperRecord>>;

    fn create_incident(&self, incident: &NewIncident) -> RepoResult<RecordId>;
    fn get_incident(&self, id: RecordId) -> RepoResult<Option<IncidentRecord>>;
    fn list_incidents(&self, query: &IncidentQuery) -> RepoResult<Vec<IncidentRecord>>;
    fn set_incident_notified(&self, id: RecordId, at: DateTime<Utc>) -> RepoResult<()>;
    fn set_incident_acknowledged(&self, id: RecordId, at: DateTime<Utc>) -> RepoResult<()>;
}

/// SQLite-backed care gateway.
pub struct SqliteCareRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCareRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn list_day<T>(
        &self,
        select_sql: &str,
        prefix: &str,
        order_by: &str,
        query: &CareDayQuery,
        parse: fn(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        let mut sql = format!("{select_sql} WHERE schoolYearID = ? AND {prefix}Date = ?");
        let mut bind_values = vec![
            Value::Integer(query.school_year_id),
            Value::Text(query.date.to_string()),
        ];
        if let Some(person_id) = query.person_id {
            sql.push_str(" AND personID = ?");
            bind_values.push(Value::Integer(person_id));
        }
        sql.push_str(&format!(" ORDER BY {order_by}"));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse(row)?);
        }
        Ok(records)
    }
}

impl CareRepository for SqliteCareRepository<'_> {
    fn create_check_in(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO careAttendance (
                schoolYearID,
                personID,
                careAttendanceDate,
                careAttendanceStatus,
                careAttendanceCheckIn,
                careAttendanceCheckInBy,
                careAttendanceRecordedBy,
                careAttendanceTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7);",
            params![
                school_year_id,
                person_id,
                date,
                AttendanceStatus::Present.as_str(),
                time,
                staff_id,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_absence(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        reason: Option<&str>,
        staff_id: PersonId,
    ) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO careAttendance (
                schoolYearID,
                personID,
                careAttendanceDate,
                careAttendanceStatus,
                careAttendanceAbsenceReason,
                careAttendanceRecordedBy,
                careAttendanceTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                school_year_id,
                person_id,
                date,
                AttendanceStatus::Absent.as_str(),
                reason,
                staff_id,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_check_out(
        &self,
        attendance_id: RecordId,
        time: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE careAttendance
             SET
                careAttendanceCheckOut = ?2,
                careAttendanceCheckOutBy = ?3
             WHERE careAttendanceID = ?1;",
            params![attendance_id, time, staff_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("attendance", attendance_id));
        }
        Ok(())
    }

    fn get_attendance(
        &self,
        person_id: PersonId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTENDANCE_SELECT_SQL} WHERE personID = ?1 AND careAttendanceDate = ?2;"
        ))?;
        let mut rows = stmt.query(params![person_id, date])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attendance_row(row)?));
        }
        Ok(None)
    }

    fn list_attendance(&self, query: &CareDayQuery) -> RepoResult<Vec<AttendanceRecord>> {
        self.list_day(
            ATTENDANCE_SELECT_SQL,
            "careAttendance",
            "careAttendanceCheckIn ASC, personID ASC",
            query,
            parse_attendance_row,
        )
    }

    fn create_nap(
        &self,
        school_year_id: SchoolYearId,
        person_id: PersonId,
        date: NaiveDate,
        start: NaiveTime,
        staff_id: PersonId,
    ) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO careNap (
                schoolYearID,
                personID,
                careNapDate,
                careNapStart,
                careNapRecordedBy,
                careNapTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![school_year_id, person_id, date, start, staff_id, Utc::now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_open_nap(&self, person_id: PersonId) -> RepoResult<Option<NapRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NAP_SELECT_SQL} WHERE personID = ?1 AND careNapEnd IS NULL;"
        ))?;
        let mut rows = stmt.query([person_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_nap_row(row)?));
        }
        Ok(None)
    }

    fn close_nap(
        &self,
        nap_id: RecordId,
        end: NaiveTime,
        quality: Option<NapQuality>,
        notes: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE careNap
             SET
                careNapEnd = ?2,
                careNapQuality = ?3,
                careNapNotes = COALESCE(?4, careNapNotes)
             WHERE careNapID = ?1
               AND careNapEnd IS NULL;",
            params![nap_id, end, quality.map(NapQuality::as_str), notes],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("open nap", nap_id));
        }
        Ok(())
    }

    fn list_naps(&self, query: &CareDayQuery) -> RepoResult<Vec<NapRecord>> {
        self.list_day(
            NAP_SELECT_SQL,
            "careNap",
            "careNapStart ASC, careNapID ASC",
            query,
            parse_nap_row,
        )
    }

    fn create_meal(&self, meal: &NewMeal) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO careMeal (
                schoolYearID,
                personID,
                careMealDate,
                careMealType,
                careMealQuantity,
                careMealNotes,
                careMealRecordedBy,
                careMealTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                meal.school_year_id,
                meal.person_id,
                meal.date,
                meal.meal_type.as_str(),
                meal.quantity.as_str(),
                meal.notes.as_deref(),
                meal.recorded_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_meals(&self, query: &CareDayQuery) -> RepoResult<Vec<MealRecord>> {
        self.list_day(
            MEAL_SELECT_SQL,
            "careMeal",
            "careMealTimestampCreated ASC, careMealID ASC",
            query,
            parse_meal_row,
        )
    }

    fn create_diaper(&self, diaper: &NewDiaper) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO careDiaper (
                schoolYearID,
                personID,
                careDiaperDate,
                careDiaperTime,
                careDiaperType,
                careDiaperNotes,
                careDiaperRecordedBy,
                careDiaperTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                diaper.school_year_id,
                diaper.person_id,
                diaper.date,
                diaper.time,
                diaper.diaper_type.as_str(),
                diaper.notes.as_deref(),
                diaper.recorded_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_diapers(&self, query: &CareDayQuery) -> RepoResult<Vec<DiaperRecord>> {
        self.list_day(
            DIAPER_SELECT_SQL,
            "careDiaper",
            "careDiaperTime ASC, careDiaperID ASC",
            query,
            parse_diaper_row,
        )
    }

    fn create_incident(&self, incident: &NewIncident) -> RepoResult<RecordId> {
        incident.validate()?;

        self.conn.execute(
            "INSERT INTO careIncident (
                schoolYearID,
                personID,
                careIncidentDate,
                careIncidentTime,
                careIncidentType,
                careIncidentSeverity,
                careIncidentDescription,
                careIncidentActionTaken,
                careIncidentReportedBy,
                careIncidentTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                incident.school_year_id,
                incident.person_id,
                incident.date,
                incident.time,
                incident.incident_type.as_str(),
                incident.severity.as_str(),
                incident.description.trim(),
                incident.action_taken.as_deref(),
                incident.reported_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_incident(&self, id: RecordId) -> RepoResult<Option<IncidentRecord>> {
        self.conn
            .query_row(
                &format!("{INCIDENT_SELECT_SQL} WHERE careIncidentID = ?1;"),
                [id],
                |row| Ok(parse_incident_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_incidents(&self, query: &IncidentQuery) -> RepoResult<Vec<IncidentRecord>> {
        let mut sql = format!("{INCIDENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(school_year_id) = query.school_year_id {
            sql.push_str(" AND schoolYearID = ?");
            bind_values.push(Value::Integer(school_year_id));
        }
        if let Some(person_id) = query.person_id {
            sql.push_str(" AND personID = ?");
            bind_values.push(Value::Integer(person_id));
        }
        if let Some(from) = query.date_from {
            sql.push_str(" AND careIncidentDate >= ?");
            bind_values.push(Value::Text(from.to_string()));
        }
        if let Some(to) = query.date_to {
            sql.push_str(" AND careIncidentDate <= ?");
            bind_values.push(Value::Text(to.to_string()));
        }
        if let Some(min_severity) = query.min_severity {
            let accepted = IncidentSeverity::ALL
                .iter()
                .filter(|severity| **severity >= min_severity)
                .collect::<Vec<_>>();
            sql.push_str(&format!(
                " AND careIncidentSeverity IN ({})",
                vec!["?"; accepted.len()].join(", ")
            ));
            for severity in accepted {
                bind_values.push(Value::Text(severity.as_str().to_string()));
            }
        }
        if query.unnotified_only {
            sql.push_str(" AND careIncidentParentNotifiedAt IS NULL");
        }
        sql.push_str(" ORDER BY careIncidentDate DESC, careIncidentTime DESC, careIncidentID DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next()? {
            incidents.push(parse_incident_row(row)?);
        }
        Ok(incidents)
    }

    fn set_incident_notified(&self, id: RecordId, at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE careIncident
             SET careIncidentParentNotifiedAt = ?2
             WHERE careIncidentID = ?1;",
            params![id, at],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("incident", id));
        }
        Ok(())
    }

    fn set_incident_acknowledged(&self, id: RecordId, at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE careIncident
             SET careIncidentParentAcknowledgedAt = ?2
             WHERE careIncidentID = ?1;",
            params![id, at],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("incident", id));
        }
        Ok(())
    }
}

fn parse_attendance_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: row.get("careAttendanceID")?,
        school_year_id: row.get("schoolYearID")?,
        person_id: row.get("personID")?,
        date: row.get("careAttendanceDate")?,
        status: enum_column(row, "careAttendanceStatus", AttendanceStatus::parse)?,
        check_in: row.get("careAttendanceCheckIn")?,
        check_in_by: row.get("careAttendanceCheckInBy")?,
        check_out: row.get("careAttendanceCheckOut")?,
        check_out_by: row.get("careAttendanceCheckOutBy")?,
        absence_reason: row.get("careAttendanceAbsenceReason")?,
        recorded_by: row.get("careAttendanceRecordedBy")?,
        created_at: row.get("careAttendanceTimestampCreated")?,
    })
}

fn parse_nap_row(row: &Row<'_>) -> RepoResult<NapRecord> {
    Ok(NapRecord {
        id: row.get("careNapID")?,
        school_year_id: row.get("schoolYearID")?,
        person_id: row.get("personID")?,
        date: row.get("careNapDate")?,
        start: row.get("careNapStart")?,
        end: row.get("careNapEnd")?,
        quality: optional_enum_column(row, "careNapQuality", NapQuality::parse)?,
        notes: row.get("careNapNotes")?,
        recorded_by: row.get("careNapRecordedBy")?,
        created_at: row.get("careNapTimestampCreated")?,
    })
}

fn parse_meal_row(row: &Row<'_>) -> RepoResult<MealRecord> {
    Ok(MealRecord {
        id: row.get("careMealID")?,
        school_year_id: row.get("schoolYearID")?,
        person_id: row.get("personID")?,
        date: row.get("careMealDate")?,
        meal_type: enum_column(row, "careMealType", MealType::parse)?,
        quantity: enum_column(row, "careMealQuantity", MealQuantity::parse)?,
        notes: row.get("careMealNotes")?,
        recorded_by: row.get("careMealRecordedBy")?,
        created_at: row.get("careMealTimestampCreated")?,
    })
}

fn parse_diaper_row(row: &Row<'_>) -> RepoResult<DiaperRecord> {
    Ok(DiaperRecord {
        id: row.get("careDiaperID")?,
        school_year_id: row.get("schoolYearID")?,
        person_id: row.get("personID")?,
        date: row.get("careDiaperDate")?,
        time: row.get("careDiaperTime")?,
        diaper_type: enum_column(row, "careDiaperType", DiaperType::parse)?,
        notes: row.get("careDiaperNotes")?,
        recorded_by: row.get("careDiaperRecordedBy")?,
        created_at: row.get("careDiaperTimestampCreated")?,
    })
}

fn parse_incident_row(row: &Row<'_>) -> RepoResult<IncidentRecord> {
    Ok(IncidentRecord {
        id: row.get("careIncidentID")?,
        school_year_id: row.get("schoolYearID")?,
        person_id: row.get("personID")?,
        date: row.get("careIncidentDate")?,
        time: row.get("careIncidentTime")?,
        incident_type: enum_column(row, "careIncidentType", IncidentType::parse)?,
        severity: enum_column(row, "careIncidentSeverity", IncidentSeverity::parse)?,
        description: row.get("careIncidentDescription")?,
        action_taken: row.get("careIncidentActionTaken")?,
        parent_notified_at: row.get("careIncidentParentNotifiedAt")?,
        parent_acknowledged_at: row.get("careIncidentParentAcknowledgedAt")?,
        reported_by: row.get("careIncidentReportedBy")?,
        created_at: row.get("careIncidentTimestampCreated")?,
    })
}
