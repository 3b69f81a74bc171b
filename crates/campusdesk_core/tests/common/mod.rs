#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};

pub fn seed_school_year(conn: &Connection) -> i64 {
    conn.execute(
        "INSERT INTO schoolYear (schoolYearName, schoolYearFirstDay, schoolYearLastDay)
         VALUES ('2024-2025', '2024-09-01', '2025-06-30');",
        [],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn seed_person(conn: &Connection, name: &str, role: &str) -> i64 {
    conn.execute(
        "INSERT INTO person (personPreferredName, personSurname, personRole)
         VALUES (?1, 'Tester', ?2);",
        params![name, role],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn seed_family(conn: &Connection, name: &str, account_code: Option<&str>) -> i64 {
    conn.execute(
        "INSERT INTO family (familyName, familyAccountCode) VALUES (?1, ?2);",
        params![name, account_code],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn link_child(conn: &Connection, family_id: i64, person_id: i64) {
    conn.execute(
        "INSERT INTO familyChild (familyID, personID) VALUES (?1, ?2);",
        params![family_id, person_id],
    )
    .unwrap();
}

pub fn link_adult(conn: &Connection, family_id: i64, person_id: i64) {
    conn.execute(
        "INSERT INTO familyAdult (familyID, personID) VALUES (?1, ?2);",
        params![family_id, person_id],
    )
    .unwrap();
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}
