mod common;

use campusdesk_core::db::open_db_in_memory;
use campusdesk_core::model::care::{
    AttendanceStatus, DiaperType, IncidentSeverity, IncidentType, MealQuantity, MealType,
    NapQuality, NewDiaper, NewIncident, NewMeal,
};
use campusdesk_core::repo::care_repo::SqliteCareRepository;
use campusdesk_core::{CareService, CareServiceError, ValidationError};
use common::{date, seed_person, seed_school_year, time};

#[test]
fn check_in_and_out_records_one_row_per_day() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Amara", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);
    let day = date(2024, 10, 7);

    let checked_in = service.check_in(child, day, time(8, 15), staff).unwrap();
    assert!(checked_in.is_on_site());
    assert_eq!(checked_in.status, AttendanceStatus::Present);

    let again = service.check_in(child, day, time(8, 30), staff).unwrap_err();
    assert!(matches!(again, CareServiceError::AlreadyRecorded { .. }));

    let checked_out = service.check_out(child, day, time(16, 45), staff).unwrap();
    assert!(!checked_out.is_on_site());
    assert_eq!(checked_out.minutes_on_site(), Some(510));
    assert_eq!(checked_out.check_out_by, Some(staff));

    let twice = service.check_out(child, day, time(17, 0), staff).unwrap_err();
    assert!(matches!(twice, CareServiceError::AlreadyCheckedOut { .. }));
    assert_eq!(service.attendance_on(day).unwrap().len(), 1);
}

#[test]
fn check_out_requires_check_in_and_later_time() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Tomas", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);
    let day = date(2024, 10, 8);

    let missing = service.check_out(child, day, time(16, 0), staff).unwrap_err();
    assert!(matches!(missing, CareServiceError::NotCheckedIn { .. }));

    service.check_in(child, day, time(9, 0), staff).unwrap();
    let early = service.check_out(child, day, time(8, 59), staff).unwrap_err();
    assert!(matches!(early, CareServiceError::EndBeforeStart { .. }));
}

#[test]
fn absent_child_cannot_check_in_or_get_meals_logged() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Noor", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);
    let day = date(2024, 10, 9);

    let absent = service.mark_absent(child, day, Some("  fever "), staff).unwrap();
    assert_eq!(absent.status, AttendanceStatus::Absent);
    assert_eq!(absent.recorded_by, staff);
    assert_eq!(absent.absence_reason.as_deref(), Some("fever"));

    assert!(matches!(
        service.check_in(child, day, time(8, 0), staff),
        Err(CareServiceError::AlreadyRecorded { .. })
    ));
    let meal = service
        .log_meal(&NewMeal {
            school_year_id: year,
            person_id: child,
            date: day,
            meal_type: MealType::Lunch,
            quantity: MealQuantity::All,
            notes: None,
            recorded_by: staff,
        })
        .unwrap_err();
    assert!(matches!(meal, CareServiceError::MarkedAbsent { .. }));
}

#[test]
fn only_one_open_nap_per_child() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Ines", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);
    let day = date(2024, 10, 10);

    let nap = service.start_nap(child, day, time(12, 30), staff).unwrap();
    assert!(nap.is_open());

    let second = service.start_nap(child, day, time(12, 45), staff).unwrap_err();
    assert!(matches!(
        second,
        CareServiceError::NapAlreadyOpen { nap_id, .. } if nap_id == nap.id
    ));

    let early = service
        .end_nap(child, time(12, 0), None, None)
        .unwrap_err();
    assert!(matches!(early, CareServiceError::EndBeforeStart { .. }));

    let closed = service
        .end_nap(child, time(14, 0), Some(NapQuality::Sound), Some("slept well"))
        .unwrap();
    assert_eq!(closed.duration_minutes(), Some(90));
    assert_eq!(closed.quality, Some(NapQuality::Sound));

    assert!(matches!(
        service.end_nap(child, time(15, 0), None, None),
        Err(CareServiceError::NoOpenNap(_))
    ));
    service.start_nap(child, day, time(15, 30), staff).unwrap();
}

#[test]
fn incident_notification_precedes_acknowledgement() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Kai", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);

    let mut incident = NewIncident {
        school_year_id: year,
        person_id: child,
        date: date(2024, 10, 11),
        time: time(10, 20),
        incident_type: IncidentType::Injury,
        severity: IncidentSeverity::Moderate,
        description: "   ".to_string(),
        action_taken: Some("ice pack".to_string()),
        reported_by: staff,
    };
    let blank = service.report_incident(&incident).unwrap_err();
    assert!(matches!(
        blank,
        CareServiceError::Validation(ValidationError::EmptyField(_))
    ));

    incident.description = "Scraped knee on the playground".to_string();
    let reported = service.report_incident(&incident).unwrap();
    assert!(!reported.is_parent_notified());
    assert_eq!(service.pending_notifications().unwrap().len(), 1);

    let early = service.acknowledge_incident(reported.id).unwrap_err();
    assert!(matches!(early, CareServiceError::ParentNotNotified(_)));

    let notified = service.mark_parent_notified(reported.id).unwrap();
    let notified_at = notified.parent_notified_at.unwrap();
    let repeated = service.mark_parent_notified(reported.id).unwrap();
    assert_eq!(repeated.parent_notified_at, Some(notified_at));
    assert!(service.pending_notifications().unwrap().is_empty());

    let acknowledged = service.acknowledge_incident(reported.id).unwrap();
    assert!(acknowledged.parent_acknowledged_at.is_some());

    assert!(matches!(
        service.mark_parent_notified(9_999),
        Err(CareServiceError::IncidentNotFound(9_999))
    ));
}

#[test]
fn daily_summary_collects_the_whole_day() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let child = seed_person(&conn, "Sami", "Student");
    let other = seed_person(&conn, "Rue", "Student");
    let staff = seed_person(&conn, "Lena", "Staff");
    let service = CareService::new(SqliteCareRepository::new(&conn), year);
    let day = date(2024, 10, 14);

    service.check_in(child, day, time(7, 45), staff).unwrap();
    service.start_nap(child, day, time(12, 0), staff).unwrap();
    service.end_nap(child, time(12, 40), Some(NapQuality::Light), None).unwrap();
    service.start_nap(child, day, time(15, 0), staff).unwrap();
    service.end_nap(child, time(15, 20), None, None).unwrap();
    for meal_type in [MealType::Breakfast, MealType::Lunch] {
        service
            .log_meal(&NewMeal {
                school_year_id: year,
                person_id: child,
                date: day,
                meal_type,
                quantity: MealQuantity::Most,
                notes: None,
                recorded_by: staff,
            })
            .unwrap();
    }
    for (person_id, at) in [(child, time(10, 0)), (child, time(13, 0)), (other, time(13, 5))] {
        service
            .log_diaper(&NewDiaper {
                school_year_id: year,
                person_id,
                date: day,
                time: at,
                diaper_type: DiaperType::Wet,
                notes: None,
                recorded_by: staff,
            })
            .unwrap();
    }

    let summary = service.daily_summary(child, day).unwrap();
    assert!(summary.attendance.unwrap().is_on_site());
    assert_eq!(summary.naps.len(), 2);
    assert_eq!(summary.minutes_slept, 60);
    assert_eq!(summary.meals.len(), 2);
    assert_eq!(summary.diaper_changes, 2);
    assert!(summary.incidents.is_empty());

    assert_eq!(service.diapers_on(day).unwrap().len(), 3);
    assert_eq!(service.naps_on(day).unwrap().len(), 2);
    assert_eq!(service.meals_on(day).unwrap().len(), 2);
}
