mod common;

use campusdesk_core::db::open_db_in_memory;
use campusdesk_core::model::photo::NewPhoto;
use campusdesk_core::repo::photo_repo::SqlitePhotoRepository;
use campusdesk_core::{Actor, PhotoAction, PhotoServiceError, PhotoTagService, Role};
use common::{date, link_adult, link_child, seed_family, seed_person, seed_school_year};

fn new_photo(school_year_id: i64, path: &str) -> NewPhoto {
    NewPhoto {
        school_year_id,
        file_path: path.to_string(),
        caption: Some("Autumn walk".to_string()),
        taken_on: Some(date(2024, 10, 3)),
        uploaded_by: 0,
    }
}

#[test]
fn only_staff_and_admin_upload_and_tag() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let staff = Actor::new(seed_person(&conn, "Lena", "Staff"), Role::Staff);
    let parent = Actor::new(seed_person(&conn, "Ada", "Parent"), Role::Parent);
    let child = seed_person(&conn, "Amara", "Student");
    let service = PhotoTagService::new(SqlitePhotoRepository::new(&conn));

    let denied = service
        .upload(&parent, &new_photo(year, "photos/1.jpg"))
        .unwrap_err();
    assert!(matches!(
        denied,
        PhotoServiceError::Forbidden {
            role: Role::Parent,
            action: PhotoAction::Upload
        }
    ));

    let photo = service.upload(&staff, &new_photo(year, "photos/1.jpg")).unwrap();
    assert_eq!(photo.uploaded_by, staff.person_id);

    assert!(service.tag(&staff, photo.id, child).unwrap());
    assert!(!service.tag(&staff, photo.id, child).unwrap());
    assert_eq!(service.tags(&staff, photo.id).unwrap().len(), 1);

    assert!(matches!(
        service.tag(&parent, photo.id, child),
        Err(PhotoServiceError::Forbidden { .. })
    ));
    assert!(matches!(
        service.tag(&staff, 777, child),
        Err(PhotoServiceError::PhotoNotFound(777))
    ));
}

#[test]
fn untag_and_delete_follow_role_rules() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let staff = Actor::new(seed_person(&conn, "Lena", "Staff"), Role::Staff);
    let admin = Actor::new(seed_person(&conn, "Omar", "Admin"), Role::Admin);
    let child = seed_person(&conn, "Amara", "Student");
    let service = PhotoTagService::new(SqlitePhotoRepository::new(&conn));

    let photo = service.upload(&staff, &new_photo(year, "photos/2.jpg")).unwrap();
    service.tag(&staff, photo.id, child).unwrap();

    service.untag(&staff, photo.id, child).unwrap();
    assert!(matches!(
        service.untag(&staff, photo.id, child),
        Err(PhotoServiceError::TagNotFound { .. })
    ));
    service.tag(&staff, photo.id, child).unwrap();

    assert!(matches!(
        service.delete(&staff, photo.id),
        Err(PhotoServiceError::Forbidden {
            action: PhotoAction::Delete,
            ..
        })
    ));
    service.delete(&admin, photo.id).unwrap();
    assert!(matches!(
        service.view(&admin, photo.id),
        Err(PhotoServiceError::PhotoNotFound(_))
    ));

    let orphan_tags: i64 = conn
        .query_row("SELECT COUNT(*) FROM photoTag;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(orphan_tags, 0);
}

#[test]
fn viewers_only_see_photos_they_are_entitled_to() {
    let conn = open_db_in_memory().unwrap();
    let year = seed_school_year(&conn);
    let staff = Actor::new(seed_person(&conn, "Lena", "Staff"), Role::Staff);
    let parent_id = seed_person(&conn, "Ada", "Parent");
    let parent = Actor::new(parent_id, Role::Parent);
    let own_child = seed_person(&conn, "Amara", "Student");
    let other_child = seed_person(&conn, "Tomas", "Student");
    let family = seed_family(&conn, "Okafor", None);
    link_adult(&conn, family, parent_id);
    link_child(&conn, family, own_child);
    let student = Actor::new(other_child, Role::Student);
    let service = PhotoTagService::new(SqlitePhotoRepository::new(&conn));

    let both = service.upload(&staff, &new_photo(year, "photos/both.jpg")).unwrap();
    service.tag(&staff, both.id, own_child).unwrap();
    service.tag(&staff, both.id, other_child).unwrap();
    let others_only = service.upload(&staff, &new_photo(year, "photos/other.jpg")).unwrap();
    service.tag(&staff, others_only.id, other_child).unwrap();
    let untagged = service.upload(&staff, &new_photo(year, "photos/none.jpg")).unwrap();

    assert_eq!(service.photos_for_viewer(&staff, year).unwrap().len(), 3);

    let parent_view = service.photos_for_viewer(&parent, year).unwrap();
    assert_eq!(
        parent_view.iter().map(|photo| photo.id).collect::<Vec<_>>(),
        vec![both.id]
    );
    assert!(service.view(&parent, both.id).is_ok());
    assert!(matches!(
        service.view(&parent, others_only.id),
        Err(PhotoServiceError::PhotoNotFound(_))
    ));

    let mut student_view = service
        .photos_for_viewer(&student, year)
        .unwrap()
        .into_iter()
        .map(|photo| photo.id)
        .collect::<Vec<_>>();
    student_view.sort_unstable();
    assert_eq!(student_view, vec![both.id, others_only.id]);

    let untagged_list = service.untagged(&staff, year).unwrap();
    assert_eq!(
        untagged_list.iter().map(|photo| photo.id).collect::<Vec<_>>(),
        vec![untagged.id]
    );
    assert!(matches!(
        service.untagged(&parent, year),
        Err(PhotoServiceError::Forbidden {
            action: PhotoAction::ViewUntagged,
            ..
        })
    ));
    assert!(matches!(
        service.view(&student, untagged.id),
        Err(PhotoServiceError::PhotoNotFound(_))
    ));
}
