//! Photo metadata and tag gateway.
//!
//! # Invariants
//! - A person is tagged at most once per photo (unique index).
//! - Deleting a photo removes its tags (`ON DELETE CASCADE`).

use super::{RepoError, RepoResult};
use crate::model::photo::{NewPhoto, Photo, PhotoTag};
use crate::model::{PersonId, RecordId, SchoolYearId};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const PHOTO_SELECT_SQL: &str = "SELECT
    photo.photoID,
    photo.schoolYearID,
    photo.photoFilePath,
    photo.photoCaption,
    photo.photoTakenOn,
    photo.photoUploadedBy,
    photo.photoTimestampCreated
FROM photo";

const TAG_SELECT_SQL: &str = "SELECT
    photoTagID,
    photoID,
    personID,
    photoTagTaggedBy,
    photoTagTimestampCreated
FROM photoTag";

/// Gateway interface for photo metadata and tags.
pub trait PhotoRepository {
    fn create_photo(&self, photo: &NewPhoto) -> RepoResult<RecordId>;
    fn get_photo(&self, id: RecordId) -> RepoResult<Option<Photo>>;
    fn delete_photo(&self, id: RecordId) -> RepoResult<()>;
    fn list_photos(&self, school_year_id: SchoolYearId) -> RepoResult<Vec<Photo>>;
    /// Photos in which `person_id` is tagged.
    fn list_photos_for_person(&self, person_id: PersonId) -> RepoResult<Vec<Photo>>;
    /// Photos of the school year with no tag at all.
    fn list_untagged_photos(&self, school_year_id: SchoolYearId) -> RepoResult<Vec<Photo>>;
    /// Creates a tag; returns `None` if the person was already tagged.
    fn create_tag(
        &self,
        photo_id: RecordId,
        person_id: PersonId,
        tagged_by: PersonId,
    ) -> RepoResult<Option<RecordId>>;
    fn delete_tag(&self, photo_id: RecordId, person_id: PersonId) -> RepoResult<()>;
    fn list_tags(&self, photo_id: RecordId) -> RepoResult<Vec<PhotoTag>>;
    /// Children linked to a parent through shared families.
    fn list_children_of_parent(&self, parent_id: PersonId) -> RepoResult<Vec<PersonId>>;
}

pub struct SqlitePhotoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePhotoRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_photos(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Photo>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut photos = Vec::new();
        while let Some(row) = rows.next()? {
            photos.push(parse_photo_row(row)?);
        }
        Ok(photos)
    }
}

impl PhotoRepository for SqlitePhotoRepository<'_> {
    fn create_photo(&self, photo: &NewPhoto) -> RepoResult<RecordId> {
        photo.validate()?;

        self.conn.execute(
            "INSERT INTO photo (
                schoolYearID,
                photoFilePath,
                photoCaption,
                photoTakenOn,
                photoUploadedBy,
                photoTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                photo.school_year_id,
                photo.file_path.trim(),
                photo.caption.as_deref(),
                photo.taken_on,
                photo.uploaded_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_photo(&self, id: RecordId) -> RepoResult<Option<Photo>> {
        Ok(self
            .conn
            .query_row(
                &format!("{PHOTO_SELECT_SQL} WHERE photo.photoID = ?1;"),
                [id],
                parse_photo_row,
            )
            .optional()?)
    }

    fn delete_photo(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM photo WHERE photoID = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("photo", id));
        }
        Ok(())
    }

    fn list_photos(&self, school_year_id: SchoolYearId) -> RepoResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "{PHOTO_SELECT_SQL}
                 WHERE photo.schoolYearID = ?1
                 ORDER BY photo.photoTimestampCreated DESC, photo.photoID DESC;"
            ),
            [school_year_id],
        )
    }

    fn list_photos_for_person(&self, person_id: PersonId) -> RepoResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "{PHOTO_SELECT_SQL}
                 INNER JOIN photoTag ON photoTag.photoID = photo.photoID
                 WHERE photoTag.personID = ?1
                 ORDER BY photo.photoTimestampCreated DESC, photo.photoID DESC;"
            ),
            [person_id],
        )
    }

    fn list_untagged_photos(&self, school_year_id: SchoolYearId) -> RepoResult<Vec<Photo>> {
        self.query_photos(
            &format!(
                "{PHOTO_SELECT_SQL}
                 WHERE photo.schoolYearID = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM photoTag WHERE photoTag.photoID = photo.photoID
                   )
                 ORDER BY photo.photoTimestampCreated DESC, photo.photoID DESC;"
            ),
            [school_year_id],
        )
    }

    fn create_tag(
        &self,
        photo_id: RecordId,
        person_id: PersonId,
        tagged_by: PersonId,
    ) -> RepoResult<Option<RecordId>> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO photoTag (
                photoID,
                personID,
                photoTagTaggedBy,
                photoTagTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4);",
            params![photo_id, person_id, tagged_by, Utc::now()],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn delete_tag(&self, photo_id: RecordId, person_id: PersonId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM photoTag WHERE photoID = ?1 AND personID = ?2;",
            params![photo_id, person_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("photo tag", photo_id));
        }
        Ok(())
    }

    fn list_tags(&self, photo_id: RecordId) -> RepoResult<Vec<PhotoTag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL} WHERE photoID = ?1 ORDER BY photoTagID ASC;"
        ))?;
        let tags = stmt
            .query_map([photo_id], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn list_children_of_parent(&self, parent_id: PersonId) -> RepoResult<Vec<PersonId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT familyChild.personID
             FROM familyAdult
             INNER JOIN familyChild ON familyChild.familyID = familyAdult.familyID
             WHERE familyAdult.personID = ?1
             ORDER BY familyChild.personID ASC;",
        )?;
        let children = stmt
            .query_map([parent_id], |row| row.get(0))?
            .collect::<Result<Vec<PersonId>, _>>()?;
        Ok(children)
    }
}

fn parse_photo_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        school_year_id: row.get(1)?,
        file_path: row.get(2)?,
        caption: row.get(3)?,
        taken_on: row.get(4)?,
        uploaded_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<PhotoTag> {
    Ok(PhotoTag {
        id: row.get("photoTagID")?,
        photo_id: row.get("photoID")?,
        person_id: row.get("personID")?,
        tagged_by: row.get("photoTagTaggedBy")?,
        created_at: row.get("photoTagTimestampCreated")?,
    })
}
