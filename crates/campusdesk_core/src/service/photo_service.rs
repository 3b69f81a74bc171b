//! Photo tagging use-cases behind the access rules in `photo_access`.
//!
//! # Invariants
//! - Every mutation checks `PhotoAction::permits` before touching storage.
//! - Viewer listings only contain photos `can_view_photo` allows.

use super::photo_access::{can_view_photo, Actor, PhotoAction};
use crate::model::photo::{NewPhoto, Photo, PhotoTag};
use crate::model::{PersonId, RecordId, Role, SchoolYearId, ValidationError};
use crate::repo::photo_repo::PhotoRepository;
use crate::repo::RepoError;
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum PhotoServiceError {
    Forbidden { role: Role, action: PhotoAction },
    /// The photo is missing or hidden from the viewer.
    PhotoNotFound(RecordId),
    TagNotFound { photo_id: RecordId, person_id: PersonId },
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for PhotoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { role, action } => write!(f, "{role} may not {action} photos"),
            Self::PhotoNotFound(id) => write!(f, "photo not found: {id}"),
            Self::TagNotFound {
                photo_id,
                person_id,
            } => write!(f, "person {person_id} is not tagged in photo {photo_id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PhotoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PhotoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type PhotoResult<T> = Result<T, PhotoServiceError>;

pub struct PhotoTagService<R: PhotoRepository> {
    repo: R,
}

impl<R: PhotoRepository> PhotoTagService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores photo metadata uploaded by `actor`.
    pub fn upload(&self, actor: &Actor, photo: &NewPhoto) -> PhotoResult<Photo> {
        require(actor, PhotoAction::Upload)?;
        let photo = NewPhoto {
            uploaded_by: actor.person_id,
            ..photo.clone()
        };
        let id = self.repo.create_photo(&photo)?;
        info!(
            "event=photo_upload module=photo status=ok photo_id={} uploaded_by={}",
            id, actor.person_id
        );
        self.existing(id)
    }

    /// Tags `person_id`; returns `false` when they were already tagged.
    pub fn tag(&self, actor: &Actor, photo_id: RecordId, person_id: PersonId) -> PhotoResult<bool> {
        require(actor, PhotoAction::Tag)?;
        self.existing(photo_id)?;
        let created = self
            .repo
            .create_tag(photo_id, person_id, actor.person_id)?
            .is_some();
        info!(
            "event=photo_tag module=photo status=ok photo_id={} person_id={} created={}",
            photo_id, person_id, created
        );
        Ok(created)
    }

    pub fn untag(&self, actor: &Actor, photo_id: RecordId, person_id: PersonId) -> PhotoResult<()> {
        require(actor, PhotoAction::RemoveTag)?;
        self.existing(photo_id)?;
        self.repo
            .delete_tag(photo_id, person_id)
            .map_err(|err| match err {
                RepoError::NotFound { .. } => PhotoServiceError::TagNotFound {
                    photo_id,
                    person_id,
                },
                other => other.into(),
            })?;
        info!("event=photo_untag module=photo status=ok photo_id={photo_id} person_id={person_id}");
        Ok(())
    }

    /// Deletes the photo together with its tags.
    pub fn delete(&self, actor: &Actor, photo_id: RecordId) -> PhotoResult<()> {
        require(actor, PhotoAction::Delete)?;
        self.repo.delete_photo(photo_id).map_err(|err| match err {
            RepoError::NotFound { .. } => PhotoServiceError::PhotoNotFound(photo_id),
            other => other.into(),
        })?;
        info!(
            "event=photo_delete module=photo status=ok photo_id={} deleted_by={}",
            photo_id, actor.person_id
        );
        Ok(())
    }

    /// Returns the photo if `actor` may see it.
    pub fn view(&self, actor: &Actor, photo_id: RecordId) -> PhotoResult<Photo> {
        let photo = self.existing(photo_id)?;
        let tagged = self.tagged_people(photo_id)?;
        if !can_view_photo(actor, &tagged, &self.children_of(actor)?) {
            return Err(PhotoServiceError::PhotoNotFound(photo_id));
        }
        Ok(photo)
    }

    pub fn tags(&self, actor: &Actor, photo_id: RecordId) -> PhotoResult<Vec<PhotoTag>> {
        self.view(actor, photo_id)?;
        Ok(self.repo.list_tags(photo_id)?)
    }

    /// Photos of the school year visible to `actor`, newest first.
    pub fn photos_for_viewer(
        &self,
        actor: &Actor,
        school_year_id: SchoolYearId,
    ) -> PhotoResult<Vec<Photo>> {
        if PhotoAction::ViewAll.permits(actor.role) {
            return Ok(self.repo.list_photos(school_year_id)?);
        }

        let people = match actor.role {
            Role::Parent => self.children_of(actor)?,
            _ => vec![actor.person_id],
        };
        let mut seen = BTreeSet::new();
        let mut photos = Vec::new();
        for person_id in people {
            for photo in self.repo.list_photos_for_person(person_id)? {
                if photo.school_year_id == school_year_id && seen.insert(photo.id) {
                    photos.push(photo);
                }
            }
        }
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(photos)
    }

    pub fn untagged(&self, actor: &Actor, school_year_id: SchoolYearId) -> PhotoResult<Vec<Photo>> {
        require(actor, PhotoAction::ViewUntagged)?;
        Ok(self.repo.list_untagged_photos(school_year_id)?)
    }

    fn existing(&self, photo_id: RecordId) -> PhotoResult<Photo> {
        self.repo
            .get_photo(photo_id)?
            .ok_or(PhotoServiceError::PhotoNotFound(photo_id))
    }

    fn tagged_people(&self, photo_id: RecordId) -> PhotoResult<Vec<PersonId>> {
        Ok(self
            .repo
            .list_tags(photo_id)?
            .into_iter()
            .map(|tag| tag.person_id)
            .collect())
    }

    fn children_of(&self, actor: &Actor) -> PhotoResult<Vec<PersonId>> {
        if actor.role != Role::Parent {
            return Ok(Vec::new());
        }
        Ok(self.repo.list_children_of_parent(actor.person_id)?)
    }
}

fn require(actor: &Actor, action: PhotoAction) -> PhotoResult<()> {
    if action.permits(actor.role) {
        return Ok(());
    }
    Err(PhotoServiceError::Forbidden {
        role: actor.role,
        action,
    })
}
