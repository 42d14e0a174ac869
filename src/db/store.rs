use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::models::{
    BloodRequest, DonorFilter, DonorListing, DonorProfile, DonorProfileChanges, Event,
    NewBloodRequest, NewDonorProfile, NewEvent, NewUser, User,
};

/// Uniqueness rule a write can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    UserEmail,
    DonorProfileUser,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Conflict(UniqueField),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for the four collections.
///
/// Uniqueness of `User.email` and `DonorProfile.user_id` is enforced here,
/// atomically with the insert; violations come back as
/// [`StoreError::Conflict`].
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert_donor_profile(
        &self,
        profile: NewDonorProfile,
    ) -> Result<DonorProfile, StoreError>;

    /// Returns `None` when no profile has this id.
    async fn update_donor_profile(
        &self,
        id: Uuid,
        changes: DonorProfileChanges,
    ) -> Result<Option<DonorProfile>, StoreError>;

    async fn find_donor_profile_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DonorProfile>, StoreError>;

    /// Matching profiles in insertion order, joined with their owner's
    /// name and location.
    async fn search_donors(&self, filter: &DonorFilter) -> Result<Vec<DonorListing>, StoreError>;

    async fn insert_blood_request(
        &self,
        request: NewBloodRequest,
    ) -> Result<BloodRequest, StoreError>;

    async fn list_blood_requests(&self) -> Result<Vec<BloodRequest>, StoreError>;

    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError>;

    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;

    /// Round-trip to the backend; used by the readiness probe.
    async fn ping(&self) -> Result<Duration, StoreError>;

    fn backend_name(&self) -> &'static str;
}
