//! In-process store used when no database is configured, and by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{
    BloodRequest, DonorFilter, DonorListing, DonorProfile, DonorProfileChanges, Event,
    NewBloodRequest, NewDonorProfile, NewEvent, NewUser, User,
};
use super::store::{Store, StoreError, UniqueField};

/// Collections are `Vec`s so listing keeps insertion order.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    donor_profiles: RwLock<Vec<DonorProfile>>,
    blood_requests: RwLock<Vec<BloodRequest>>,
    events: RwLock<Vec<Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(UniqueField::UserEmail));
        }
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            location: user.location,
            account_type: user.account_type,
            profile_image: user.profile_image,
            created_at: Utc::now(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_donor_profile(
        &self,
        profile: NewDonorProfile,
    ) -> Result<DonorProfile, StoreError> {
        // Check and insert under one write guard.
        let mut profiles = self.donor_profiles.write().await;
        if profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Err(StoreError::Conflict(UniqueField::DonorProfileUser));
        }
        let record = profile.into_profile(Uuid::new_v4(), Utc::now());
        profiles.push(record.clone());
        Ok(record)
    }

    async fn update_donor_profile(
        &self,
        id: Uuid,
        changes: DonorProfileChanges,
    ) -> Result<Option<DonorProfile>, StoreError> {
        let mut profiles = self.donor_profiles.write().await;
        Ok(profiles.iter_mut().find(|p| p.id == id).map(|profile| {
            changes.apply_to(profile);
            profile.clone()
        }))
    }

    async fn find_donor_profile_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DonorProfile>, StoreError> {
        let profiles = self.donor_profiles.read().await;
        Ok(profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn search_donors(&self, filter: &DonorFilter) -> Result<Vec<DonorListing>, StoreError> {
        let users = self.users.read().await;
        let owners: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();
        let profiles = self.donor_profiles.read().await;

        Ok(profiles
            .iter()
            .filter_map(|profile| {
                let owner = owners.get(&profile.user_id);
                let location = owner.map(|u| u.location.as_str());
                filter.matches(profile, location).then(|| DonorListing {
                    profile: profile.clone(),
                    name: owner.map(|u| u.name.clone()),
                    location: location.map(str::to_string),
                })
            })
            .collect())
    }

    async fn insert_blood_request(
        &self,
        request: NewBloodRequest,
    ) -> Result<BloodRequest, StoreError> {
        let record = request.into_request(Uuid::new_v4(), Utc::now());
        self.blood_requests.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_blood_requests(&self) -> Result<Vec<BloodRequest>, StoreError> {
        Ok(self.blood_requests.read().await.clone())
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let record = event.into_event(Uuid::new_v4(), Utc::now());
        self.events.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.events.read().await.clone())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        drop(self.users.read().await);
        Ok(start.elapsed())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountType;
    use std::sync::Arc;

    fn new_user(email: &str, location: &str) -> NewUser {
        NewUser {
            name: "Test Donor".to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            location: location.to_string(),
            account_type: AccountType::Donor,
            profile_image: None,
        }
    }

    fn new_profile(user_id: Uuid, blood_type: &str) -> NewDonorProfile {
        NewDonorProfile {
            user_id,
            fields: DonorProfileChanges {
                blood_type: Some(Some(blood_type.to_string())),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        let first = store.insert_user(new_user("a@x.org", "Albany")).await.unwrap();
        let err = store
            .insert_user(new_user("a@x.org", "Boston"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::UserEmail)));

        let found = store.find_user_by_email("a@x.org").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found.location, "Albany");
    }

    #[tokio::test]
    async fn test_concurrent_profile_creates_yield_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_donor_profile(new_profile(user_id, "A+")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_profile_returns_none() {
        let store = MemoryStore::new();
        let result = store
            .update_donor_profile(Uuid::new_v4(), DonorProfileChanges::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_search_joins_owner_location() {
        let store = MemoryStore::new();
        let albany = store.insert_user(new_user("a@x.org", "Albany")).await.unwrap();
        let boston = store.insert_user(new_user("b@x.org", "Boston")).await.unwrap();
        store.insert_donor_profile(new_profile(albany.id, "O+")).await.unwrap();
        store.insert_donor_profile(new_profile(boston.id, "O+")).await.unwrap();

        let filter = DonorFilter {
            search_term: Some("NY".to_string()),
            ..Default::default()
        };
        let found = store.search_donors(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.as_deref(), Some("Albany"));
        assert_eq!(found[0].name.as_deref(), Some("Test Donor"));
    }

    #[tokio::test]
    async fn test_lists_keep_insertion_order() {
        let store = MemoryStore::new();
        for title in ["first", "second", "third"] {
            store
                .insert_event(NewEvent {
                    title: title.to_string(),
                    date: Utc::now(),
                    location: "Hall".to_string(),
                    description: "-".to_string(),
                    kind: crate::db::models::EventType::Awareness,
                    expected_attendees: 10,
                })
                .await
                .unwrap();
        }
        let titles: Vec<_> = store
            .list_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }
}
