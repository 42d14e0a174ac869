//! Per-page client state. Each view owns its data and talks to the API
//! through [`ApiClient`]; nothing is shared between pages. On any failed
//! call a view keeps the state it had before.

use uuid::Uuid;

use super::{ApiClient, ClientError};
use crate::db::models::{
    BloodRequest, BloodRequestInput, DonorListing, DonorProfile, DonorProfileInput, Event,
    EventInput,
};
use crate::routes::donors::DonorSearchQuery;

/// Donor search page, also the recipient dashboard.
#[derive(Debug, Clone)]
pub struct DonorSearch {
    query: DonorSearchQuery,
    results: Vec<DonorListing>,
}

impl Default for DonorSearch {
    /// All blood types, available donors only, no search term.
    fn default() -> Self {
        Self {
            query: DonorSearchQuery {
                blood_type: Some("all".to_string()),
                available_only: Some("true".to_string()),
                search_term: None,
            },
            results: Vec::new(),
        }
    }
}

impl DonorSearch {
    /// Build with the default filter and fetch the first page of results.
    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        let mut view = Self::default();
        view.results = client.search_donors(&view.query).await?;
        Ok(view)
    }

    pub fn query(&self) -> &DonorSearchQuery {
        &self.query
    }

    pub fn results(&self) -> &[DonorListing] {
        &self.results
    }

    /// Re-fetch with the current filter.
    pub async fn refresh(&mut self, client: &ApiClient) -> Result<(), ClientError> {
        self.results = client.search_donors(&self.query).await?;
        Ok(())
    }

    /// Apply a new filter; fetches only when it differs from the current one.
    pub async fn set_query(
        &mut self,
        client: &ApiClient,
        query: DonorSearchQuery,
    ) -> Result<(), ClientError> {
        if query == self.query {
            return Ok(());
        }
        let results = client.search_donors(&query).await?;
        self.query = query;
        self.results = results;
        Ok(())
    }
}

/// A list page whose newest submissions are shown first.
#[derive(Debug, Clone)]
pub struct Board<T> {
    items: Vec<T>,
}

impl<T> Board<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn prepend(&mut self, item: T) -> &T {
        self.items.insert(0, item);
        &self.items[0]
    }
}

pub type BloodRequestBoard = Board<BloodRequest>;
pub type EventBoard = Board<Event>;

impl Board<BloodRequest> {
    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        Ok(Self {
            items: client.blood_requests().await?,
        })
    }

    pub async fn submit(
        &mut self,
        client: &ApiClient,
        input: &BloodRequestInput,
    ) -> Result<&BloodRequest, ClientError> {
        let created = client.create_blood_request(input).await?;
        Ok(self.prepend(created))
    }
}

impl Board<Event> {
    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        Ok(Self {
            items: client.events().await?,
        })
    }

    pub async fn submit(
        &mut self,
        client: &ApiClient,
        input: &EventInput,
    ) -> Result<&Event, ClientError> {
        let created = client.create_event(input).await?;
        Ok(self.prepend(created))
    }
}

/// Donor's own profile page.
#[derive(Debug, Clone)]
pub struct DonorDashboard {
    user_id: Uuid,
    profile: Option<DonorProfile>,
}

impl DonorDashboard {
    /// Fetch the user's profile; a user without one starts with `None`.
    pub async fn load(client: &ApiClient, user_id: Uuid) -> Result<Self, ClientError> {
        Ok(Self {
            user_id,
            profile: client.donor_profile_for(user_id).await?,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn profile(&self) -> Option<&DonorProfile> {
        self.profile.as_ref()
    }

    /// Create the profile on first save, update it afterwards.
    pub async fn save(
        &mut self,
        client: &ApiClient,
        mut input: DonorProfileInput,
    ) -> Result<&DonorProfile, ClientError> {
        let saved = match &self.profile {
            Some(existing) => {
                input.user_id = None;
                client.update_donor_profile(existing.id, &input).await?
            }
            None => {
                input.user_id = Some(self.user_id.to_string());
                client.create_donor_profile(&input).await?
            }
        };
        Ok(self.profile.insert(saved))
    }

    /// Flip availability. Local state changes only after the server accepts
    /// the update.
    pub async fn toggle_availability(&mut self, client: &ApiClient) -> Result<bool, ClientError> {
        let current = self.profile.as_ref().ok_or(ClientError::NoProfile)?;
        let input = DonorProfileInput {
            available: Some(!current.available),
            ..Default::default()
        };
        let updated = client.update_donor_profile(current.id, &input).await?;
        let available = updated.available;
        self.profile = Some(updated);
        tracing::info!(user_id = %self.user_id, available, "availability changed");
        Ok(available)
    }
}
