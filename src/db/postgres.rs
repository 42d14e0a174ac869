use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::models::{
    AccountType, BloodRequest, DonationType, DonorFilter, DonorListing, DonorProfile,
    DonorProfileChanges, Event, EventType, NewBloodRequest, NewDonorProfile, NewEvent, NewUser,
    Urgency, User,
};
use super::store::{Store, StoreError, UniqueField};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    location: String,
    account_type: String,
    profile_image: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            location: row.location,
            account_type: row
                .account_type
                .parse::<AccountType>()
                .map_err(|e| StoreError::Corrupt(format!("users.account_type {}", e)))?,
            profile_image: row.profile_image,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DonorProfileRow {
    id: Uuid,
    user_id: Uuid,
    age: Option<String>,
    blood_type: Option<String>,
    last_donation: Option<String>,
    sickness: Option<String>,
    medication: Option<String>,
    donation_type: Option<String>,
    available: bool,
    contact_phone: Option<String>,
    donation_number: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DonorProfileRow> for DonorProfile {
    type Error = StoreError;

    fn try_from(row: DonorProfileRow) -> Result<Self, Self::Error> {
        let donation_type = row
            .donation_type
            .map(|t| t.parse::<DonationType>())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("donor_profiles.donation_type {}", e)))?;
        Ok(DonorProfile {
            id: row.id,
            user_id: row.user_id,
            age: row.age,
            blood_type: row.blood_type,
            last_donation: row.last_donation,
            sickness: row.sickness,
            medication: row.medication,
            donation_type,
            available: row.available,
            contact_phone: row.contact_phone,
            donation_number: row.donation_number,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DonorListingRow {
    #[sqlx(flatten)]
    profile: DonorProfileRow,
    owner_name: Option<String>,
    owner_location: Option<String>,
}

#[derive(Debug, FromRow)]
struct BloodRequestRow {
    id: Uuid,
    organization_name: String,
    blood_type: String,
    location: String,
    contact_number: String,
    price: f64,
    urgency: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BloodRequestRow> for BloodRequest {
    type Error = StoreError;

    fn try_from(row: BloodRequestRow) -> Result<Self, Self::Error> {
        Ok(BloodRequest {
            id: row.id,
            organization_name: row.organization_name,
            blood_type: row.blood_type,
            location: row.location,
            contact_number: row.contact_number,
            price: row.price,
            urgency: row
                .urgency
                .parse::<Urgency>()
                .map_err(|e| StoreError::Corrupt(format!("blood_requests.urgency {}", e)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    date: DateTime<Utc>,
    location: String,
    description: String,
    event_type: String,
    expected_attendees: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            title: row.title,
            date: row.date,
            location: row.location,
            description: row.description,
            kind: row
                .event_type
                .parse::<EventType>()
                .map_err(|e| StoreError::Corrupt(format!("events.event_type {}", e)))?,
            expected_attendees: row.expected_attendees,
            created_at: row.created_at,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Map a unique-index violation to a conflict on `field`.
fn on_unique(field: UniqueField) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict(field);
            }
        }
        StoreError::Database(e)
    }
}

/// Escape LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Split a field change into its "provided" flag and the value to store.
fn split_change<T>(change: Option<Option<T>>) -> (bool, Option<T>) {
    (change.is_some(), change.flatten())
}

const PROFILE_COLUMNS: &str = "id, user_id, age, blood_type, last_donation, sickness, \
     medication, donation_type, available, contact_phone, donation_number, created_at";

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, password_hash, location, account_type, profile_image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, email, password_hash, location, account_type, profile_image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.location)
        .bind(user.account_type.as_str())
        .bind(&user.profile_image)
        .fetch_one(&self.pool)
        .await
        .map_err(on_unique(UniqueField::UserEmail))?;

        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, location, account_type, profile_image, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn insert_donor_profile(
        &self,
        profile: NewDonorProfile,
    ) -> Result<DonorProfile, StoreError> {
        let fields = profile.fields;
        let query = format!(
            r#"
            INSERT INTO donor_profiles (id, user_id, age, blood_type, last_donation, sickness,
                medication, donation_type, available, contact_phone, donation_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, true), $10, $11)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let row = sqlx::query_as::<_, DonorProfileRow>(&query)
            .bind(Uuid::new_v4())
            .bind(profile.user_id)
            .bind(fields.age.flatten())
            .bind(fields.blood_type.flatten())
            .bind(fields.last_donation.flatten())
            .bind(fields.sickness.flatten())
            .bind(fields.medication.flatten())
            .bind(fields.donation_type.flatten().map(|t| t.as_str()))
            .bind(fields.available)
            .bind(fields.contact_phone.flatten())
            .bind(fields.donation_number.flatten())
            .fetch_one(&self.pool)
            .await
            .map_err(on_unique(UniqueField::DonorProfileUser))?;

        row.try_into()
    }

    async fn update_donor_profile(
        &self,
        id: Uuid,
        changes: DonorProfileChanges,
    ) -> Result<Option<DonorProfile>, StoreError> {
        let query = format!(
            r#"
            UPDATE donor_profiles SET
                age = CASE WHEN $2 THEN $3 ELSE age END,
                blood_type = CASE WHEN $4 THEN $5 ELSE blood_type END,
                last_donation = CASE WHEN $6 THEN $7 ELSE last_donation END,
                sickness = CASE WHEN $8 THEN $9 ELSE sickness END,
                medication = CASE WHEN $10 THEN $11 ELSE medication END,
                donation_type = CASE WHEN $12 THEN $13 ELSE donation_type END,
                available = COALESCE($14, available),
                contact_phone = CASE WHEN $15 THEN $16 ELSE contact_phone END,
                donation_number = CASE WHEN $17 THEN $18 ELSE donation_number END
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let (age_set, age) = split_change(changes.age);
        let (blood_type_set, blood_type) = split_change(changes.blood_type);
        let (last_donation_set, last_donation) = split_change(changes.last_donation);
        let (sickness_set, sickness) = split_change(changes.sickness);
        let (medication_set, medication) = split_change(changes.medication);
        let (donation_type_set, donation_type) = split_change(changes.donation_type);
        let (contact_phone_set, contact_phone) = split_change(changes.contact_phone);
        let (donation_number_set, donation_number) = split_change(changes.donation_number);

        sqlx::query_as::<_, DonorProfileRow>(&query)
            .bind(id)
            .bind(age_set)
            .bind(age)
            .bind(blood_type_set)
            .bind(blood_type)
            .bind(last_donation_set)
            .bind(last_donation)
            .bind(sickness_set)
            .bind(sickness)
            .bind(medication_set)
            .bind(medication)
            .bind(donation_type_set)
            .bind(donation_type.map(|t| t.as_str()))
            .bind(changes.available)
            .bind(contact_phone_set)
            .bind(contact_phone)
            .bind(donation_number_set)
            .bind(donation_number)
            .fetch_optional(&self.pool)
            .await?
            .map(DonorProfile::try_from)
            .transpose()
    }

    async fn find_donor_profile_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DonorProfile>, StoreError> {
        let query = format!(
            "SELECT {} FROM donor_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, DonorProfileRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(DonorProfile::try_from)
            .transpose()
    }

    async fn search_donors(&self, filter: &DonorFilter) -> Result<Vec<DonorListing>, StoreError> {
        let rows = sqlx::query_as::<_, DonorListingRow>(
            r#"
            SELECT dp.id, dp.user_id, dp.age, dp.blood_type, dp.last_donation, dp.sickness,
                   dp.medication, dp.donation_type, dp.available, dp.contact_phone,
                   dp.donation_number, dp.created_at,
                   u.name AS owner_name, u.location AS owner_location
            FROM donor_profiles dp
            LEFT JOIN users u ON u.id = dp.user_id
            WHERE ($1::TEXT IS NULL OR dp.blood_type = $1)
              AND (NOT $2 OR dp.available)
              AND ($3::TEXT IS NULL
                   OR dp.blood_type ILIKE $3
                   OR u.location ILIKE $3)
            ORDER BY dp.created_at, dp.id
            "#,
        )
        .bind(&filter.blood_type)
        .bind(filter.available_only)
        .bind(filter.search_term.as_deref().map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<DonorListing, StoreError> {
                Ok(DonorListing {
                    profile: row.profile.try_into()?,
                    name: row.owner_name,
                    location: row.owner_location,
                })
            })
            .collect()
    }

    async fn insert_blood_request(
        &self,
        request: NewBloodRequest,
    ) -> Result<BloodRequest, StoreError> {
        let row = sqlx::query_as::<_, BloodRequestRow>(
            r#"
            INSERT INTO blood_requests (id, organization_name, blood_type, location,
                contact_number, price, urgency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, organization_name, blood_type, location, contact_number,
                price, urgency, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.organization_name)
        .bind(&request.blood_type)
        .bind(&request.location)
        .bind(&request.contact_number)
        .bind(request.price)
        .bind(request.urgency.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_blood_requests(&self) -> Result<Vec<BloodRequest>, StoreError> {
        let rows = sqlx::query_as::<_, BloodRequestRow>(
            r#"
            SELECT id, organization_name, blood_type, location, contact_number,
                price, urgency, created_at
            FROM blood_requests
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (id, title, date, location, description, event_type,
                expected_attendees)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, title, date, location, description, event_type,
                expected_attendees, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.kind.as_str())
        .bind(event.expected_attendees)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, date, location, description, event_type,
                expected_attendees, created_at
            FROM events
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    lazy_static::lazy_static! {
        /// Concurrent `CREATE TABLE IF NOT EXISTS` can still collide.
        static ref MIGRATED: tokio::sync::Mutex<bool> = tokio::sync::Mutex::new(false);
    }

    /// Store backed by `DATABASE_URL`, migrated. `None` when no database is configured.
    async fn live_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.unwrap();
        let mut migrated = MIGRATED.lock().await;
        if !*migrated {
            crate::db::run_migrations(&pool).await.unwrap();
            *migrated = true;
        }
        Some(PgStore::new(pool))
    }

    async fn add_user(store: &PgStore, location: &str) -> User {
        store
            .insert_user(NewUser {
                name: "Donor".to_string(),
                email: format!("{}@example.com", Uuid::new_v4()),
                password_hash: "x".to_string(),
                location: location.to_string(),
                account_type: AccountType::Donor,
                profile_image: None,
            })
            .await
            .unwrap()
    }

    fn new_profile(user_id: Uuid, blood_type: &str) -> NewDonorProfile {
        NewDonorProfile {
            user_id,
            fields: DonorProfileChanges {
                blood_type: Some(Some(blood_type.to_string())),
                sickness: Some(Some("flu".to_string())),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_split_change() {
        assert_eq!(split_change::<i64>(None), (false, None));
        assert_eq!(split_change::<i64>(Some(None)), (true, None));
        assert_eq!(split_change(Some(Some(3))), (true, Some(3)));
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("ny"), "%ny%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[tokio::test]
    async fn test_ping_fails_against_unreachable_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgresql://127.0.0.1:1/bloodlink")
            .unwrap();
        let store = PgStore::new(pool);
        assert!(store.ping().await.is_err());
        assert_eq!(store.backend_name(), "postgres");
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_second_profile_for_user_is_conflict() {
        let Some(store) = live_store().await else { return };
        let user = add_user(&store, "Albany").await;

        let profile = store
            .insert_donor_profile(new_profile(user.id, "O+"))
            .await
            .unwrap();
        assert!(profile.available);

        let err = store
            .insert_donor_profile(new_profile(user.id, "A-"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::DonorProfileUser)));

        let err = store
            .insert_user(NewUser {
                name: "Other".to_string(),
                email: user.email.clone(),
                password_hash: "x".to_string(),
                location: "Boston".to_string(),
                account_type: AccountType::Recipient,
                profile_image: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::UserEmail)));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_update_clears_only_provided_fields() {
        let Some(store) = live_store().await else { return };
        let user = add_user(&store, "Albany").await;
        let profile = store
            .insert_donor_profile(new_profile(user.id, "O+"))
            .await
            .unwrap();

        let updated = store
            .update_donor_profile(
                profile.id,
                DonorProfileChanges {
                    sickness: Some(None),
                    available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.sickness.is_none());
        assert!(!updated.available);
        assert_eq!(updated.blood_type.as_deref(), Some("O+"));

        let missing = store
            .update_donor_profile(Uuid::new_v4(), DonorProfileChanges::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_search_donors_filters() {
        let Some(store) = live_store().await else { return };
        // A unique location keeps rows from other runs out of the result.
        let place = format!("Town_{}%", Uuid::new_v4().simple());
        let user = add_user(&store, &place).await;
        let profile = store
            .insert_donor_profile(new_profile(user.id, "AB-"))
            .await
            .unwrap();

        let found = store
            .search_donors(&DonorFilter {
                search_term: Some(place.to_lowercase()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].profile.id, profile.id);
        assert_eq!(found[0].location.as_deref(), Some(place.as_str()));

        let found = store
            .search_donors(&DonorFilter {
                blood_type: Some("AB+".to_string()),
                search_term: Some(place.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(found.is_empty());

        store
            .update_donor_profile(
                profile.id,
                DonorProfileChanges {
                    available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let found = store
            .search_donors(&DonorFilter {
                available_only: true,
                search_term: Some(place),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
