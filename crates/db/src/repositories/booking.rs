use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use maitred_core::domain::booking::{BookingRecord, BookingStatus};
use maitred_core::domain::user::UserId;

use super::user::parse_timestamp;
use super::{BookingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<BookingRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                booking_reference,
                user_id,
                restaurant,
                visit_date,
                visit_time,
                party_size,
                status,
                special_requests,
                customer_json,
                created_at,
                updated_at
             FROM bookings
             WHERE booking_reference = ?",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.map(booking_from_row).transpose()
    }

    async fn list_for_user(&self, owner: UserId) -> Result<Vec<BookingRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                booking_reference,
                user_id,
                restaurant,
                visit_date,
                visit_time,
                party_size,
                status,
                special_requests,
                customer_json,
                created_at,
                updated_at
             FROM bookings
             WHERE user_id = ?
             ORDER BY visit_date ASC, visit_time ASC",
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(booking_from_row).collect()
    }

    async fn save(&self, booking: BookingRecord) -> Result<(), RepositoryError> {
        let customer_json = serde_json::to_string(&booking.customer_snapshot)
            .map_err(|error| RepositoryError::Decode(format!("customer encode: {error}")))?;

        sqlx::query(
            "INSERT INTO bookings (
                booking_reference,
                user_id,
                restaurant,
                visit_date,
                visit_time,
                party_size,
                status,
                special_requests,
                customer_json,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(booking_reference) DO UPDATE SET
                restaurant = excluded.restaurant,
                visit_date = excluded.visit_date,
                visit_time = excluded.visit_time,
                party_size = excluded.party_size,
                status = excluded.status,
                special_requests = excluded.special_requests,
                customer_json = excluded.customer_json,
                updated_at = excluded.updated_at",
        )
        .bind(&booking.reference)
        .bind(booking.owner.0)
        .bind(&booking.restaurant)
        .bind(booking.visit_date.format("%Y-%m-%d").to_string())
        .bind(booking.visit_time.format("%H:%M:%S").to_string())
        .bind(i64::from(booking.party_size))
        .bind(booking.status.as_str())
        .bind(booking.special_requests.as_deref())
        .bind(customer_json)
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        reference: &str,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE booking_reference = ?")
            .bind(status.as_str())
            .bind(updated_at.to_rfc3339())
            .bind(reference)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn booking_from_row(row: SqliteRow) -> Result<BookingRecord, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = BookingStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown booking status `{status_raw}`")))?;

    let customer_raw = row.try_get::<String, _>("customer_json")?;
    let customer_snapshot = serde_json::from_str(&customer_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid customer_json: {error}")))?;

    Ok(BookingRecord {
        reference: row.try_get("booking_reference")?,
        owner: UserId(row.try_get("user_id")?),
        restaurant: row.try_get("restaurant")?,
        visit_date: parse_date("visit_date", row.try_get("visit_date")?)?,
        visit_time: parse_time("visit_time", row.try_get("visit_time")?)?,
        party_size: parse_party_size(row.try_get("party_size")?)?,
        status,
        special_requests: row.try_get("special_requests")?,
        customer_snapshot,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

fn parse_time(column: &str, value: String) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(&value, "%H:%M:%S").map_err(|error| {
        RepositoryError::Decode(format!("invalid time in `{column}`: `{value}` ({error})"))
    })
}

fn parse_party_size(value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `party_size` (expected non-negative u32): {value}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

    use maitred_core::domain::booking::{BookingRecord, BookingStatus};
    use maitred_core::domain::customer::CustomerDetails;
    use maitred_core::domain::user::UserId;

    use super::SqlBookingRepository;
    use crate::migrations;
    use crate::repositories::{BookingRepository, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, UserId) {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        let user = SqlUserRepository::new(pool.clone())
            .create("ann", "hash-a")
            .await
            .expect("create owner");
        (pool, user.id)
    }

    fn sample_booking(owner: UserId, reference: &str) -> BookingRecord {
        BookingRecord {
            reference: reference.to_string(),
            owner,
            restaurant: "TheHungryUnicorn".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("date"),
            visit_time: NaiveTime::from_hms_opt(19, 0, 0).expect("time"),
            party_size: 4,
            status: BookingStatus::Confirmed,
            special_requests: Some("window seat".to_string()),
            customer_snapshot: CustomerDetails {
                first_name: Some("Ann".to_string()),
                ..CustomerDetails::default()
            },
            created_at: parse_ts("2030-06-01T12:00:00Z"),
            updated_at: parse_ts("2030-06-01T12:00:00Z"),
        }
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn save_and_reload_round_trip() {
        let (pool, owner) = setup().await;
        let repo = SqlBookingRepository::new(pool.clone());
        let booking = sample_booking(owner, "ABC1234");

        repo.save(booking.clone()).await.expect("save booking");

        let found = repo.find_by_reference("ABC1234").await.expect("find");
        assert_eq!(found, Some(booking.clone()));

        let listed = repo.list_for_user(owner).await.expect("list");
        assert_eq!(listed, vec![booking]);

        pool.close().await;
    }

    #[tokio::test]
    async fn save_upserts_on_reference() {
        let (pool, owner) = setup().await;
        let repo = SqlBookingRepository::new(pool.clone());

        let mut booking = sample_booking(owner, "ABC1234");
        repo.save(booking.clone()).await.expect("first save");

        booking.party_size = 6;
        booking.status = BookingStatus::Updated;
        repo.save(booking.clone()).await.expect("second save");

        let found = repo.find_by_reference("ABC1234").await.expect("find").expect("present");
        assert_eq!(found.party_size, 6);
        assert_eq!(found.status, BookingStatus::Updated);

        pool.close().await;
    }

    #[tokio::test]
    async fn set_status_marks_cancellation() {
        let (pool, owner) = setup().await;
        let repo = SqlBookingRepository::new(pool.clone());
        repo.save(sample_booking(owner, "ABC1234")).await.expect("save");

        repo.set_status("ABC1234", BookingStatus::Cancelled, parse_ts("2030-06-02T09:00:00Z"))
            .await
            .expect("set status");

        let found = repo.find_by_reference("ABC1234").await.expect("find").expect("present");
        assert_eq!(found.status, BookingStatus::Cancelled);
        assert_eq!(found.updated_at, parse_ts("2030-06-02T09:00:00Z"));

        pool.close().await;
    }

    #[tokio::test]
    async fn listings_order_by_visit_date_then_time() {
        let (pool, owner) = setup().await;
        let repo = SqlBookingRepository::new(pool.clone());

        let mut later = sample_booking(owner, "LATER01");
        later.visit_date = NaiveDate::from_ymd_opt(2030, 7, 1).expect("date");
        let mut earlier = sample_booking(owner, "EARLY01");
        earlier.visit_date = NaiveDate::from_ymd_opt(2030, 6, 10).expect("date");

        repo.save(later).await.expect("save later");
        repo.save(earlier).await.expect("save earlier");

        let listed = repo.list_for_user(owner).await.expect("list");
        let references: Vec<_> =
            listed.iter().map(|booking| booking.reference.as_str()).collect();
        assert_eq!(references, vec!["EARLY01", "LATER01"]);

        pool.close().await;
    }
}
