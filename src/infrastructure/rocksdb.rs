use crate::domain::booking::{Booking, BookingDraft, BookingPatch};
use crate::domain::ports::BookingStore;
use crate::domain::query::{BookingFilter, BookingPage, Pagination};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for booking documents, keyed by booking id.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family mapping payment intent ids to the booking that owns them.
pub const CF_PAYMENT_INTENTS: &str = "payment_intents";

/// A persistent booking store using RocksDB.
///
/// Bookings are stored as JSON in `bookings`; `payment_intents` is a unique
/// index so a hold can never back two bookings. Both are written in one
/// batch. Writes are serialized through `write_lock` so the uniqueness check
/// and the read-modify-write of updates are not interleaved.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_bookings = ColumnFamilyDescriptor::new(CF_BOOKINGS, Options::default());
        let cf_intents = ColumnFamilyDescriptor::new(CF_PAYMENT_INTENTS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_bookings, cf_intents])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BookingError::Storage(format!("Column family '{name}' not found")))
    }

    fn read_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let cf = self.cf(CF_BOOKINGS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_booking(&self, booking: &Booking) -> Result<()> {
        let cf = self.cf(CF_BOOKINGS)?;
        self.db
            .put_cf(cf, booking.id.as_bytes(), serde_json::to_vec(booking)?)?;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn create(&self, draft: BookingDraft) -> Result<Booking> {
        let _guard = self.write_lock.lock().await;
        let intents = self.cf(CF_PAYMENT_INTENTS)?;

        if self
            .db
            .get_pinned_cf(intents, draft.stripe_payment_intent_id.as_bytes())?
            .is_some()
        {
            return Err(BookingError::ValidationFailed(format!(
                "payment intent {} already belongs to a booking",
                draft.stripe_payment_intent_id
            )));
        }

        let booking = Booking::from_draft(Uuid::new_v4(), draft, Utc::now());

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_BOOKINGS)?,
            booking.id.as_bytes(),
            serde_json::to_vec(&booking)?,
        );
        batch.put_cf(
            intents,
            booking.stripe_payment_intent_id.as_bytes(),
            booking.id.as_bytes(),
        );
        self.db.write(batch)?;

        Ok(booking)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        self.read_booking(id)
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Booking>> {
        let intents = self.cf(CF_PAYMENT_INTENTS)?;
        let Some(raw_id) = self.db.get_cf(intents, payment_intent_id.as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&raw_id)
            .map_err(|e| BookingError::Storage(format!("Corrupt payment intent index: {e}")))?;
        self.read_booking(id)
    }

    async fn update(&self, id: Uuid, patch: BookingPatch) -> Result<Option<Booking>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut booking) = self.read_booking(id)? else {
            return Ok(None);
        };
        booking.apply(patch, Utc::now())?;
        self.write_booking(&booking)?;
        Ok(Some(booking))
    }

    async fn list(&self, filter: &BookingFilter, pagination: Pagination) -> Result<BookingPage> {
        let cf = self.cf(CF_BOOKINGS)?;

        let mut bookings = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            bookings.push(serde_json::from_slice::<Booking>(&value)?);
        }

        Ok(pagination.paginate(filter, bookings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, BookingType};
    use crate::domain::fees::compute_fees;
    use crate::domain::party::{PartyRef, PostRef};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn draft(intent: &str) -> BookingDraft {
        BookingDraft {
            booking_type: BookingType::SingleTextResponse,
            expert: PartyRef {
                id: "exp_1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
            customer: PartyRef {
                id: "cus_1".into(),
                name: "Grace".into(),
                email: "grace@example.com".into(),
            },
            expertise_post: PostRef {
                id: "post_1".into(),
                title: "Compiler reviews".into(),
            },
            customer_submission: "Where do I start?".into(),
            stripe_payment_intent_id: intent.into(),
            quote: compute_fees(dec!(19.99)).unwrap(),
            response_window: chrono::Duration::days(7),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_BOOKINGS).is_some());
        assert!(store.db.cf_handle(CF_PAYMENT_INTENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_booking_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let created = store.create(draft("pi_1")).await.unwrap();
        let retrieved = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.total.to_string(), "20.87");

        let by_intent = store.find_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(by_intent.id, created.id);
        assert!(store.find_by_payment_intent("pi_2").await.unwrap().is_none());

        let duplicate = store.create(draft("pi_1")).await;
        assert!(matches!(duplicate, Err(BookingError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_rocksdb_update_and_list() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let first = store.create(draft("pi_1")).await.unwrap();
        store.create(draft("pi_2")).await.unwrap();

        let updated = store
            .update(
                first.id,
                BookingPatch {
                    expected_status: Some(BookingStatus::PendingResponse),
                    status: Some(BookingStatus::Completed),
                    expert_response: Some("Done".into()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Completed);

        let stale = store
            .update(
                first.id,
                BookingPatch {
                    expected_status: Some(BookingStatus::PendingResponse),
                    status: Some(BookingStatus::Expired),
                    expert_response: None,
                },
            )
            .await;
        assert!(matches!(stale, Err(BookingError::ValidationFailed(_))));

        let filter = BookingFilter {
            status: Some(BookingStatus::Completed),
            ..Default::default()
        };
        let page = store.list(&filter, Pagination::new(1, 20)).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.filtered_count, 1);
        assert_eq!(page.items[0].id, first.id);
    }
}
