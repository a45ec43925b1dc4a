use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use shared::*;
use tracing::{info, warn};

use crate::store::BookingStore;

/// Read-only table listings.
pub struct TableQueries {
    store: Arc<dyn BookingStore>,
}

impl TableQueries {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn list_tables(&self) -> BookingResult<Vec<Table>> {
        Ok(self.store.list_tables().await?)
    }

    pub async fn list_available(&self) -> BookingResult<Vec<Table>> {
        Ok(self.store.list_tables_by_availability(true).await?)
    }

    pub async fn list_booked(&self) -> BookingResult<Vec<TableWithBookings>> {
        Ok(self.store.list_booked_tables().await?)
    }

    pub async fn get_table(&self, id: i32) -> BookingResult<TableWithBookings> {
        self.store
            .find_table(id)
            .await?
            .ok_or(BookingError::TableNotFound(id))
    }
}

pub struct BookingService {
    store: Arc<dyn BookingStore>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    async fn find_table(&self, table_id: i32) -> BookingResult<TableWithBookings> {
        self.store
            .find_table(table_id)
            .await?
            .ok_or(BookingError::TableNotFound(table_id))
    }

    /// Loads the table shown on the booking form. Fails if it is already
    /// booked.
    pub async fn prepare_booking(&self, table_id: i32) -> BookingResult<TableWithBookings> {
        let target = self.find_table(table_id).await?;
        ensure_available(&target.table)?;
        Ok(target)
    }

    /// Validates and commits a booking, returning the new booking id.
    ///
    /// Checks run in a fixed order: table existence, availability, date
    /// cutoff, slot collision. The first failing check decides the error.
    pub async fn create_booking(
        &self,
        table_id: i32,
        customer_id: i32,
        reservation_date: NaiveDateTime,
        time_slot: NaiveTime,
    ) -> BookingResult<i32> {
        let target = self.find_table(table_id).await?;

        let request = match BookingRequest::validate(&target, customer_id, reservation_date, time_slot) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected booking for table {}: {}", table_id, e);
                return Err(e);
            }
        };

        let booking = match self.store.commit_booking(&request).await? {
            Some(booking) => booking,
            None => {
                warn!("Table {} was booked by a concurrent request", table_id);
                return Err(BookingError::TableAlreadyBooked);
            }
        };

        info!(
            "Committed booking {} for table {} on {} at {}",
            booking.id, table_id, booking.reservation_date, booking.time_slot
        );
        Ok(booking.id)
    }

    pub async fn get_confirmation(&self, booking_id: i32) -> BookingResult<BookingWithTable> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }
}
