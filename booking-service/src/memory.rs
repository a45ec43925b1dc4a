use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{Booking, BookingRequest, BookingWithTable, Table, TableWithBookings};
use tokio::sync::Mutex;

use crate::store::BookingStore;

#[derive(Default)]
struct MemoryState {
    tables: Vec<Table>,
    bookings: Vec<Booking>,
}

impl MemoryState {
    fn with_bookings(&self, table: &Table) -> TableWithBookings {
        TableWithBookings {
            table: table.clone(),
            bookings: self
                .bookings
                .iter()
                .filter(|b| b.table_id == table.id)
                .cloned()
                .collect(),
        }
    }
}

/// In-process store with sequential ids starting at 1.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_table(&self, seating_capacity: i32, availability: bool) -> Table {
        let mut state = self.state.lock().await;
        let table = Table {
            id: state.tables.len() as i32 + 1,
            seating_capacity,
            availability,
        };
        state.tables.push(table.clone());
        table
    }

    /// Inserts a booking row as-is, leaving the table's flag untouched.
    #[cfg(test)]
    pub async fn insert_booking(
        &self,
        table_id: i32,
        reservation_date: chrono::NaiveDate,
        time_slot: chrono::NaiveTime,
    ) -> Result<Booking> {
        let mut state = self.state.lock().await;
        if !state.tables.iter().any(|t| t.id == table_id) {
            return Err(anyhow!("table {} does not exist", table_id));
        }

        let booking = Booking {
            id: state.bookings.len() as i32 + 1,
            table_id,
            customer_id: 0,
            reservation_date,
            time_slot,
        };
        state.bookings.push(booking.clone());
        Ok(booking)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<Table>> {
        Ok(self.state.lock().await.tables.clone())
    }

    async fn list_tables_by_availability(&self, available: bool) -> Result<Vec<Table>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .iter()
            .filter(|t| t.availability == available)
            .cloned()
            .collect())
    }

    async fn list_booked_tables(&self) -> Result<Vec<TableWithBookings>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .iter()
            .filter(|t| !t.availability)
            .map(|t| state.with_bookings(t))
            .collect())
    }

    async fn find_table(&self, id: i32) -> Result<Option<TableWithBookings>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .iter()
            .find(|t| t.id == id)
            .map(|t| state.with_bookings(t)))
    }

    async fn find_booking(&self, id: i32) -> Result<Option<BookingWithTable>> {
        let state = self.state.lock().await;
        let Some(booking) = state.bookings.iter().find(|b| b.id == id) else {
            return Ok(None);
        };

        let table = state
            .tables
            .iter()
            .find(|t| t.id == booking.table_id)
            .ok_or_else(|| anyhow!("booking {} references missing table {}", id, booking.table_id))?;

        Ok(Some(BookingWithTable {
            booking: booking.clone(),
            table: table.clone(),
        }))
    }

    async fn commit_booking(&self, request: &BookingRequest) -> Result<Option<Booking>> {
        let mut state = self.state.lock().await;
        let next_id = state.bookings.len() as i32 + 1;

        let Some(table) = state
            .tables
            .iter_mut()
            .find(|t| t.id == request.table_id && t.availability)
        else {
            return Ok(None);
        };
        table.availability = false;

        let booking = Booking {
            id: next_id,
            table_id: request.table_id,
            customer_id: request.customer_id,
            reservation_date: request.reservation_date,
            time_slot: request.time_slot,
        };
        state.bookings.push(booking.clone());
        Ok(Some(booking))
    }
}
