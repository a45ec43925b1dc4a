use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Reservations dated before this day are rejected.
pub const RESERVATION_CUTOFF: NaiveDate = match NaiveDate::from_ymd_opt(2023, 7, 1) {
    Some(date) => date,
    None => panic!("invalid reservation cutoff"),
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: i32,
    pub seating_capacity: i32,
    pub availability: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i32,
    pub table_id: i32,
    pub customer_id: i32,
    pub reservation_date: NaiveDate,
    pub time_slot: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWithBookings {
    #[serde(flatten)]
    pub table: Table,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWithTable {
    #[serde(flatten)]
    pub booking: Booking,
    pub table: Table,
}

/// A validated booking waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub table_id: i32,
    pub customer_id: i32,
    pub reservation_date: NaiveDate,
    pub time_slot: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Table {0} not found")]
    TableNotFound(i32),

    #[error("Booking {0} not found")]
    BookingNotFound(i32),

    #[error("Table already booked")]
    TableAlreadyBooked,

    #[error("Table already booked for the selected time slot")]
    SlotTaken,

    #[error("Invalid reservation date")]
    InvalidReservationDate,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::TableNotFound(_) | BookingError::BookingNotFound(_) => ErrorKind::NotFound,
            BookingError::TableAlreadyBooked | BookingError::SlotTaken => ErrorKind::Conflict,
            BookingError::InvalidReservationDate => ErrorKind::InvalidInput,
            BookingError::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

pub fn ensure_available(table: &Table) -> BookingResult<()> {
    if table.availability {
        Ok(())
    } else {
        Err(BookingError::TableAlreadyBooked)
    }
}

/// Only the date part takes part in the comparison.
pub fn ensure_valid_date(reservation_date: NaiveDateTime) -> BookingResult<()> {
    if reservation_date.date() < RESERVATION_CUTOFF {
        Err(BookingError::InvalidReservationDate)
    } else {
        Ok(())
    }
}

pub fn ensure_slot_free(bookings: &[Booking], date: NaiveDate, slot: NaiveTime) -> BookingResult<()> {
    if bookings
        .iter()
        .any(|b| b.reservation_date == date && b.time_slot == slot)
    {
        Err(BookingError::SlotTaken)
    } else {
        Ok(())
    }
}

impl BookingRequest {
    /// Runs every booking rule against `target` in order: availability, date
    /// floor, slot collision.
    pub fn validate(
        target: &TableWithBookings,
        customer_id: i32,
        reservation_date: NaiveDateTime,
        time_slot: NaiveTime,
    ) -> BookingResult<Self> {
        ensure_available(&target.table)?;
        ensure_valid_date(reservation_date)?;

        let date = reservation_date.date();
        ensure_slot_free(&target.bookings, date, time_slot)?;

        Ok(Self {
            table_id: target.table.id,
            customer_id,
            reservation_date: date,
            time_slot,
        })
    }
}
