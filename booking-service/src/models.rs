use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use shared::{Booking, BookingRequest, Table};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::dining_tables)]
pub struct DbTable {
    pub id: i32,
    pub seating_capacity: i32,
    pub availability: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(belongs_to(DbTable, foreign_key = table_id))]
pub struct DbBooking {
    pub id: i32,
    pub table_id: i32,
    pub customer_id: i32,
    pub reservation_date: NaiveDate,
    pub time_slot: NaiveTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct NewBooking {
    pub table_id: i32,
    pub customer_id: i32,
    pub reservation_date: NaiveDate,
    pub time_slot: NaiveTime,
}

impl From<DbTable> for Table {
    fn from(row: DbTable) -> Self {
        Self {
            id: row.id,
            seating_capacity: row.seating_capacity,
            availability: row.availability,
        }
    }
}

impl From<DbBooking> for Booking {
    fn from(row: DbBooking) -> Self {
        Self {
            id: row.id,
            table_id: row.table_id,
            customer_id: row.customer_id,
            reservation_date: row.reservation_date,
            time_slot: row.time_slot,
        }
    }
}

impl From<&BookingRequest> for NewBooking {
    fn from(request: &BookingRequest) -> Self {
        Self {
            table_id: request.table_id,
            customer_id: request.customer_id,
            reservation_date: request.reservation_date,
            time_slot: request.time_slot,
        }
    }
}
