use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{Booking, BookingRequest, BookingWithTable, Table, TableWithBookings};

use crate::models::*;
use crate::schema::*;

pub type DbPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Persistence boundary for tables and bookings.
///
/// Stores only read and write rows. Booking rules live in
/// [`crate::handlers::BookingService`].
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<Table>>;

    async fn list_tables_by_availability(&self, available: bool) -> Result<Vec<Table>>;

    /// Unavailable tables with their bookings attached.
    async fn list_booked_tables(&self) -> Result<Vec<TableWithBookings>>;

    async fn find_table(&self, id: i32) -> Result<Option<TableWithBookings>>;

    async fn find_booking(&self, id: i32) -> Result<Option<BookingWithTable>>;

    /// Inserts the booking and clears the table's availability flag as one
    /// unit. Returns `None` and writes nothing if the table is no longer
    /// available when the commit runs.
    async fn commit_booking(&self, request: &BookingRequest) -> Result<Option<Booking>>;
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_bookings(conn: &mut AsyncPgConnection, table: &DbTable) -> Result<Vec<Booking>> {
        let rows = DbBooking::belonging_to(table)
            .select(DbBooking::as_select())
            .order(bookings::id.asc())
            .load::<DbBooking>(conn)
            .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn list_tables(&self) -> Result<Vec<Table>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = dining_tables::table
            .select(DbTable::as_select())
            .order(dining_tables::id.asc())
            .load::<DbTable>(conn)
            .await?;

        Ok(rows.into_iter().map(Table::from).collect())
    }

    async fn list_tables_by_availability(&self, available: bool) -> Result<Vec<Table>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = dining_tables::table
            .filter(dining_tables::availability.eq(available))
            .select(DbTable::as_select())
            .order(dining_tables::id.asc())
            .load::<DbTable>(conn)
            .await?;

        Ok(rows.into_iter().map(Table::from).collect())
    }

    async fn list_booked_tables(&self) -> Result<Vec<TableWithBookings>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let tables = dining_tables::table
            .filter(dining_tables::availability.eq(false))
            .select(DbTable::as_select())
            .order(dining_tables::id.asc())
            .load::<DbTable>(conn)
            .await?;

        let rows = DbBooking::belonging_to(&tables)
            .select(DbBooking::as_select())
            .order(bookings::id.asc())
            .load::<DbBooking>(conn)
            .await?;

        Ok(rows
            .grouped_by(&tables)
            .into_iter()
            .zip(tables)
            .map(|(bookings, table)| TableWithBookings {
                table: table.into(),
                bookings: bookings.into_iter().map(Booking::from).collect(),
            })
            .collect())
    }

    async fn find_table(&self, id: i32) -> Result<Option<TableWithBookings>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let table = dining_tables::table
            .find(id)
            .select(DbTable::as_select())
            .first::<DbTable>(conn)
            .await
            .optional()?;

        let Some(table) = table else {
            return Ok(None);
        };

        let bookings = Self::load_bookings(conn, &table).await?;
        Ok(Some(TableWithBookings {
            table: table.into(),
            bookings,
        }))
    }

    async fn find_booking(&self, id: i32) -> Result<Option<BookingWithTable>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let row = bookings::table
            .inner_join(dining_tables::table)
            .filter(bookings::id.eq(id))
            .select((DbBooking::as_select(), DbTable::as_select()))
            .first::<(DbBooking, DbTable)>(conn)
            .await
            .optional()?;

        Ok(row.map(|(booking, table)| BookingWithTable {
            booking: booking.into(),
            table: table.into(),
        }))
    }

    async fn commit_booking(&self, request: &BookingRequest) -> Result<Option<Booking>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let table_id = request.table_id;
        let new_booking = NewBooking::from(request);

        let committed = conn
            .transaction::<_, anyhow::Error, _>(|conn| {
                Box::pin(async move {
                    // Flip the flag only if it is still set, so a concurrent
                    // commit on the same table cannot also succeed.
                    let claimed = diesel::update(
                        dining_tables::table
                            .filter(dining_tables::id.eq(table_id))
                            .filter(dining_tables::availability.eq(true)),
                    )
                    .set(dining_tables::availability.eq(false))
                    .execute(conn)
                    .await?;

                    if claimed == 0 {
                        return Ok(None);
                    }

                    let booking = diesel::insert_into(bookings::table)
                        .values(&new_booking)
                        .returning(DbBooking::as_returning())
                        .get_result::<DbBooking>(conn)
                        .await?;

                    Ok(Some(booking))
                })
            })
            .await?;

        Ok(committed.map(Booking::from))
    }
}
