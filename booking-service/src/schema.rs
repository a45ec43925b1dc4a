diesel::table! {
    bookings (id) {
        id -> Int4,
        table_id -> Int4,
        customer_id -> Int4,
        reservation_date -> Date,
        time_slot -> Time,
    }
}

diesel::table! {
    dining_tables (id) {
        id -> Int4,
        seating_capacity -> Int4,
        availability -> Bool,
    }
}

diesel::joinable!(bookings -> dining_tables (table_id));

diesel::allow_tables_to_appear_in_same_query!(
    bookings,
    dining_tables,
);
