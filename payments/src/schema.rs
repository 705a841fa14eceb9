diesel::table! {
    payments (id) {
        id -> Uuid,
        reservation_id -> Nullable<Uuid>,
        order_id -> Nullable<Uuid>,
        amount -> Numeric,
        status -> Varchar,
        transaction_id -> Varchar,
        phone -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
