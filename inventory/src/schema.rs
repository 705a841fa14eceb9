diesel::table! {
    inventory_units (id) {
        id -> Uuid,
        capacity_total -> Int4,
        capacity_remaining -> Int4,
        version -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        inventory_unit_id -> Uuid,
        requester_id -> Uuid,
        quantity -> Int4,
        status -> Varchar,
        idempotency_key -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(inventory_units, reservations,);
