diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        role -> Varchar,
        phone -> Nullable<Varchar>,
        is_verified -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bus_operators (id) {
        id -> Uuid,
        name -> Varchar,
        contact_info -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    buses (id) {
        id -> Uuid,
        operator_id -> Nullable<Uuid>,
        bus_number -> Varchar,
        seat_capacity -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    routes (id) {
        id -> Uuid,
        origin -> Varchar,
        destination -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    schedules (id) {
        id -> Uuid,
        bus_id -> Uuid,
        route_id -> Uuid,
        inventory_unit_id -> Uuid,
        travel_date -> Date,
        departure_time -> Time,
        arrival_time -> Time,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bookings (id) {
        id -> Uuid,
        user_id -> Uuid,
        schedule_id -> Uuid,
        reservation_id -> Uuid,
        ticket_number -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    retail_shops (id) {
        id -> Uuid,
        owner_id -> Uuid,
        name -> Varchar,
        location -> Nullable<Varchar>,
        contact_info -> Nullable<Text>,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        seller_id -> Uuid,
        shop_id -> Nullable<Uuid>,
        name -> Varchar,
        description -> Nullable<Text>,
        price -> Numeric,
        inventory_unit_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        buyer_id -> Uuid,
        total_price -> Numeric,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        product_id -> Uuid,
        reservation_id -> Uuid,
        quantity -> Int4,
        unit_price -> Numeric,
    }
}

diesel::table! {
    reviews (id) {
        id -> Uuid,
        user_id -> Uuid,
        bus_id -> Nullable<Uuid>,
        shop_id -> Nullable<Uuid>,
        product_id -> Nullable<Uuid>,
        rating -> Int4,
        review -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Uuid,
        user_id -> Uuid,
        entity_id -> Uuid,
        entity_type -> Varchar,
        rating -> Int4,
        comment -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    bus_operators,
    buses,
    routes,
    schedules,
    bookings,
    retail_shops,
    products,
    orders,
    order_items,
    reviews,
    comments,
);
