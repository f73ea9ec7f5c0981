diesel::table! {
    auths (id) {
        id -> Text,
        user_id -> Integer,
        expires -> Timestamp,
    }
}

diesel::table! {
    tracked_flights (id) {
        id -> Integer,
        user_id -> Nullable<Integer>,
        flight_number -> Text,
        departing_city -> Text,
        arriving_city -> Text,
        scheduled_departure -> Timestamp,
        scheduled_arrival -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Text,
    }
}

diesel::joinable!(auths -> users (user_id));
diesel::joinable!(tracked_flights -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    auths,
    tracked_flights,
    users,
);
