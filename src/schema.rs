diesel::table! {
    guests (id) {
        id -> BigInt,
        name -> Text,
        email -> Nullable<Text>,
        phone -> Nullable<Text>,
        attending -> Bool,
        meal_type -> Text,
        needs_transport -> Bool,
        allergies -> Nullable<Text>,
        notes -> Nullable<Text>,
        table_id -> Nullable<BigInt>,
        table_name -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    tables (id) {
        id -> BigInt,
        name -> Text,
        capacity -> Nullable<Integer>,
        shape -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    settings (key) {
        key -> Text,
        value -> Text,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> BigInt,
        username -> Text,
        password -> Text,
        role -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(guests, tables, settings, users);
