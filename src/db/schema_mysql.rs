// MySQL schema definitions. Mirrors schema_sqlite.rs with native datetime
// columns and 64-bit auto-increment keys.

diesel::table! {
    users (user_id) {
        user_id -> Bigint,
        line_user_id -> Varchar,
        name -> Varchar,
        created_at -> Datetime,
    }
}

diesel::table! {
    checkins (checkin_id) {
        checkin_id -> Bigint,
        user_id -> Bigint,
        checkin_time -> Datetime,
    }
}

diesel::table! {
    line_replies (reply_id) {
        reply_id -> Bigint,
        user_id -> Bigint,
        reply_message -> Text,
        reply_time -> Datetime,
    }
}

diesel::joinable!(checkins -> users (user_id));
diesel::joinable!(line_replies -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(users, checkins, line_replies);
