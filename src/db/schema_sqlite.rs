// SQLite schema definitions. Timestamps are stored as RFC 3339 text.

diesel::table! {
    users (user_id) {
        user_id -> Integer,
        line_user_id -> Text,
        name -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    checkins (checkin_id) {
        checkin_id -> Integer,
        user_id -> Integer,
        checkin_time -> Text,
    }
}

diesel::table! {
    line_replies (reply_id) {
        reply_id -> Integer,
        user_id -> Integer,
        reply_message -> Text,
        reply_time -> Text,
    }
}

diesel::joinable!(checkins -> users (user_id));
diesel::joinable!(line_replies -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(users, checkins, line_replies);
