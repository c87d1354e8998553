use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::db::DatabaseError;
use crate::utils::formatting::format_checkin_time;
use crate::web::metrics::Metrics;
use crate::web::web_state;

fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "message": message })));
}

#[derive(Deserialize)]
struct CheckinRequest {
    line_user_id: String,
}

/// Direct check-in, bypassing the webhook flow. The user must already exist.
#[handler]
pub async fn checkin(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<CheckinRequest>().await {
        Ok(body) => body,
        Err(_) => {
            render_error(res, StatusCode::BAD_REQUEST, "line_user_id is required");
            return;
        }
    };

    let state = web_state();
    let user = match state
        .db_manager
        .user_store()
        .get_user_by_line_id(&body.line_user_id)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "User not found");
            return;
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
            return;
        }
    };

    match state
        .db_manager
        .checkin_store()
        .record_checkin(user.user_id)
        .await
    {
        Ok(_) => {
            Metrics::checkin_recorded();
            res.render(Json(json!({ "message": "You have successfully checked in!" })));
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

#[handler]
pub async fn get_checkins(req: &mut Request, res: &mut Response) {
    let user_id = match req.param::<i64>("user_id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };

    match web_state()
        .db_manager
        .checkin_store()
        .list_checkins_for_user(user_id)
        .await
    {
        Ok(checkins) => {
            let checkin_list: Vec<_> = checkins
                .iter()
                .map(|c| {
                    json!({
                        "checkin_id": c.checkin_id,
                        "checkin_time": format_checkin_time(&c.checkin_time),
                    })
                })
                .collect();
            res.render(Json(json!({ "checkins": checkin_list })));
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

#[derive(Deserialize)]
struct LineReplyRequest {
    user_id: i64,
    reply_message: String,
}

/// Records an outbound reply for a user and pushes it through the LINE
/// messaging channel. The push is fire-and-forget; only the audit record is
/// load-bearing here.
#[handler]
pub async fn line_reply(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<LineReplyRequest>().await {
        Ok(body) => body,
        Err(_) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                "user_id and reply_message are required",
            );
            return;
        }
    };

    let state = web_state();
    let user = match state
        .db_manager
        .user_store()
        .get_user_by_id(body.user_id)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "User not found");
            return;
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
            return;
        }
    };

    if let Err(err) = state
        .db_manager
        .reply_store()
        .record_reply(user.user_id, &body.reply_message)
        .await
    {
        render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        return;
    }

    if let Err(err) = state
        .line_client
        .push_message(&user.line_user_id, &body.reply_message)
        .await
    {
        warn!(user_id = user.user_id, "push message failed: {}", err);
        Metrics::reply_failed();
    } else {
        Metrics::reply_sent();
    }

    res.render(Json(json!({ "message": "Reply sent successfully!" })));
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    line_user_id: String,
    #[serde(default)]
    name: String,
}

/// Explicit registration. Registering an already-known `line_user_id` is an
/// idempotent success, not an error.
#[handler]
pub async fn register(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<RegisterRequest>().await {
        Ok(body) => body,
        Err(_) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                "line_user_id and name are required",
            );
            return;
        }
    };

    if body.line_user_id.trim().is_empty() || body.name.trim().is_empty() {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "line_user_id and name are required",
        );
        return;
    }

    let store = web_state().db_manager.user_store();
    match store.create_user(&body.line_user_id, &body.name).await {
        Ok(user) => {
            Metrics::user_created();
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({
                "message": "User registered successfully!",
                "user": user,
            })));
        }
        Err(DatabaseError::Conflict(_)) => {
            res.render(Json(json!({ "message": "User already registered" })));
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}

#[handler]
pub async fn list_users(res: &mut Response) {
    match web_state().db_manager.user_store().list_users().await {
        Ok(users) => {
            res.render(Json(json!({ "users": users, "count": users.len() })));
        }
        Err(err) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    }
}
