use salvo::prelude::*;
use serde_json::json;
use tracing::{error, warn};

use crate::line::{SIGNATURE_HEADER, WebhookEnvelope};
use crate::web::metrics::Metrics;
use crate::web::web_state;

/// LINE webhook delivery endpoint. A request without the signature header is
/// rejected outright; nothing is extracted and no reply is sent. Otherwise
/// each delivered event runs through the dispatcher and the platform gets a
/// plain `OK` so it does not redeliver.
#[handler]
pub async fn webhook_callback(req: &mut Request, res: &mut Response) {
    Metrics::webhook_received();

    if req.header::<String>(SIGNATURE_HEADER).is_none() {
        warn!("rejecting webhook without {} header", SIGNATURE_HEADER);
        Metrics::webhook_rejected();
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(json!({ "error": "missing signature header" })));
        return;
    }

    let envelope = match req.parse_json::<WebhookEnvelope>().await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("rejecting malformed webhook body: {}", err);
            Metrics::webhook_rejected();
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(json!({ "error": "malformed event envelope" })));
            return;
        }
    };

    let dispatcher = web_state().dispatcher.clone();
    for event in &envelope.events {
        if let Err(err) = dispatcher.dispatch(event).await {
            // A database fault here means state may not have been mutated;
            // report a 5xx so the platform redelivers.
            error!("webhook dispatch failed: {}", err);
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
            res.render(Json(json!({ "error": "event processing failed" })));
            return;
        }
    }

    res.render("OK");
}
