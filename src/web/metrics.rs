use std::sync::atomic::{AtomicU64, Ordering};

use salvo::prelude::*;

static WEBHOOKS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_REJECTED: AtomicU64 = AtomicU64::new(0);
static EVENTS_PROCESSED: AtomicU64 = AtomicU64::new(0);
static USERS_CREATED: AtomicU64 = AtomicU64::new(0);
static CHECKINS_RECORDED: AtomicU64 = AtomicU64::new(0);
static REPLIES_SENT: AtomicU64 = AtomicU64::new(0);
static REPLIES_FAILED: AtomicU64 = AtomicU64::new(0);
static PROFILE_LOOKUP_FAILURES: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    pub fn webhook_received() {
        WEBHOOKS_RECEIVED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_rejected() {
        WEBHOOKS_REJECTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_processed() {
        EVENTS_PROCESSED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_created() {
        USERS_CREATED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn checkin_recorded() {
        CHECKINS_RECORDED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_sent() {
        REPLIES_SENT.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_failed() {
        REPLIES_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn profile_lookup_failed() {
        PROFILE_LOOKUP_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn format_prometheus() -> String {
    let webhooks_received = WEBHOOKS_RECEIVED.load(Ordering::Relaxed);
    let webhooks_rejected = WEBHOOKS_REJECTED.load(Ordering::Relaxed);
    let events_processed = EVENTS_PROCESSED.load(Ordering::Relaxed);
    let users_created = USERS_CREATED.load(Ordering::Relaxed);
    let checkins_recorded = CHECKINS_RECORDED.load(Ordering::Relaxed);
    let replies_sent = REPLIES_SENT.load(Ordering::Relaxed);
    let replies_failed = REPLIES_FAILED.load(Ordering::Relaxed);
    let profile_lookup_failures = PROFILE_LOOKUP_FAILURES.load(Ordering::Relaxed);

    format!(
        r#"# HELP bot_webhooks_received_total Webhook deliveries received
# TYPE bot_webhooks_received_total counter
bot_webhooks_received_total {}

# HELP bot_webhooks_rejected_total Webhook deliveries rejected before processing
# TYPE bot_webhooks_rejected_total counter
bot_webhooks_rejected_total {}

# HELP bot_events_processed_total Webhook events fully dispatched
# TYPE bot_events_processed_total counter
bot_events_processed_total {}

# HELP bot_users_created_total Users registered
# TYPE bot_users_created_total counter
bot_users_created_total {}

# HELP bot_checkins_recorded_total Check-in ledger entries recorded
# TYPE bot_checkins_recorded_total counter
bot_checkins_recorded_total {}

# HELP bot_replies_sent_total Replies delivered to the messaging platform
# TYPE bot_replies_sent_total counter
bot_replies_sent_total {}

# HELP bot_replies_failed_total Reply sends that failed and were dropped
# TYPE bot_replies_failed_total counter
bot_replies_failed_total {}

# HELP bot_profile_lookup_failures_total Profile lookups replaced by the fallback name
# TYPE bot_profile_lookup_failures_total counter
bot_profile_lookup_failures_total {}
"#,
        webhooks_received,
        webhooks_rejected,
        events_processed,
        users_created,
        checkins_recorded,
        replies_sent,
        replies_failed,
        profile_lookup_failures,
    )
}

#[handler]
pub async fn metrics_endpoint(res: &mut Response) {
    res.headers_mut()
        .insert("Content-Type", "text/plain; charset=utf-8".parse().unwrap());
    res.body(format_prometheus());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increments_counters() {
        Metrics::webhook_received();
        Metrics::event_processed();
        Metrics::user_created();
        Metrics::checkin_recorded();
        Metrics::reply_sent();

        assert!(WEBHOOKS_RECEIVED.load(Ordering::Relaxed) >= 1);
        assert!(EVENTS_PROCESSED.load(Ordering::Relaxed) >= 1);
        assert!(USERS_CREATED.load(Ordering::Relaxed) >= 1);
        assert!(CHECKINS_RECORDED.load(Ordering::Relaxed) >= 1);
        assert!(REPLIES_SENT.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn format_prometheus_includes_all_metrics() {
        let output = format_prometheus();
        assert!(output.contains("bot_webhooks_received_total"));
        assert!(output.contains("bot_webhooks_rejected_total"));
        assert!(output.contains("bot_events_processed_total"));
        assert!(output.contains("bot_users_created_total"));
        assert!(output.contains("bot_checkins_recorded_total"));
        assert!(output.contains("bot_replies_sent_total"));
        assert!(output.contains("bot_replies_failed_total"));
        assert!(output.contains("bot_profile_lookup_failures_total"));
    }
}
