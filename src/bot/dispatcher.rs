use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::bot::command::{Intent, interpret};
use crate::bot::{
    CHECKIN_SUCCESS_MESSAGE, FALLBACK_DISPLAY_NAME, HELP_MESSAGE, NO_RECORDS_MESSAGE,
};
use crate::db::{DatabaseError, DatabaseManager, User};
use crate::line::{MessageContent, ProfileResolver, ReplySender, WebhookEvent};
use crate::utils::formatting::format_checkin_history;
use crate::web::metrics::Metrics;

/// The webhook message-dispatch core. Handles one delivered event at a time:
/// resolves the sender to a durable user row (creating one on first contact),
/// interprets the text, mutates the ledger, and sends exactly one reply.
pub struct Dispatcher {
    db: Arc<DatabaseManager>,
    resolver: Arc<dyn ProfileResolver>,
    sender: Arc<dyn ReplySender>,
}

impl Dispatcher {
    pub fn new(
        db: Arc<DatabaseManager>,
        resolver: Arc<dyn ProfileResolver>,
        sender: Arc<dyn ReplySender>,
    ) -> Self {
        Self {
            db,
            resolver,
            sender,
        }
    }

    /// Processes one webhook event. Returns an error only for database
    /// faults; resolver and reply-send failures are absorbed per policy.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<()> {
        let WebhookEvent::Message {
            reply_token,
            source,
            message,
        } = event
        else {
            debug!("ignoring unsupported event kind");
            return Ok(());
        };

        let MessageContent::Text { text } = message else {
            debug!("ignoring non-text message content");
            return Ok(());
        };

        let Some(line_user_id) = source.user_id.as_deref() else {
            debug!("ignoring message event without a user source");
            return Ok(());
        };

        let user = self.resolve_user(line_user_id).await?;
        let reply = self.apply_intent(&user, text).await?;

        match self.sender.send_reply(reply_token, &reply).await {
            Ok(()) => Metrics::reply_sent(),
            Err(err) => {
                // Reply tokens are single-use; a failed send is not retried
                // and the webhook still reports success upstream.
                warn!(line_user_id, "failed to send reply: {}", err);
                Metrics::reply_failed();
            }
        }

        Metrics::event_processed();
        Ok(())
    }

    /// Fetch-or-create by the platform user id. A `Conflict` from the insert
    /// means a concurrent delivery won the race; the existing row is reused.
    async fn resolve_user(&self, line_user_id: &str) -> Result<User, DatabaseError> {
        let store = self.db.user_store();

        if let Some(user) = store.get_user_by_line_id(line_user_id).await? {
            return Ok(user);
        }

        let name = match self.resolver.display_name(line_user_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(line_user_id, "profile lookup failed, using fallback name: {}", err);
                Metrics::profile_lookup_failed();
                FALLBACK_DISPLAY_NAME.to_string()
            }
        };

        match store.create_user(line_user_id, &name).await {
            Ok(user) => {
                info!(line_user_id, user_id = user.user_id, "registered new user");
                Metrics::user_created();
                Ok(user)
            }
            Err(DatabaseError::Conflict(_)) => store
                .get_user_by_line_id(line_user_id)
                .await?
                .ok_or_else(|| {
                    DatabaseError::NotFound(format!(
                        "user {line_user_id} vanished after insert conflict"
                    ))
                }),
            Err(err) => Err(err),
        }
    }

    async fn apply_intent(&self, user: &User, text: &str) -> Result<String, DatabaseError> {
        match interpret(text) {
            Intent::CheckIn => {
                self.db.checkin_store().record_checkin(user.user_id).await?;
                info!(user_id = user.user_id, "recorded check-in");
                Metrics::checkin_recorded();
                Ok(CHECKIN_SUCCESS_MESSAGE.to_string())
            }
            Intent::Query => {
                let history = self
                    .db
                    .checkin_store()
                    .list_checkins_for_user(user.user_id)
                    .await?;
                if history.is_empty() {
                    Ok(NO_RECORDS_MESSAGE.to_string())
                } else {
                    Ok(format_checkin_history(&history))
                }
            }
            Intent::Unknown => Ok(HELP_MESSAGE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::line::{EventSource, LineError};

    struct FixedResolver {
        name: Option<String>,
    }

    #[async_trait]
    impl ProfileResolver for FixedResolver {
        async fn display_name(&self, _line_user_id: &str) -> Result<String, LineError> {
            self.name
                .clone()
                .ok_or_else(|| LineError::Transport("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        replies: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), LineError> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
            if self.fail {
                Err(LineError::Api {
                    status: 400,
                    body: "invalid reply token".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        db: Arc<DatabaseManager>,
        sender: Arc<RecordingSender>,
        dispatcher: Dispatcher,
    }

    async fn fixture(resolver_name: Option<&str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot.db").to_string_lossy().into_owned();
        let db = Arc::new(DatabaseManager::new_sqlite(path));
        db.migrate().await.unwrap();

        let resolver = Arc::new(FixedResolver {
            name: resolver_name.map(ToString::to_string),
        });
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::new(db.clone(), resolver, sender.clone());

        Fixture {
            _dir: dir,
            db,
            sender,
            dispatcher,
        }
    }

    fn text_event(user_id: &str, text: &str) -> WebhookEvent {
        WebhookEvent::Message {
            reply_token: "reply-token-1".to_string(),
            source: EventSource {
                source_type: "user".to_string(),
                user_id: Some(user_id.to_string()),
            },
            message: MessageContent::Text {
                text: text.to_string(),
            },
        }
    }

    fn sent_replies(fixture: &Fixture) -> Vec<(String, String)> {
        fixture.sender.replies.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn checkin_from_known_user_records_event_and_replies_once() {
        let fx = fixture(Some("Alice")).await;
        let user = fx.db.user_store().create_user("U1", "Alice").await.unwrap();

        fx.dispatcher.dispatch(&text_event("U1", "打卡")).await.unwrap();

        let checkins = fx
            .db
            .checkin_store()
            .list_checkins_for_user(user.user_id)
            .await
            .unwrap();
        assert_eq!(checkins.len(), 1);

        let replies = sent_replies(&fx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "reply-token-1");
        assert_eq!(replies[0].1, CHECKIN_SUCCESS_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_sender_is_registered_with_resolved_name() {
        let fx = fixture(Some("Alice")).await;

        fx.dispatcher.dispatch(&text_event("U1", "打卡")).await.unwrap();

        let user = fx
            .db
            .user_store()
            .get_user_by_line_id("U1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(fx.db.user_store().count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_falls_back_to_constant_name() {
        let fx = fixture(None).await;

        fx.dispatcher.dispatch(&text_event("U1", "查詢")).await.unwrap();

        let user = fx
            .db
            .user_store()
            .get_user_by_line_id("U1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.name, FALLBACK_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn redelivery_does_not_create_a_duplicate_user() {
        let fx = fixture(Some("Alice")).await;

        fx.dispatcher.dispatch(&text_event("U1", "打卡")).await.unwrap();
        fx.dispatcher.dispatch(&text_event("U1", "打卡")).await.unwrap();

        assert_eq!(fx.db.user_store().count_users().await.unwrap(), 1);
        assert_eq!(fx.db.checkin_store().count_checkins().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn creation_conflict_refetches_existing_user() {
        let fx = fixture(Some("Late name")).await;
        // Simulate losing the creation race: the row appears between the
        // dispatcher's lookup miss and its insert.
        fx.db.user_store().create_user("U1", "Winner").await.unwrap();

        let user = fx.dispatcher.resolve_user("U1").await.unwrap();
        assert_eq!(user.name, "Winner");
        assert_eq!(fx.db.user_store().count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_without_history_replies_no_records() {
        let fx = fixture(Some("Alice")).await;

        fx.dispatcher.dispatch(&text_event("U1", "查詢")).await.unwrap();

        let replies = sent_replies(&fx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, NO_RECORDS_MESSAGE);
    }

    #[tokio::test]
    async fn query_lists_checkins_in_ascending_order() {
        let fx = fixture(Some("Alice")).await;
        let user = fx.db.user_store().create_user("U1", "Alice").await.unwrap();
        fx.db.checkin_store().record_checkin(user.user_id).await.unwrap();
        fx.db.checkin_store().record_checkin(user.user_id).await.unwrap();

        fx.dispatcher.dispatch(&text_event("U1", "query")).await.unwrap();

        let replies = sent_replies(&fx);
        assert_eq!(replies.len(), 1);
        let lines: Vec<&str> = replies[0].1.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0] <= lines[1]);
    }

    #[tokio::test]
    async fn unrecognized_command_replies_help_without_mutation() {
        let fx = fixture(Some("Alice")).await;
        fx.db.user_store().create_user("U1", "Alice").await.unwrap();

        fx.dispatcher.dispatch(&text_event("U1", "hello")).await.unwrap();

        assert_eq!(fx.db.checkin_store().count_checkins().await.unwrap(), 0);
        let replies = sent_replies(&fx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, HELP_MESSAGE);
    }

    #[tokio::test]
    async fn reply_send_failure_is_not_surfaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bot.db").to_string_lossy().into_owned();
        let db = Arc::new(DatabaseManager::new_sqlite(path));
        db.migrate().await.unwrap();

        let sender = Arc::new(RecordingSender {
            replies: Mutex::new(Vec::new()),
            fail: true,
        });
        let dispatcher = Dispatcher::new(
            db.clone(),
            Arc::new(FixedResolver {
                name: Some("Alice".to_string()),
            }),
            sender,
        );

        dispatcher.dispatch(&text_event("U1", "打卡")).await.unwrap();

        // The check-in still landed even though the reply send failed.
        assert_eq!(db.checkin_store().count_checkins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let fx = fixture(Some("Alice")).await;

        fx.dispatcher.dispatch(&WebhookEvent::Unsupported).await.unwrap();

        assert_eq!(fx.db.user_store().count_users().await.unwrap(), 0);
        assert!(sent_replies(&fx).is_empty());
    }

    #[tokio::test]
    async fn group_message_without_user_source_is_ignored() {
        let fx = fixture(Some("Alice")).await;
        let event = WebhookEvent::Message {
            reply_token: "t".to_string(),
            source: EventSource {
                source_type: "group".to_string(),
                user_id: None,
            },
            message: MessageContent::Text {
                text: "打卡".to_string(),
            },
        };

        fx.dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(fx.db.user_store().count_users().await.unwrap(), 0);
        assert!(sent_replies(&fx).is_empty());
    }
}
