//! Chat session state and the deferred-write queue
//!
//! Step and element writes issued before the first user message are queued
//! instead of persisted, so sessions that never receive a message leave no
//! empty threads behind. The first user message flushes the queue in order.

mod pending;

pub use pending::PendingWrite;

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::SessionEvent;
use crate::storage::ids::{ElementId, StepId, ThreadId};
use crate::storage::traits::DataLayer;
use crate::storage::types::{Element, StepDict, ThreadUpdate};
use crate::widgets::WidgetCallback;

/// Metadata key under which chat settings are persisted with the thread
const CHAT_SETTINGS_KEY: &str = "chat_settings";

/// One client session bound to a thread
pub struct ChatSession<D: DataLayer + ?Sized> {
    data_layer: Arc<D>,
    thread_id: ThreadId,
    has_first_interaction: bool,
    pending: VecDeque<PendingWrite>,
    widget_callbacks: HashMap<String, WidgetCallback>,
    user_session: Map<String, Value>,
    chat_settings: Map<String, Value>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl<D: DataLayer + ?Sized> ChatSession<D> {
    /// Create a session and the receiving end of its event channel
    pub fn new(
        data_layer: Arc<D>,
        thread_id: ThreadId,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = Self {
            data_layer,
            thread_id,
            has_first_interaction: false,
            pending: VecDeque::new(),
            widget_callbacks: HashMap::new(),
            user_session: Map::new(),
            chat_settings: Map::new(),
            event_tx,
        };
        (session, event_rx)
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn data_layer(&self) -> &Arc<D> {
        &self.data_layer
    }

    pub fn has_first_interaction(&self) -> bool {
        self.has_first_interaction
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingWrite> {
        self.pending.iter()
    }

    /// Drop queued writes without applying them
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    async fn write_or_queue(&mut self, write: PendingWrite) -> Result<()> {
        if self.has_first_interaction {
            write.apply(self.data_layer.as_ref()).await
        } else {
            tracing::debug!("Queueing {} until the first user message", write.operation());
            self.pending.push_back(write);
            Ok(())
        }
    }

    pub async fn create_step(&mut self, step: StepDict) -> Result<()> {
        self.write_or_queue(PendingWrite::CreateStep(step)).await
    }

    pub async fn update_step(&mut self, step: StepDict) -> Result<()> {
        self.write_or_queue(PendingWrite::UpdateStep(step)).await
    }

    pub async fn delete_step(&mut self, step_id: StepId) -> Result<()> {
        self.write_or_queue(PendingWrite::DeleteStep(step_id)).await
    }

    pub async fn create_element(&mut self, element: Element) -> Result<()> {
        self.write_or_queue(PendingWrite::CreateElement(element)).await
    }

    pub async fn delete_element(
        &mut self,
        element_id: ElementId,
        thread_id: Option<ThreadId>,
    ) -> Result<()> {
        self.write_or_queue(PendingWrite::DeleteElement {
            element_id,
            thread_id,
        })
        .await
    }

    /// Apply queued writes in order. A failed write is logged and skipped.
    ///
    /// Returns how many writes succeeded.
    pub async fn flush_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(write) = self.pending.pop_front() {
            match write.apply(self.data_layer.as_ref()).await {
                Ok(()) => applied += 1,
                Err(e) => tracing::error!("Failed to apply queued {}: {:#}", write.operation(), e),
            }
        }
        applied
    }

    /// Record the user's message: flushes the queue, then persists `step`.
    ///
    /// Returns how many queued writes succeeded.
    pub async fn on_user_message(&mut self, step: StepDict) -> Result<usize> {
        self.has_first_interaction = true;
        let applied = self.flush_pending().await;
        self.data_layer.create_step(&step).await?;
        Ok(applied)
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Session event receiver dropped");
        }
    }

    pub(crate) fn register_widget_callback(&mut self, widget_id: String, callback: WidgetCallback) {
        self.widget_callbacks.insert(widget_id, callback);
    }

    pub fn has_widget_callback(&self, widget_id: &str) -> bool {
        self.widget_callbacks.contains_key(widget_id)
    }

    /// Handle a `{id, value}` change reported by the client.
    ///
    /// The value is stored in the user session under the widget id and passed
    /// to the widget's callback. Callback failures are logged.
    pub async fn handle_widget_change(&mut self, payload: &Value) {
        let Some(widget_id) = payload
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        else {
            tracing::warn!("Received input_widget_change event without widget_id");
            return;
        };
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        self.user_session.insert(widget_id.to_string(), value.clone());

        let Some(callback) = self.widget_callbacks.get(widget_id).cloned() else {
            tracing::warn!("No on_change callback found for widget {}", widget_id);
            return;
        };
        match callback(value.clone()).await {
            Ok(()) => tracing::debug!("Executed on_change for widget {} with value {}", widget_id, value),
            Err(e) => tracing::error!(
                "Error processing input_widget_change for {}: {:#}",
                widget_id,
                e
            ),
        }
    }

    pub fn user_value(&self, key: &str) -> Option<&Value> {
        self.user_session.get(key)
    }

    pub fn set_user_value(&mut self, key: impl Into<String>, value: Value) {
        self.user_session.insert(key.into(), value);
    }

    pub fn chat_settings(&self) -> &Map<String, Value> {
        &self.chat_settings
    }

    /// Merge changed settings into the session
    pub fn update_chat_settings(&mut self, settings: Map<String, Value>) {
        self.chat_settings.extend(settings);
    }

    /// User session values plus chat settings, as stored in thread metadata
    pub fn to_persistable(&self) -> Map<String, Value> {
        let mut metadata = self.user_session.clone();
        metadata.insert(
            CHAT_SETTINGS_KEY.to_string(),
            Value::Object(self.chat_settings.clone()),
        );
        metadata
    }

    /// Save the session into its thread's metadata
    pub async fn persist(&self) -> Result<()> {
        self.data_layer
            .update_thread(&self.thread_id, ThreadUpdate::new().metadata(self.to_persistable()))
            .await
    }

    /// Restore session state from the stored thread owned by `user_identifier`.
    ///
    /// A resumed thread already exists, so writes are no longer queued.
    /// Returns false when the thread is not found or belongs to someone else.
    pub async fn resume(&mut self, user_identifier: &str) -> Result<bool> {
        let Some(thread) = self.data_layer.get_thread(&self.thread_id).await? else {
            return Ok(false);
        };
        if thread.user_identifier.as_deref() != Some(user_identifier) {
            tracing::warn!("Thread {} is not owned by {}", self.thread_id, user_identifier);
            return Ok(false);
        }
        let mut metadata = thread.metadata.unwrap_or_default();
        if let Some(Value::Object(settings)) = metadata.remove(CHAT_SETTINGS_KEY) {
            self.chat_settings = settings;
        }
        self.user_session = metadata;
        self.has_first_interaction = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::memory::MemoryStorageClient;
    use crate::storage::implementations::sqlite::{DataLayerOptions, SqliteDataLayer};
    use crate::storage::types::{ElementType, StepType};
    use crate::widgets::{InputBar, InputWidget};
    use serde_json::json;

    fn session() -> (
        ChatSession<SqliteDataLayer>,
        mpsc::UnboundedReceiver<SessionEvent>,
        Arc<MemoryStorageClient>,
    ) {
        let storage = Arc::new(MemoryStorageClient::new());
        let layer =
            SqliteDataLayer::in_memory(DataLayerOptions::default().with_storage(storage.clone()))
                .unwrap();
        let (session, events) = ChatSession::new(Arc::new(layer), ThreadId::new());
        (session, events, storage)
    }

    #[tokio::test]
    async fn test_writes_queue_until_user_message() {
        let (mut session, _events, storage) = session();
        let thread_id = session.thread_id().clone();
        let step = StepDict::new(thread_id.clone(), "assistant", StepType::AssistantMessage)
            .with_output("Welcome")
            .with_created_at("2024-01-01T00:00:00Z");
        let element = Element::new(ElementType::Text, "intro.txt")
            .attached_to(thread_id.clone(), step.id.clone())
            .with_content(b"intro".to_vec());

        session.create_step(step.clone()).await.unwrap();
        session.create_element(element).await.unwrap();
        assert_eq!(session.pending_len(), 2);
        assert!(session.data_layer().get_thread(&thread_id).await.unwrap().is_none());

        let message = StepDict::user_message(thread_id.clone(), "alice", "Hi")
            .with_created_at("2024-01-01T00:00:01Z");
        assert_eq!(session.on_user_message(message).await.unwrap(), 2);
        assert_eq!(session.pending_len(), 0);
        assert_eq!(storage.len(), 1);

        let thread = session.data_layer().get_thread(&thread_id).await.unwrap().unwrap();
        let outputs: Vec<&str> = thread.steps.iter().map(|s| s.output.as_str()).collect();
        assert_eq!(outputs, vec!["Welcome", "Hi"]);
        assert_eq!(thread.elements.len(), 1);

        let later = StepDict::new(thread_id.clone(), "tool", StepType::Tool);
        session.create_step(later).await.unwrap();
        assert_eq!(session.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_queued_write_does_not_stop_flush() {
        let (mut session, _events, _storage) = session();
        let thread_id = session.thread_id().clone();
        let broken = Element::new(ElementType::File, "empty")
            .attached_to(thread_id.clone(), StepId::new());
        session.create_element(broken).await.unwrap();
        session
            .create_step(StepDict::new(thread_id.clone(), "run", StepType::Run))
            .await
            .unwrap();

        let message = StepDict::user_message(thread_id.clone(), "alice", "go");
        assert_eq!(session.on_user_message(message).await.unwrap(), 1);

        let thread = session.data_layer().get_thread(&thread_id).await.unwrap().unwrap();
        assert_eq!(thread.steps.len(), 2);
        assert!(thread.elements.is_empty());
    }

    #[tokio::test]
    async fn test_clear_pending_discards_writes() {
        let (mut session, _events, _storage) = session();
        let thread_id = session.thread_id().clone();
        session
            .create_step(StepDict::new(thread_id.clone(), "run", StepType::Run))
            .await
            .unwrap();
        session.delete_step(StepId::new()).await.unwrap();
        assert_eq!(
            session.pending().map(PendingWrite::operation).collect::<Vec<_>>(),
            vec!["create_step", "delete_step"]
        );

        session.clear_pending();
        assert_eq!(session.flush_pending().await, 0);
        assert!(session.data_layer().get_thread(&thread_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_widgets_emits_and_routes_changes() {
        let (mut session, mut events, _storage) = session();
        let (tx, mut seen) = mpsc::unbounded_channel();
        let widgets = vec![
            InputWidget::slider("slider_demo", "Demo Slider", 0.0, 100.0, 50.0, 1.0).on_change(
                move |value| {
                    let tx = tx.clone();
                    async move {
                        tx.send(value)?;
                        Ok::<(), anyhow::Error>(())
                    }
                },
            ),
            InputWidget::switch("switch_demo", "", false),
        ];

        InputBar::set_widgets(&mut session, widgets).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.name(), "set_input_widgets");
        let SessionEvent::SetInputWidgets(dicts) = event;
        assert_eq!(dicts.len(), 2);
        assert_eq!(dicts[0]["id"], "slider_demo");
        assert_eq!(dicts[1]["label"], "");
        assert!(session.has_widget_callback("slider_demo"));
        assert!(!session.has_widget_callback("switch_demo"));

        session
            .handle_widget_change(&json!({"id": "slider_demo", "value": 75}))
            .await;
        assert_eq!(seen.recv().await, Some(json!(75)));
        assert_eq!(session.user_value("slider_demo"), Some(&json!(75)));

        session
            .handle_widget_change(&json!({"id": "switch_demo", "value": true}))
            .await;
        assert_eq!(session.user_value("switch_demo"), Some(&json!(true)));

        session.handle_widget_change(&json!({"value": 1})).await;
        assert_eq!(session.user_value("value"), None);

        session.handle_widget_change(&json!({"id": "", "value": 5})).await;
        assert_eq!(session.user_value(""), None);
    }

    #[tokio::test]
    async fn test_duplicate_widget_ids_rejected() {
        let (mut session, mut events, _storage) = session();
        let widgets = vec![
            InputWidget::switch("same", "A", false),
            InputWidget::switch("same", "B", true),
        ];
        let err = InputBar::set_widgets(&mut session, widgets).unwrap_err();
        assert_eq!(
            err.downcast_ref::<crate::error::WidgetError>(),
            Some(&crate::error::WidgetError::DuplicateId("same".into()))
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_callback_is_contained() {
        let (mut session, _events, _storage) = session();
        let widget = InputWidget::text_input("name", "Name")
            .on_change(|_| async { Err::<(), _>(anyhow::anyhow!("boom")) });
        InputBar::set_widgets(&mut session, vec![widget]).unwrap();

        session
            .handle_widget_change(&json!({"id": "name", "value": "x"}))
            .await;
        assert_eq!(session.user_value("name"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_persist_and_resume() {
        let (mut session, _events, _storage) = session();
        let thread_id = session.thread_id().clone();
        let owner = session
            .data_layer()
            .create_user(&crate::storage::types::User::new("ivy"))
            .await
            .unwrap()
            .unwrap();
        session
            .data_layer()
            .update_thread(&thread_id, ThreadUpdate::new().user(owner.id.clone()))
            .await
            .unwrap();
        session.set_user_value("language", json!("fr"));
        let mut settings = Map::new();
        settings.insert("temperature".into(), json!(0.2));
        session.update_chat_settings(settings);
        session.persist().await.unwrap();

        let layer = Arc::clone(session.data_layer());
        let (mut stranger, _rx) = ChatSession::new(Arc::clone(&layer), thread_id.clone());
        assert!(!stranger.resume("mallory").await.unwrap());
        assert!(!stranger.has_first_interaction());
        assert_eq!(stranger.user_value("language"), None);

        let (mut resumed, _rx) = ChatSession::new(layer, thread_id);
        assert!(resumed.resume("ivy").await.unwrap());
        assert!(resumed.has_first_interaction());
        assert_eq!(resumed.user_value("language"), Some(&json!("fr")));
        assert_eq!(resumed.chat_settings()["temperature"], json!(0.2));

        let (mut missing, _rx) = ChatSession::new(Arc::clone(session.data_layer()), ThreadId::new());
        assert!(!missing.resume("ivy").await.unwrap());
    }
}
