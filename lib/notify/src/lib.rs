//! The progress notifier (component C12): forwards phase/percent
//! updates to an external push channel and records exactly one in-app
//! notification per workflow terminus. Section 4.12.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use rsgo_client::entities::notify::{InAppNotification, ProgressUpdate};
use tokio::sync::Mutex;

/// `"<op>-<productName>-<utcTimestampMillis>"`, used when the caller
/// doesn't supply its own `sessionId`.
pub fn synthesize_session_id(op: &str, product_name: &str) -> String {
  format!("{op}-{product_name}-{}", Utc::now().timestamp_millis())
}

#[async_trait]
pub trait ProgressNotifier: Send + Sync {
  async fn progress(&self, update: ProgressUpdate);

  /// Records the terminal in-app notification for a workflow. A second
  /// call for the same `session_id` is a no-op (exactly-once per workflow).
  async fn completed(&self, notification: InAppNotification);

  async fn error(&self, session_id: &str, message: &str);
}

#[derive(Default)]
pub struct InMemoryNotifier {
  progress_log: Mutex<Vec<ProgressUpdate>>,
  notifications: Mutex<Vec<InAppNotification>>,
  terminated_sessions: Mutex<HashSet<String>>,
}

impl InMemoryNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn progress_updates(&self) -> Vec<ProgressUpdate> {
    self.progress_log.lock().await.clone()
  }

  pub async fn notifications(&self) -> Vec<InAppNotification> {
    self.notifications.lock().await.clone()
  }

  async fn mark_terminated(&self, session_id: &str) -> bool {
    self.terminated_sessions.lock().await.insert(session_id.to_string())
  }
}

#[async_trait]
impl ProgressNotifier for InMemoryNotifier {
  async fn progress(&self, update: ProgressUpdate) {
    tracing::debug!(
      session_id = %update.session_id,
      phase = %update.phase,
      percent = update.overall_percent,
      "deployment progress"
    );
    self.progress_log.lock().await.push(update);
  }

  async fn completed(&self, notification: InAppNotification) {
    if !self.mark_terminated(&notification.session_id).await {
      return;
    }
    tracing::info!(
      session_id = %notification.session_id,
      success = notification.success,
      "workflow terminated"
    );
    self.notifications.lock().await.push(notification);
  }

  async fn error(&self, session_id: &str, message: &str) {
    if !self.mark_terminated(session_id).await {
      return;
    }
    tracing::error!(session_id, message, "workflow failed");
    self.notifications.lock().await.push(InAppNotification {
      session_id: session_id.to_string(),
      product_name: String::new(),
      product_version: String::new(),
      stack_count: 0,
      success: false,
      message: message.to_string(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn notification(session_id: &str, success: bool) -> InAppNotification {
    InAppNotification {
      session_id: session_id.to_string(),
      product_name: "demo".to_string(),
      product_version: "1.0.0".to_string(),
      stack_count: 2,
      success,
      message: "done".to_string(),
    }
  }

  #[tokio::test]
  async fn completed_records_exactly_once_per_session() {
    let notifier = InMemoryNotifier::new();
    notifier.completed(notification("sess-1", true)).await;
    notifier.completed(notification("sess-1", false)).await;

    let recorded = notifier.notifications().await;
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].success);
  }

  #[tokio::test]
  async fn error_after_completed_for_same_session_is_ignored() {
    let notifier = InMemoryNotifier::new();
    notifier.completed(notification("sess-1", true)).await;
    notifier.error("sess-1", "too late").await;

    assert_eq!(notifier.notifications().await.len(), 1);
  }

  #[test]
  fn session_id_carries_op_and_product() {
    let id = synthesize_session_id("deploy", "demo-app");
    assert!(id.starts_with("deploy-demo-app-"));
  }
}
