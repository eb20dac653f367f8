//! Preference reconciliation: merge freshly extracted category/value pairs
//! into the user's existing category set and upsert the result.
//!
//! The semantic-equivalence judgment happens once, inside the generation
//! call, which receives the full existing category set; its output category
//! is trusted and matched by exact string identity from then on. Persistence
//! is best-effort per item: one failed write never aborts the siblings, and
//! the reconciled values are returned to the caller either way.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use minuteman_core::Preference;
use minuteman_db::repositories::PreferenceRepository;

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::prompts;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistStatus {
    Stored,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconciledPreference {
    pub category: String,
    pub preference: String,
    pub persisted: PersistStatus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PreferenceList {
    preferences: Vec<Preference>,
}

pub struct PreferenceReconciler {
    llm: Arc<dyn LlmClient>,
    preferences: Arc<dyn PreferenceRepository>,
}

impl PreferenceReconciler {
    pub fn new(llm: Arc<dyn LlmClient>, preferences: Arc<dyn PreferenceRepository>) -> Self {
        Self { llm, preferences }
    }

    pub async fn reconcile(
        &self,
        user_id: i64,
        text: &str,
    ) -> Result<Vec<ReconciledPreference>, AgentError> {
        let existing = match self.preferences.map_for_user(user_id).await {
            Ok(existing) => existing,
            Err(error) => {
                // Reconciliation still works without the existing set; the
                // model just cannot merge into categories it cannot see.
                warn!(user_id, "could not load existing preferences: {error}");
                BTreeMap::new()
            }
        };

        let system = prompts::preference_system(&existing);
        let payload = self.llm.complete_json(&system, text).await?;
        let list: PreferenceList = serde_json::from_value(payload).map_err(|error| {
            AgentError::SchemaValidation(format!("payload does not match schema: {error}"))
        })?;

        let mut reconciled = Vec::with_capacity(list.preferences.len());
        for item in list.preferences {
            let persisted = match self
                .preferences
                .upsert(user_id, &item.category, &item.preference)
                .await
            {
                Ok(()) => PersistStatus::Stored,
                Err(error) => {
                    warn!(
                        user_id,
                        category = %item.category,
                        "preference write failed, continuing with siblings: {error}"
                    );
                    PersistStatus::Failed(error.to_string())
                }
            };
            reconciled.push(ReconciledPreference {
                category: item.category,
                preference: item.preference,
                persisted,
            });
        }

        Ok(reconciled)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use minuteman_db::repositories::{
        InMemoryPreferenceRepository, PreferenceRepository, RepositoryError,
    };

    use crate::testing::ScriptedLlm;

    use super::{PersistStatus, PreferenceReconciler};

    #[tokio::test]
    async fn semantically_equivalent_category_merges_into_existing_row() {
        let store = Arc::new(InMemoryPreferenceRepository::default());
        store.upsert(1, "部门", "平台研发部").await.expect("seed");

        // The model, given the existing set, answers with the existing name.
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"preferences": [{"category": "部门", "preference": "基础架构部"}]}"#,
        ]));
        let reconciler = PreferenceReconciler::new(llm, store.clone());

        let result = reconciler.reconcile(1, "我现在在基础架构部").await.expect("reconcile");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].category, "部门");
        assert_eq!(result[0].persisted, PersistStatus::Stored);

        let map = store.map_for_user(1).await.expect("map");
        assert_eq!(map.len(), 1, "merge must not create a second category row");
        assert_eq!(map.get("部门").map(String::as_str), Some("基础架构部"));
    }

    #[tokio::test]
    async fn reconciling_the_same_pair_twice_keeps_one_row() {
        let store = Arc::new(InMemoryPreferenceRepository::default());
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"preferences": [{"category": "称呼", "preference": "老张"}]}"#,
            r#"{"preferences": [{"category": "称呼", "preference": "老张"}]}"#,
        ]));
        let reconciler = PreferenceReconciler::new(llm, store.clone());

        reconciler.reconcile(1, "叫我老张").await.expect("first");
        reconciler.reconcile(1, "叫我老张").await.expect("second");

        let map = store.map_for_user(1).await.expect("map");
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn one_failed_write_does_not_abort_siblings() {
        struct FlakyStore {
            inner: InMemoryPreferenceRepository,
            fail_next: AtomicBool,
        }

        #[async_trait]
        impl PreferenceRepository for FlakyStore {
            async fn upsert(
                &self,
                user_id: i64,
                category: &str,
                value: &str,
            ) -> Result<(), RepositoryError> {
                if self.fail_next.swap(false, Ordering::SeqCst) {
                    return Err(RepositoryError::Decode("disk full".to_string()));
                }
                self.inner.upsert(user_id, category, value).await
            }

            async fn map_for_user(
                &self,
                user_id: i64,
            ) -> Result<BTreeMap<String, String>, RepositoryError> {
                self.inner.map_for_user(user_id).await
            }
        }

        let store = Arc::new(FlakyStore {
            inner: InMemoryPreferenceRepository::default(),
            fail_next: AtomicBool::new(true),
        });
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"preferences": [{"category": "称呼", "preference": "老张"},
                                {"category": "语言", "preference": "中文"}]}"#,
        ]));
        let reconciler = PreferenceReconciler::new(llm, store.clone());

        let result = reconciler.reconcile(1, "……").await.expect("reconcile");
        assert_eq!(result.len(), 2, "both items come back even when one write fails");
        assert!(matches!(result[0].persisted, PersistStatus::Failed(_)));
        assert_eq!(result[1].persisted, PersistStatus::Stored);

        let map = store.map_for_user(1).await.expect("map");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("语言").map(String::as_str), Some("中文"));
    }

    #[tokio::test]
    async fn malformed_payload_is_a_schema_failure() {
        let store = Arc::new(InMemoryPreferenceRepository::default());
        let llm = Arc::new(ScriptedLlm::new(vec![r#"{"prefs": []}"#]));
        let reconciler = PreferenceReconciler::new(llm, store);

        let result = reconciler.reconcile(1, "……").await;
        assert!(matches!(result, Err(crate::AgentError::SchemaValidation(_))));
    }
}
