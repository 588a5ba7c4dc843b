//! Workspace scoping for retrieval candidates.

use std::collections::HashSet;
use std::sync::Arc;

use super::store::{MetadataStore, RetrievalCandidate};
use super::vector_math::by_score_desc;
use crate::core::errors::ApiError;

/// Keeps only candidates whose document is registered in a workspace.
///
/// A workspace without member documents filters everything out. That is
/// not an error; the orchestrator treats it as the fallback signal.
#[derive(Clone)]
pub struct WorkspaceFilter {
    metadata: Arc<dyn MetadataStore>,
}

impl WorkspaceFilter {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn filter(
        &self,
        candidates: Vec<RetrievalCandidate>,
        workspace_id: &str,
    ) -> Result<Vec<RetrievalCandidate>, ApiError> {
        let members = self.metadata.workspace_document_ids(workspace_id).await?;
        tracing::debug!(
            "Workspace {} has {} member documents",
            workspace_id,
            members.len()
        );
        Ok(retain_members(candidates, &members))
    }
}

/// Drops non-members, then re-sorts by descending similarity. The sort is
/// stable, so equal scores keep their incoming order and filtering an
/// already-filtered list is a no-op.
pub fn retain_members(
    candidates: Vec<RetrievalCandidate>,
    members: &HashSet<String>,
) -> Vec<RetrievalCandidate> {
    if members.is_empty() {
        return Vec::new();
    }

    let mut kept: Vec<RetrievalCandidate> = candidates
        .into_iter()
        .filter(|candidate| members.contains(&candidate.document_id))
        .collect();
    kept.sort_by(|a, b| by_score_desc(a.similarity, b.similarity));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::testing::{candidate, InMemoryStore};

    fn members(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn ids(candidates: &[RetrievalCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.unit_id.as_str()).collect()
    }

    #[test]
    fn keeps_only_member_documents() {
        let input = vec![
            candidate("u1", "doc-a", 0.9),
            candidate("u2", "doc-b", 0.8),
            candidate("u3", "doc-a", 0.7),
        ];
        let kept = retain_members(input, &members(&["doc-a"]));
        assert_eq!(ids(&kept), vec!["u1", "u3"]);
    }

    #[test]
    fn empty_membership_filters_everything() {
        let input = vec![candidate("u1", "doc-a", 0.9)];
        assert!(retain_members(input, &HashSet::new()).is_empty());
    }

    #[test]
    fn resorts_disturbed_upstream_order() {
        let input = vec![
            candidate("u1", "doc-a", 0.4),
            candidate("u2", "doc-a", 0.95),
            candidate("u3", "doc-a", 0.6),
        ];
        let kept = retain_members(input, &members(&["doc-a"]));
        assert_eq!(ids(&kept), vec!["u2", "u3", "u1"]);
    }

    #[test]
    fn ties_keep_input_order_and_filtering_is_idempotent() {
        let input = vec![
            candidate("u1", "doc-a", 0.5),
            candidate("u2", "doc-b", 0.5),
            candidate("u3", "doc-x", 0.9),
            candidate("u4", "doc-a", 0.5),
        ];
        let scope = members(&["doc-a", "doc-b"]);

        let once = retain_members(input, &scope);
        assert_eq!(ids(&once), vec!["u1", "u2", "u4"]);

        let twice = retain_members(once.clone(), &scope);
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn filter_reads_membership_from_store() {
        let store = Arc::new(InMemoryStore::default());
        store.add_membership("doc-a", "ws-1");
        store.add_membership("doc-b", "ws-2");

        let filter = WorkspaceFilter::new(store.clone());
        let kept = filter
            .filter(
                vec![candidate("u1", "doc-a", 0.8), candidate("u2", "doc-b", 0.9)],
                "ws-1",
            )
            .await
            .unwrap();

        assert_eq!(ids(&kept), vec!["u1"]);
        assert_eq!(store.membership_lookups(), 1);

        let none = filter
            .filter(vec![candidate("u1", "doc-a", 0.8)], "ws-unknown")
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
