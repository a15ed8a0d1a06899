//! Semantic document search over stored embeddings.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::cache::{CacheKey, ResultCache};
use crate::error::{EngineError, Result};
use crate::llm::EmbeddingProvider;
use crate::math::vector::{cosine_similarity, validate_embedding};
use crate::models::{normalize_tags, Document, DocumentHit, DocumentId};
use crate::store::Store;
use crate::upstream::RetryPolicy;

/// Cosine-similarity search over the document corpus.
pub struct DocumentIndex {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: ResultCache<Vec<DocumentHit>>,
    retry: RetryPolicy,
}

impl DocumentIndex {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: ResultCache<Vec<DocumentHit>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            cache,
            retry,
        }
    }

    /// Top `top_k` documents for `query`, best first, ties by ascending id.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentHit>> {
        self.search_tagged(query, top_k, None).await
    }

    /// Like [`search`](Self::search), restricted to documents carrying any of
    /// `tags`.
    pub async fn search_tagged(
        &self,
        query: &str,
        top_k: usize,
        tags: Option<&[String]>,
    ) -> Result<Vec<DocumentHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::invalid("query text is required"));
        }
        if top_k == 0 {
            return Err(EngineError::invalid("top_k must be positive"));
        }

        // An empty tag list filters nothing.
        let tags = tags.filter(|t| !normalize_tags(t.iter()).is_empty());
        let tag_key = tags.map(|t| {
            normalize_tags(t)
                .into_iter()
                .collect::<Vec<_>>()
                .join("\u{1f}")
        });
        let key = CacheKey::builder("documents")
            .str(query)
            .u64(top_k as u64)
            .opt_str(tag_key.as_deref())
            .finish();

        self.cache
            .get_or_try_insert(key, self.cache.default_ttl(), self.compute(query, top_k, tags))
            .await
    }

    async fn compute(
        &self,
        query: &str,
        top_k: usize,
        tags: Option<&[String]>,
    ) -> Result<Vec<DocumentHit>> {
        let embedding = self.embed_query(query).await?;
        let docs = self
            .retry
            .run("load documents", || self.store.load_documents(tags))
            .await?;
        let hits = rank_documents(&embedding, &docs, top_k);
        tracing::debug!(
            "document search ranked {} candidates, returning {}",
            docs.len(),
            hits.len()
        );
        Ok(hits)
    }

    /// Embed query text, requiring the provider's declared dimensionality.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let unavailable = |e: EngineError| EngineError::EmbeddingUnavailable {
            reason: e.to_string(),
        };
        let embedding = self
            .retry
            .run("embed query", || self.embedder.embed(text))
            .await
            .map_err(unavailable)?;
        validate_embedding(&embedding, self.embedder.dimension()).map_err(unavailable)?;
        Ok(embedding)
    }

    pub fn cache(&self) -> &ResultCache<Vec<DocumentHit>> {
        &self.cache
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

struct Ranked<'a> {
    score: f32,
    doc: &'a Document,
}

impl Ranked<'_> {
    fn id(&self) -> DocumentId {
        self.doc.id
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked<'_> {
    /// Greater means better: higher score, then lower id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id().cmp(&self.id()))
    }
}

/// Select the `top_k` best documents in O(n log k) with a bounded min-heap.
///
/// Documents whose embedding does not match the query's dimensionality, or
/// is degenerate, are skipped and logged; the rest are still ranked.
pub fn rank_documents(query: &[f32], docs: &[Document], top_k: usize) -> Vec<DocumentHit> {
    if top_k == 0 {
        return Vec::new();
    }

    let capacity = top_k.min(docs.len()).saturating_add(1);
    let mut heap: BinaryHeap<Reverse<Ranked<'_>>> = BinaryHeap::with_capacity(capacity);
    for doc in docs {
        if let Err(e) = validate_embedding(&doc.embedding, query.len()) {
            tracing::warn!("Skipping document {} ({}): {e}", doc.id, doc.title);
            continue;
        }
        let score = match cosine_similarity(query, &doc.embedding) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Skipping document {} ({}): {e}", doc.id, doc.title);
                continue;
            }
        };
        heap.push(Reverse(Ranked { score, doc }));
        if heap.len() > top_k {
            heap.pop();
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(r)| DocumentHit::from_document(r.doc, r.score))
        .collect()
}
