//! Query-side retrieval: embed a question and fetch its nearest chunks.

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::SearchHit;

/// Embed `question` and return up to `k` chunks from `index`, most similar
/// first.
///
/// Runs [`embed_question`] then [`nearest`]. Provider and index failures
/// are returned unchanged.
pub async fn retrieve(
    provider: &dyn EmbeddingProvider,
    index: &VectorIndex,
    question: &str,
    k: usize,
) -> Result<Vec<SearchHit>> {
    let query_vector = embed_question(provider, question).await?;
    nearest(index, &query_vector, k)
}

/// First stage of [`retrieve`]: the question's embedding.
pub async fn embed_question(provider: &dyn EmbeddingProvider, question: &str) -> Result<Vec<f32>> {
    provider.embed(question).await
}

/// Second stage of [`retrieve`]: the `k` chunks nearest to `query_vector`.
pub fn nearest(index: &VectorIndex, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
    let hits = index.search(query_vector, k)?;
    tracing::debug!(
        namespace = index.namespace(),
        k,
        returned = hits.len(),
        top_score = hits.first().map(|h| h.score),
        "retrieved chunks"
    );
    Ok(hits)
}
