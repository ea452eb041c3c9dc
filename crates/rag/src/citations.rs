use crate::domain::Citation;
use grounded_knowledge::ScoredChunk;
use std::collections::{BTreeSet, HashMap};

/// Turns the supporting chunk ids of a grounded decision into citations.
pub struct CitationBuilder;

impl CitationBuilder {
    /// One citation per distinct supporting chunk, highest relevance first.
    ///
    /// Ids that do not name a retrieved chunk are ignored. Duplicate chunks
    /// keep their best score.
    pub fn build(supporting_ids: &BTreeSet<String>, chunks: &[ScoredChunk]) -> Vec<Citation> {
        let mut best: HashMap<&str, &ScoredChunk> = HashMap::new();
        for scored in chunks {
            if !supporting_ids.contains(&scored.chunk.id) {
                continue;
            }
            best.entry(scored.chunk.id.as_str())
                .and_modify(|current| {
                    if scored.score > current.score {
                        *current = scored;
                    }
                })
                .or_insert(scored);
        }

        let mut citations: Vec<Citation> = best
            .into_values()
            .map(|scored| Citation {
                source_document: scored.chunk.source_document().to_string(),
                page: scored.chunk.page(),
                chunk_id: scored.chunk.id.clone(),
                relevance_score: clamp_score(scored.score),
            })
            .collect();

        citations.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        citations
    }
}

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounded_knowledge::Chunk;

    fn chunk(id: &str, source: &str, page: Option<u32>, score: f32) -> ScoredChunk {
        let mut metadata = serde_json::json!({ "source_document": source });
        if let Some(page) = page {
            metadata["page"] = serde_json::json!(page);
        }
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                document_id: "doc".to_string(),
                position: 0,
                content: "text".to_string(),
                embedding: Vec::new(),
                metadata,
            },
            score,
        }
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_only_supporting_chunks_are_cited() {
        let chunks = vec![
            chunk("a", "warranty.pdf", Some(3), 0.9),
            chunk("b", "shipping.md", None, 0.8),
        ];
        let citations = CitationBuilder::build(&ids(&["a"]), &chunks);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_id, "a");
        assert_eq!(citations[0].source_document, "warranty.pdf");
        assert_eq!(citations[0].page, Some(3));
    }

    #[test]
    fn test_duplicates_keep_best_score_and_order_is_stable() {
        let chunks = vec![
            chunk("b", "b.md", None, 0.4),
            chunk("a", "a.md", None, 0.6),
            chunk("b", "b.md", None, 0.6),
            chunk("c", "c.md", None, 1.7),
        ];
        let citations = CitationBuilder::build(&ids(&["a", "b", "c"]), &chunks);

        let order: Vec<&str> = citations.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(citations[0].relevance_score, 1.0);
        assert_eq!(citations[2].relevance_score, 0.6);
    }

    #[test]
    fn test_unknown_ids_yield_nothing() {
        let chunks = vec![chunk("a", "a.md", None, 0.9)];
        assert!(CitationBuilder::build(&ids(&["z"]), &chunks).is_empty());
    }
}
