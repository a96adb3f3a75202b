//! Source extraction
//!
//! Derives the citation list from the chunks that actually made it into
//! the final prompt, so a cited source always corresponds to content the
//! model saw. URLs are deduplicated, keeping first-occurrence order.

use crate::types::ScoredChunk;

pub fn extract_sources(chunks_used: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for scored in chunks_used {
        let url = &scored.chunk.source_url;
        if !url.is_empty() && !sources.contains(url) {
            sources.push(url.clone());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn chunk(url: &str, index: u32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("c{}", index),
                text: "text".to_string(),
                source_id: "doc".to_string(),
                source_name: "Doc".to_string(),
                source_url: url.to_string(),
                chunk_index: index,
            },
            score: 0.8,
        }
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let chunks = vec![
            chunk("https://drive.google.com/doc1", 0),
            chunk("https://drive.google.com/doc2", 1),
            chunk("https://drive.google.com/doc1", 2),
        ];
        assert_eq!(
            extract_sources(&chunks),
            vec![
                "https://drive.google.com/doc1".to_string(),
                "https://drive.google.com/doc2".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_urls_skipped() {
        let chunks = vec![chunk("", 0), chunk("https://drive.google.com/doc1", 1)];
        assert_eq!(
            extract_sources(&chunks),
            vec!["https://drive.google.com/doc1".to_string()]
        );
    }

    #[test]
    fn test_no_chunks_no_sources() {
        assert!(extract_sources(&[]).is_empty());
    }
}
