use groundrag_core::types::EvidenceSet;

const INSTRUCTIONS: &str = "Answer the question using only the numbered evidence below. \
Cite the evidence number in square brackets after every sentence, for example [1]. \
Copy figures, part numbers and intervals exactly as written. \
If the evidence does not answer the question, say so instead of guessing.";

/// Numbered evidence blocks `[i] (source, page)` followed by the clean query.
pub fn build_prompt(query: &str, evidence: &EvidenceSet) -> String {
    let mut out = String::with_capacity(256 + evidence.iter().map(|c| c.chunk.text.len() + 32).sum::<usize>());
    out.push_str(INSTRUCTIONS);
    out.push_str("\n\nEvidence:\n");
    for (i, candidate) in evidence.iter().enumerate() {
        let chunk = &candidate.chunk;
        let header = match chunk.page {
            Some(page) => format!("[{}] ({}, page {})\n", i + 1, chunk.source, page),
            None => format!("[{}] ({})\n", i + 1, chunk.source),
        };
        out.push_str(&header);
        out.push_str(chunk.text.trim());
        out.push_str("\n\n");
    }
    out.push_str(&format!("Question: {}\nAnswer:", query.trim()));
    out
}
