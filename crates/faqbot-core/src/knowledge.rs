//! Q&A knowledge base: dataset loading with graceful fallback, exact and
//! substring lookup, and the category keyword table.

use crate::embed::Embedder;
use crate::error::EngineError;
use crate::normalize::Normalizer;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single question/answer pair. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Built-in dataset used when the configured file is missing or malformed.
fn default_pairs() -> Vec<QaPair> {
    [
        (
            "What are the admission requirements?",
            "Minimum 5 credits including Math and English",
        ),
        (
            "How much are the school fees?",
            "Fee structures vary by program. Contact bursary@crescent.edu.ng for the current schedule.",
        ),
        (
            "What courses are offered?",
            "The university offers programmes in Law, Computer Science, Engineering, Business Administration, and the Sciences.",
        ),
        (
            "How do I apply for a hostel?",
            "Hostel applications open at the start of each session through the student portal.",
        ),
        (
            "Where is the university located?",
            "The campus is located in Abeokuta, Ogun State.",
        ),
    ]
    .into_iter()
    .map(|(q, a)| QaPair {
        question: q.to_string(),
        answer: a.to_string(),
    })
    .collect()
}

/// Ordered Q&A pairs plus index-aligned precomputed question embeddings.
/// Built once at startup; read-only thereafter, so it can be shared across
/// sessions without locking.
pub struct KnowledgeBase {
    pairs: Vec<QaPair>,
    normalized_questions: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl KnowledgeBase {
    /// Builds the knowledge base from explicit pairs, normalizing and
    /// embedding every question. `len(questions) == len(embeddings)` holds
    /// by construction.
    pub fn from_pairs(
        pairs: Vec<QaPair>,
        normalizer: &Normalizer,
        embedder: &dyn Embedder,
    ) -> Self {
        let normalized_questions: Vec<String> = pairs
            .iter()
            .map(|p| normalizer.normalize(&p.question))
            .collect();
        let embeddings: Vec<Vec<f32>> = normalized_questions
            .iter()
            .map(|q| embedder.embed(q))
            .collect();
        tracing::info!(
            target: "faqbot::knowledge",
            entries = pairs.len(),
            "knowledge base built"
        );
        Self {
            pairs,
            normalized_questions,
            embeddings,
        }
    }

    /// Loads `qa_dataset.json` (falling back to `qa_dataset.txt` in `Q:`/`A:`
    /// format) from the data directory. Any load failure substitutes the
    /// built-in default list with a warning; never fatal.
    pub fn load<P: AsRef<Path>>(
        data_dir: P,
        normalizer: &Normalizer,
        embedder: &dyn Embedder,
    ) -> Self {
        let dir = data_dir.as_ref();
        let json_path = dir.join("qa_dataset.json");
        let pairs = match load_json_pairs(&json_path) {
            Ok(pairs) => pairs,
            Err(json_err) => {
                let text_path = dir.join("qa_dataset.txt");
                match load_text_pairs(&text_path) {
                    Ok(pairs) => pairs,
                    Err(_) => {
                        tracing::warn!(
                            target: "faqbot::knowledge",
                            error = %json_err,
                            "dataset not loaded; using built-in default list"
                        );
                        default_pairs()
                    }
                }
            }
        };
        Self::from_pairs(pairs, normalizer, embedder)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn answer(&self, index: usize) -> &str {
        &self.pairs[index].answer
    }

    pub fn question(&self, index: usize) -> &str {
        &self.pairs[index].question
    }

    /// Precomputed question embeddings, index-aligned with the pairs.
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Case-insensitive equality against each stored question's normalized
    /// form. O(n) scan; first match wins.
    pub fn exact_match(&self, normalized_query: &str) -> Option<usize> {
        self.normalized_questions
            .iter()
            .position(|q| q == normalized_query)
    }

    /// True containment in either direction between the normalized query and
    /// a stored question, in storage order. Deliberately permissive; short
    /// questions can false-positive, which the caller's confidence scoring
    /// accepts.
    pub fn substring_match(&self, normalized_query: &str) -> Option<usize> {
        if normalized_query.is_empty() {
            return None;
        }
        self.normalized_questions.iter().position(|q| {
            !q.is_empty() && (normalized_query.contains(q.as_str()) || q.contains(normalized_query))
        })
    }
}

fn load_json_pairs(path: &Path) -> Result<Vec<QaPair>, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::DataLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let pairs: Vec<QaPair> = serde_json::from_str(&raw).map_err(|e| EngineError::DataLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if pairs.is_empty() {
        return Err(EngineError::DataLoad {
            path: path.display().to_string(),
            reason: "dataset is empty".to_string(),
        });
    }
    Ok(pairs)
}

/// Parses the plain-text dataset format: alternating `Q:` and `A:` lines.
fn load_text_pairs(path: &Path) -> Result<Vec<QaPair>, EngineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::DataLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    for line in raw.lines() {
        let line = line.trim();
        if let Some(q) = line.strip_prefix("Q:") {
            question = Some(q.trim().to_string());
        } else if let Some(a) = line.strip_prefix("A:") {
            if let Some(q) = question.take() {
                if !q.is_empty() && !a.trim().is_empty() {
                    pairs.push(QaPair {
                        question: q,
                        answer: a.trim().to_string(),
                    });
                }
            }
        }
    }
    if pairs.is_empty() {
        return Err(EngineError::DataLoad {
            path: path.display().to_string(),
            reason: "no Q:/A: pairs found".to_string(),
        });
    }
    Ok(pairs)
}

/// A category with its trigger keywords and canned response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
    pub response: String,
}

/// Fixed category -> keywords table, independent of the Q&A dataset.
/// First category with any keyword contained in the query wins.
#[derive(Clone)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    /// Built-in category table for the common enquiry channels.
    pub fn new() -> Self {
        let categories = [
            (
                "admissions",
                &["admission", "apply", "application"][..],
                "For admission queries, please visit https://crescent.edu.ng/admissions or write to admissions@crescent.edu.ng.",
            ),
            (
                "fees",
                &["fee", "fees", "tuition", "bursary"][..],
                "Fee structures vary by program. Contact bursary@crescent.edu.ng.",
            ),
            (
                "accommodation",
                &["hostel", "accommodation", "housing"][..],
                "Hostel and accommodation enquiries are handled by the student affairs office: studentaffairs@crescent.edu.ng.",
            ),
            (
                "contact",
                &["contact", "reach", "helpdesk"][..],
                "You can reach the university at info@crescent.edu.ng or +234 800 000 0000.",
            ),
        ]
        .into_iter()
        .map(|(name, keywords, response)| Category {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            response: response.to_string(),
        })
        .collect();
        Self { categories }
    }

    pub fn from_categories(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Returns `(category_name, canned_response)` if any keyword is a
    /// substring of the normalized query.
    pub fn keyword_match(&self, normalized_query: &str) -> Option<(&str, &str)> {
        for category in &self.categories {
            if category
                .keywords
                .iter()
                .any(|k| normalized_query.contains(k.as_str()))
            {
                return Some((category.name.as_str(), category.response.as_str()));
            }
        }
        None
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn test_kb(pairs: &[(&str, &str)]) -> KnowledgeBase {
        let normalizer = Normalizer::new();
        let embedder = HashEmbedder::new(64);
        KnowledgeBase::from_pairs(
            pairs
                .iter()
                .map(|(q, a)| QaPair {
                    question: q.to_string(),
                    answer: a.to_string(),
                })
                .collect(),
            &normalizer,
            &embedder,
        )
    }

    #[test]
    fn test_exact_match_is_case_insensitive_first_wins() {
        let kb = test_kb(&[
            ("What are the admission requirements?", "first"),
            ("what are the admission requirements", "second"),
        ]);
        let normalizer = Normalizer::new();
        let idx = kb
            .exact_match(&normalizer.normalize("WHAT ARE the admission requirements?"))
            .unwrap();
        assert_eq!(kb.answer(idx), "first");
    }

    #[test]
    fn test_substring_match_both_directions() {
        let kb = test_kb(&[("library opening hours", "8am to 9pm")]);
        assert!(kb
            .substring_match("what are the library opening hours today")
            .is_some());
        assert!(kb.substring_match("library opening").is_some());
        assert!(kb.substring_match("hostel fees").is_none());
    }

    #[test]
    fn test_embeddings_stay_index_aligned() {
        let kb = test_kb(&[("a question", "a"), ("another question", "b")]);
        assert_eq!(kb.len(), kb.embeddings().len());
    }

    #[test]
    fn test_malformed_json_falls_back_to_default_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("qa_dataset.json"), "{ not json").unwrap();
        let normalizer = Normalizer::new();
        let embedder = HashEmbedder::new(64);
        let kb = KnowledgeBase::load(dir.path(), &normalizer, &embedder);
        assert!(!kb.is_empty());
        let idx = kb
            .exact_match(&normalizer.normalize("What are the admission requirements?"))
            .unwrap();
        assert_eq!(kb.answer(idx), "Minimum 5 credits including Math and English");
    }

    #[test]
    fn test_text_dataset_loader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("qa_dataset.txt"),
            "Q: When does the semester start?\nA: The semester starts in September.\n\nQ: incomplete\n",
        )
        .unwrap();
        let normalizer = Normalizer::new();
        let embedder = HashEmbedder::new(64);
        let kb = KnowledgeBase::load(dir.path(), &normalizer, &embedder);
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.answer(0), "The semester starts in September.");
    }

    #[test]
    fn test_category_table_keyword_hit() {
        let table = CategoryTable::new();
        let (name, response) = table.keyword_match("how much are the fees").unwrap();
        assert_eq!(name, "fees");
        assert!(response.contains("bursary@crescent.edu.ng"));
        assert!(table.keyword_match("tell me a joke").is_none());
    }
}
