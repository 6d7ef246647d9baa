//! Lexical (TF-IDF) index and retriever.
//!
//! A [`Corpus`] owns a knowledge-base collection together with the
//! [`LexicalIndex`] derived from it. The two are only ever built together,
//! so a corpus can never pair documents with an index from another
//! collection. Callers that need to replace the collection build a new
//! corpus and swap it in whole.
//!
//! # Scoring
//!
//! ```text
//! idf(t)   = ln((N + 1) / (df(t) + 1)) + 1
//! score(d) = Σ_{t ∈ Q, t ∈ d} (1 + ln tf_d(t)) · idf(t)  /  sqrt(|d| + 1)
//! ```
//!
//! `Q` is the filtered query token sequence (repeated query terms count
//! once per occurrence) and `|d|` the filtered token count of the document.
//!
//! # Retrieval
//!
//! 1. Filter query tokens with [`index_terms`].
//! 2. Skip documents whose script does not match the language filter.
//! 3. Skip documents sharing fewer than `min_token_overlap` distinct terms
//!    with the query.
//! 4. Score the survivors.
//! 5. Stable sort by score, descending.
//! 6. De-duplicate by id (first wins) and truncate to `k`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::{KnowledgeItem, Lang};
use crate::text::{index_terms, is_arabic};

/// Per-document term statistics.
#[derive(Debug, Clone)]
pub struct DocTerms {
    /// Term frequency of each filtered token.
    pub tf: HashMap<String, u32>,
    /// Number of filtered tokens (with multiplicity).
    pub len: usize,
    /// Whether the document text contains Arabic characters.
    pub arabic: bool,
}

impl DocTerms {
    pub fn from_text(text: &str) -> Self {
        let terms = index_terms(text);
        let mut tf: HashMap<String, u32> = HashMap::new();
        for t in &terms {
            *tf.entry(t.clone()).or_insert(0) += 1;
        }
        Self {
            tf,
            len: terms.len(),
            arabic: is_arabic(text),
        }
    }

    fn matches_lang(&self, lang: Lang) -> bool {
        match lang {
            Lang::Ar => self.arabic,
            Lang::En => !self.arabic,
        }
    }
}

/// Read-only term statistics for a collection.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    docs: Vec<DocTerms>,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// Build the index for `items`, in collection order.
    pub fn build(items: &[KnowledgeItem]) -> Self {
        let docs: Vec<DocTerms> = items.iter().map(|it| DocTerms::from_text(&it.text)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for d in &docs {
            for t in d.tf.keys() {
                *df.entry(t.as_str()).or_insert(0) += 1;
            }
        }

        let n = docs.len() as f64;
        let idf = df
            .into_iter()
            .map(|(t, d)| (t.to_string(), ((n + 1.0) / (d as f64 + 1.0)).ln() + 1.0))
            .collect();

        Self { docs, idf }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn doc(&self, i: usize) -> Option<&DocTerms> {
        self.docs.get(i)
    }

    /// Inverse document frequency of `term`, if it occurs in the collection.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// TF-IDF score of a document for the given (filtered) query terms.
    pub fn score(&self, query_terms: &[String], doc: &DocTerms) -> f64 {
        if query_terms.is_empty() || doc.len == 0 {
            return 0.0;
        }
        let mut score = 0.0;
        for t in query_terms {
            if let Some(&tf) = doc.tf.get(t) {
                let idf = self.idf(t).unwrap_or(1.0);
                score += (1.0 + (tf as f64).ln()) * idf;
            }
        }
        score / ((doc.len + 1) as f64).sqrt()
    }
}

/// Inputs for one retrieval call.
#[derive(Debug, Clone)]
pub struct SearchParams<'a> {
    pub query: &'a str,
    /// Maximum number of results.
    pub k: usize,
    /// Only consider documents written in this language's script.
    pub lang: Option<Lang>,
    /// Minimum number of distinct shared terms; `0` disables the cutoff.
    pub min_token_overlap: usize,
}

/// A document matched by the retriever.
#[derive(Debug, Clone, Copy)]
pub struct RetrievedCandidate<'a> {
    pub item: &'a KnowledgeItem,
    /// Non-negative, unbounded; only comparable within one corpus.
    pub similarity: f64,
}

/// A knowledge-base collection paired with its lexical index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    items: Vec<KnowledgeItem>,
    index: LexicalIndex,
}

impl Corpus {
    pub fn new(items: Vec<KnowledgeItem>) -> Self {
        let index = LexicalIndex::build(&items);
        Self { items, index }
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn index(&self) -> &LexicalIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rank documents against a query. Never fails; an empty query or
    /// corpus yields an empty list.
    pub fn search(&self, params: &SearchParams<'_>) -> Vec<RetrievedCandidate<'_>> {
        if self.items.is_empty() || params.k == 0 {
            return Vec::new();
        }
        let q_terms = index_terms(params.query);
        if q_terms.is_empty() {
            return Vec::new();
        }
        let q_set: HashSet<&str> = q_terms.iter().map(String::as_str).collect();

        let mut scored: Vec<RetrievedCandidate<'_>> = Vec::new();
        for (item, doc) in self.items.iter().zip(self.index.docs.iter()) {
            if let Some(lang) = params.lang {
                if !doc.matches_lang(lang) {
                    continue;
                }
            }
            if params.min_token_overlap > 0 {
                let overlap = q_set.iter().filter(|t| doc.tf.contains_key(**t)).count();
                if overlap < params.min_token_overlap {
                    continue;
                }
            }
            scored.push(RetrievedCandidate {
                item,
                similarity: self.index.score(&q_terms, doc),
            });
        }

        // `sort_by` is stable: equal scores keep collection order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });

        let mut seen: HashSet<&str> = HashSet::new();
        scored
            .into_iter()
            .filter(|c| seen.insert(c.item.id.as_str()))
            .take(params.k)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str) -> KnowledgeItem {
        KnowledgeItem::new(id, id, format!("https://kb.example/{}", id), "faq", text)
    }

    fn params(query: &str, k: usize) -> SearchParams<'_> {
        SearchParams {
            query,
            k,
            lang: None,
            min_token_overlap: 0,
        }
    }

    #[test]
    fn test_idf_formula() {
        let corpus = Corpus::new(vec![
            item("a", "library hours weekend"),
            item("b", "library card renewal"),
            item("c", "parking permit"),
        ]);
        let idx = corpus.index();
        // library: df=2, N=3
        let expected = (4.0f64 / 3.0).ln() + 1.0;
        assert!((idx.idf("library").unwrap() - expected).abs() < 1e-12);
        // parking: df=1
        let expected = (4.0f64 / 2.0).ln() + 1.0;
        assert!((idx.idf("parking").unwrap() - expected).abs() < 1e-12);
        assert!(idx.idf("missing").is_none());
    }

    #[test]
    fn test_idf_positive_for_term_in_every_document() {
        let corpus = Corpus::new(vec![item("a", "library one"), item("b", "library two")]);
        assert!(corpus.index().idf("library").unwrap() > 0.0);
    }

    #[test]
    fn test_score_formula() {
        let corpus = Corpus::new(vec![item("a", "parking parking permit"), item("b", "other")]);
        let idx = corpus.index();
        let doc = idx.doc(0).unwrap();
        let q = vec!["parking".to_string()];
        let idf = idx.idf("parking").unwrap();
        let expected = (1.0 + 2f64.ln()) * idf / (4.0f64).sqrt();
        assert!((idx.score(&q, doc) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_identical_token_multisets_score_equal() {
        let corpus = Corpus::new(vec![
            item("a", "exam timetable room"),
            item("b", "room exam timetable"),
            item("c", "unrelated words here"),
        ]);
        let idx = corpus.index();
        let q = vec!["exam".to_string(), "room".to_string()];
        let sa = idx.score(&q, idx.doc(0).unwrap());
        let sb = idx.score(&q, idx.doc(1).unwrap());
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_zero_overlap_scores_zero() {
        let corpus = Corpus::new(vec![item("a", "parking permit")]);
        let idx = corpus.index();
        assert_eq!(idx.score(&["library".to_string()], idx.doc(0).unwrap()), 0.0);
    }

    #[test]
    fn test_search_empty_inputs() {
        let empty = Corpus::new(Vec::new());
        assert!(empty.search(&params("library", 4)).is_empty());

        let corpus = Corpus::new(vec![item("a", "library hours")]);
        assert!(corpus.search(&params("", 4)).is_empty());
        assert!(corpus.search(&params("the a of", 4)).is_empty());
        assert!(corpus.search(&params("library", 0)).is_empty());
    }

    #[test]
    fn test_search_ranks_by_score() {
        let corpus = Corpus::new(vec![
            item("a", "parking permit fees and parking zones for visitors"),
            item("b", "parking parking parking"),
            item("c", "library hours"),
        ]);
        let results = corpus.search(&params("parking", 10));
        let ids: Vec<&str> = results.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids[0], "b");
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_search_ties_keep_collection_order() {
        let corpus = Corpus::new(vec![
            item("first", "scholarship deadline"),
            item("second", "scholarship deadline"),
            item("third", "scholarship deadline"),
        ]);
        let ids: Vec<String> = corpus
            .search(&params("scholarship deadline", 10))
            .iter()
            .map(|r| r.item.id.clone())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_truncates_and_dedups() {
        let corpus = Corpus::new(vec![
            item("dup", "housing dorm application"),
            item("dup", "housing dorm application form"),
            item("x", "housing dorm"),
            item("y", "housing"),
        ]);
        let results = corpus.search(&params("housing dorm", 2));
        assert_eq!(results.len(), 2);
        let mut ids: Vec<&str> = results.iter().map(|r| r.item.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 2);

        let all = corpus.search(&params("housing dorm", 10));
        let unique: HashSet<&str> = all.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_search_min_overlap_is_hard_cutoff() {
        let corpus = Corpus::new(vec![
            item("one", "transcript request"),
            item("two", "transcript request form online"),
        ]);
        let mut p = params("transcript request online", 10);
        p.min_token_overlap = 3;
        let results = corpus.search(&p);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item.id, "two");

        p.min_token_overlap = 4;
        assert!(corpus.search(&p).is_empty());
    }

    #[test]
    fn test_search_language_filter() {
        let corpus = Corpus::new(vec![
            item("en", "exam dates exam"),
            item("ar", "exam امتحانات"),
        ]);
        let mut p = params("exam", 10);
        p.lang = Some(Lang::En);
        let ids: Vec<&str> = corpus.search(&p).iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["en"]);

        p.lang = Some(Lang::Ar);
        let ids: Vec<&str> = corpus.search(&p).iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["ar"]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let corpus = Corpus::new(vec![
            item("a", "fees payment deadline"),
            item("b", "payment methods bank"),
            item("c", "deadline extension fees"),
        ]);
        let first: Vec<(String, f64)> = corpus
            .search(&params("fees deadline payment", 10))
            .iter()
            .map(|r| (r.item.id.clone(), r.similarity))
            .collect();
        for _ in 0..5 {
            let again: Vec<(String, f64)> = corpus
                .search(&params("fees deadline payment", 10))
                .iter()
                .map(|r| (r.item.id.clone(), r.similarity))
                .collect();
            assert_eq!(first, again);
        }
    }
}
