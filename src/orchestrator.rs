//! The answer pipeline.
//!
//! A question walks a fixed ladder of [`Stage`]s. Each stage either
//! finishes the turn with an [`AnswerResult`] or defers to the next one:
//!
//! | Stage | Finishes when | Intent |
//! |-------|---------------|--------|
//! | `RuleHit` | a canned rule matches | rule intent |
//! | `LowConfidence` | no candidate, or top score < `min_similarity` | `fallback_llm`, `fallback_llm_error`, `unknown` |
//! | `Grounded` | the general generator answers from sources | `rag_llm_rewrite` |
//! | `Secondary` | the secondary generator answers from sources | `rag_answer` |
//! | `Extractive` | always | `rag_answer` |
//!
//! Retrieval runs at most once per turn and only when a stage after
//! `RuleHit` asks for candidates. Generation failures never escape: a
//! failing stage defers, except in `LowConfidence` where the error detail
//! is appended to the clarification text.

use campus_assist_core::answer::{
    build_context, cite_first, extract_answer, preview, truncate_at_sentence, PREVIEW_CHARS,
};
use campus_assist_core::index::{Corpus, RetrievedCandidate, SearchParams};
use campus_assist_core::models::{
    AnswerResult, Decision, Explain, KnowledgeItem, Lang, Query, Source, TopMatch,
};
use campus_assist_core::{rules, text};
use std::cell::OnceCell;

use crate::config::Config;
use crate::generation::{source_answer_prompts, GenerationError, Generator, Generators};

pub const RETRIEVAL_METHOD: &str = "tfidf";

/// One rung of the answer ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RuleHit,
    LowConfidence,
    Grounded,
    Secondary,
    Extractive,
}

impl Stage {
    /// Evaluation order.
    pub const LADDER: [Stage; 5] = [
        Stage::RuleHit,
        Stage::LowConfidence,
        Stage::Grounded,
        Stage::Secondary,
        Stage::Extractive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RuleHit => "rule_hit",
            Stage::LowConfidence => "low_confidence",
            Stage::Grounded => "grounded",
            Stage::Secondary => "secondary",
            Stage::Extractive => "extractive",
        }
    }
}

enum Step {
    Done(AnswerResult),
    Defer,
}

/// Per-turn state shared by the stages.
struct Turn<'q, 'c> {
    query: &'q Query,
    lang: Lang,
    candidates: OnceCell<Vec<RetrievedCandidate<'c>>>,
}

/// Runs the ladder against one knowledge-base snapshot and one settings
/// snapshot.
pub struct Orchestrator<'a> {
    corpus: &'a Corpus,
    config: &'a Config,
    generators: &'a Generators,
}

impl<'a> Orchestrator<'a> {
    pub fn new(corpus: &'a Corpus, config: &'a Config, generators: &'a Generators) -> Self {
        Self {
            corpus,
            config,
            generators,
        }
    }

    /// Answer `query`. Always produces a result.
    pub fn answer(&self, query: &Query) -> AnswerResult {
        let turn = Turn {
            query,
            lang: text::detect_lang(&query.message, query.hint),
            candidates: OnceCell::new(),
        };

        for stage in Stage::LADDER {
            if let Step::Done(result) = self.run(stage, &turn) {
                tracing::info!(
                    stage = stage.as_str(),
                    intent = %result.explain.intent,
                    lang = %turn.lang,
                    "answered"
                );
                return result;
            }
            tracing::debug!(stage = stage.as_str(), "deferred");
        }

        // Extractive always finishes when candidates exist and LowConfidence
        // finishes when they don't.
        self.clarify(&turn)
    }

    fn run<'q>(&self, stage: Stage, turn: &Turn<'q, 'a>) -> Step {
        match stage {
            Stage::RuleHit => self.rule_hit(turn),
            Stage::LowConfidence => self.low_confidence(turn),
            Stage::Grounded => self.grounded(turn),
            Stage::Secondary => self.secondary(turn),
            Stage::Extractive => self.extractive(turn),
        }
    }

    fn candidates<'t>(&self, turn: &'t Turn<'_, 'a>) -> &'t [RetrievedCandidate<'a>] {
        turn.candidates.get_or_init(|| {
            let found = self.corpus.search(&SearchParams {
                query: &turn.query.message,
                k: self.config.retrieval.top_k,
                lang: Some(turn.lang),
                min_token_overlap: self.config.retrieval.min_token_overlap,
            });
            tracing::debug!(
                candidates = found.len(),
                top_score = found.first().map(|c| c.similarity).unwrap_or(0.0),
                "retrieval"
            );
            found
        })
    }

    fn rule_hit(&self, turn: &Turn<'_, 'a>) -> Step {
        match rules::route(&turn.query.message, turn.lang) {
            Some(outcome) => Step::Done(self.finish(
                turn,
                outcome.answer,
                Vec::new(),
                Verdict {
                    rule_hit: true,
                    intent: outcome.intent,
                    confidence: outcome.confidence,
                    decision: Decision::Answer,
                },
            )),
            None => Step::Defer,
        }
    }

    fn low_confidence(&self, turn: &Turn<'_, 'a>) -> Step {
        let candidates = self.candidates(turn);
        let confident = candidates
            .first()
            .is_some_and(|top| top.similarity >= self.config.retrieval.min_similarity);
        if confident {
            return Step::Defer;
        }

        let Some(generator) = self.generators.general.as_deref() else {
            return Step::Done(self.clarify(turn));
        };

        match generator.complete(turn.lang, &turn.query.message) {
            Ok(text) => {
                let body = truncate_at_sentence(text.trim(), self.config.answer.max_fallback_chars);
                Step::Done(self.finish(
                    turn,
                    format!("{}{}", disclaimer(turn.lang), body),
                    Vec::new(),
                    Verdict::new("fallback_llm", 0.2, Decision::Answer),
                ))
            }
            Err(e) => {
                tracing::warn!(provider = generator.name(), error = %e, "general generation failed");
                let answer = format!(
                    "{}{}\n\n(Details: {}: {})",
                    provider_problem(turn.lang, generator.name()),
                    clarification(turn.lang),
                    e.kind(),
                    e
                );
                Step::Done(self.finish(
                    turn,
                    answer,
                    Vec::new(),
                    Verdict::new("fallback_llm_error", 0.0, Decision::Fallback),
                ))
            }
        }
    }

    fn grounded(&self, turn: &Turn<'_, 'a>) -> Step {
        let Some(generator) = self.generators.general.as_deref() else {
            return Step::Defer;
        };
        let candidates = self.candidates(turn);
        let context = build_context(candidates);
        let outcome = generator.answer_with_sources(turn.lang, &turn.query.message, &context);
        self.source_answer(turn, generator, outcome, "rag_llm_rewrite", 0.75)
    }

    fn secondary(&self, turn: &Turn<'_, 'a>) -> Step {
        let Some(generator) = self.generators.secondary.as_deref() else {
            return Step::Defer;
        };
        let candidates = self.candidates(turn);
        let (system, user) = source_answer_prompts(&turn.query.message, &build_context(candidates));
        let outcome = generator.chat(&system, &user);
        self.source_answer(turn, generator, outcome, "rag_answer", 0.6)
    }

    fn source_answer(
        &self,
        turn: &Turn<'_, 'a>,
        generator: &dyn Generator,
        outcome: Result<String, GenerationError>,
        intent: &'static str,
        confidence: f64,
    ) -> Step {
        match outcome {
            Ok(text) if !text.trim().is_empty() => Step::Done(self.finish(
                turn,
                text.trim().to_string(),
                sources(self.candidates(turn)),
                Verdict::new(intent, confidence, Decision::Answer),
            )),
            Ok(_) => {
                tracing::warn!(provider = generator.name(), intent, "empty generation, deferring");
                Step::Defer
            }
            Err(e) => {
                tracing::warn!(provider = generator.name(), intent, error = %e, "generation failed, deferring");
                Step::Defer
            }
        }
    }

    fn extractive(&self, turn: &Turn<'_, 'a>) -> Step {
        let candidates = self.candidates(turn);
        let Some(best) = candidates.first() else {
            return Step::Defer;
        };
        Step::Done(self.finish(
            turn,
            cite_first(&extract_answer(&best.item.text)),
            sources(candidates),
            Verdict::new("rag_answer", 0.6, Decision::Answer),
        ))
    }

    fn clarify(&self, turn: &Turn<'_, 'a>) -> AnswerResult {
        self.finish(
            turn,
            clarification(turn.lang).to_string(),
            Vec::new(),
            Verdict::new("unknown", 0.0, Decision::Fallback),
        )
    }

    fn finish(&self, turn: &Turn<'_, 'a>, answer: String, sources: Vec<Source>, verdict: Verdict) -> AnswerResult {
        let top_matches = turn
            .candidates
            .get()
            .map(|found| {
                found
                    .iter()
                    .map(|c| TopMatch {
                        text: preview(&c.item.text, PREVIEW_CHARS),
                        similarity: c.similarity,
                    })
                    .collect()
            })
            .unwrap_or_default();

        AnswerResult {
            answer,
            lang: turn.lang,
            sources,
            explain: Explain {
                detected_lang: turn.lang,
                rule_hit: verdict.rule_hit,
                intent: verdict.intent.to_string(),
                intent_confidence: verdict.confidence,
                retrieval_method: RETRIEVAL_METHOD.to_string(),
                top_matches,
                decision: verdict.decision,
            },
        }
    }
}

struct Verdict {
    rule_hit: bool,
    intent: &'static str,
    confidence: f64,
    decision: Decision,
}

impl Verdict {
    fn new(intent: &'static str, confidence: f64, decision: Decision) -> Self {
        Self {
            rule_hit: false,
            intent,
            confidence,
            decision,
        }
    }
}

fn sources(candidates: &[RetrievedCandidate<'_>]) -> Vec<Source> {
    candidates.iter().map(|c| KnowledgeItem::to_source(c.item)).collect()
}

/// Prefix marking an answer as not drawn from the knowledge base.
pub fn disclaimer(lang: Lang) -> &'static str {
    match lang {
        Lang::Ar => "تنبيه: هذه الإجابة عامة وليست مبنية على وثائق الجامعة الداخلية.\n\n",
        Lang::En => {
            "Note: This is a general answer and is NOT based on the university's internal documents.\n\n"
        }
    }
}

/// Request for a clearer question.
pub fn clarification(lang: Lang) -> &'static str {
    match lang {
        Lang::Ar => "عذراً، لم أجد هذه المعلومة في الوثائق المتاحة. هل يمكنك توضيح سؤالك أو ذكر الشعبة/المستوى؟",
        Lang::En => {
            "Sorry, I couldn't find this in the available documents. Can you clarify your question or share your program/level?"
        }
    }
}

fn provider_problem(lang: Lang, provider: &str) -> String {
    match lang {
        Lang::Ar => format!(
            "تعذر الاتصال بخدمة {}. تحقق من المفتاح (API key) والصلاحيات/الحصة (quota) واسم النموذج.\n",
            provider
        ),
        Lang::En => format!(
            "Could not reach {}. Check API key, permissions/quota, and model name.\n",
            provider
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        reply: Result<&'static str, u16>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Generator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn chat(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(GenerationError::Upstream {
                    status,
                    body: "quota exceeded".to_string(),
                }),
            }
        }
    }

    fn corpus() -> Corpus {
        Corpus::new(vec![
            KnowledgeItem::new(
                "transcripts",
                "Transcript Requests",
                "https://example.edu/transcripts",
                "faq",
                "Q: How do I request transcripts?\nA: Submit the transcript form at the registrar desk with your student card.",
            ),
            KnowledgeItem::new(
                "housing",
                "Housing",
                "https://example.edu/housing",
                "policy",
                "Dormitory rooms are assigned by lottery each summer. Bring your housing contract.",
            ),
        ])
    }

    fn answer_with(generators: Generators, config: &Config, message: &str) -> AnswerResult {
        let corpus = corpus();
        Orchestrator::new(&corpus, config, &generators).answer(&Query::new(message))
    }

    #[test]
    fn test_rule_hit_skips_retrieval() {
        let config = Config::default();
        let result = answer_with(Generators::none(), &config, "hello, transcript form?");
        assert!(result.explain.rule_hit);
        assert_eq!(result.explain.intent, "greeting");
        assert!(result.explain.top_matches.is_empty());
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_extractive_when_no_generators() {
        let config = Config::default();
        let result = answer_with(Generators::none(), &config, "request transcripts form");
        assert_eq!(result.explain.intent, "rag_answer");
        assert_eq!(result.explain.intent_confidence, 0.6);
        assert_eq!(
            result.answer,
            "Submit the transcript form at the registrar desk with your student card. [1]"
        );
        assert_eq!(result.sources[0].url, "https://example.edu/transcripts");
        assert_eq!(result.explain.top_matches.len(), result.sources.len());
    }

    #[test]
    fn test_grounded_answer_verbatim() {
        let config = Config::default();
        let general = Scripted::ok("  Use the transcript form [1].  ");
        let generators = Generators {
            general: Some(general.clone()),
            secondary: None,
        };
        let result = answer_with(generators, &config, "request transcripts form");
        assert_eq!(result.explain.intent, "rag_llm_rewrite");
        assert_eq!(result.answer, "Use the transcript form [1].");
        assert_eq!(general.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_grounded_failure_falls_to_secondary() {
        let config = Config::default();
        let secondary = Scripted::ok("From the registrar [1].");
        let generators = Generators {
            general: Some(Scripted::failing(500)),
            secondary: Some(secondary.clone()),
        };
        let result = answer_with(generators, &config, "request transcripts form");
        assert_eq!(result.explain.intent, "rag_answer");
        assert_eq!(result.answer, "From the registrar [1].");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_low_confidence_general_answer_is_disclaimed_and_truncated() {
        let mut config = Config::default();
        config.answer.max_fallback_chars = 30;
        let generators = Generators {
            general: Some(Scripted::ok(
                "Paris will be sunny. Bring sunglasses and water for the afternoon walk.",
            )),
            secondary: None,
        };
        let result = answer_with(generators, &config, "weather tomorrow paris");
        assert_eq!(result.explain.intent, "fallback_llm");
        assert_eq!(result.explain.decision, Decision::Answer);
        assert_eq!(
            result.answer,
            format!("{}Paris will be sunny.", disclaimer(Lang::En))
        );
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_low_confidence_generator_error_surfaces_details() {
        let config = Config::default();
        let generators = Generators {
            general: Some(Scripted::failing(429)),
            secondary: None,
        };
        let result = answer_with(generators, &config, "weather tomorrow paris");
        assert_eq!(result.explain.intent, "fallback_llm_error");
        assert_eq!(result.explain.intent_confidence, 0.0);
        assert_eq!(result.explain.decision, Decision::Fallback);
        assert!(result.answer.starts_with("Could not reach scripted."));
        assert!(result.answer.contains(clarification(Lang::En)));
        assert!(result.answer.contains("(Details: UpstreamError: provider error (HTTP 429)"));
    }

    #[test]
    fn test_low_confidence_without_generator_asks_for_clarification() {
        let config = Config::default();
        let result = answer_with(Generators::none(), &config, "weather tomorrow paris");
        assert_eq!(result.explain.intent, "unknown");
        assert_eq!(result.explain.decision, Decision::Fallback);
        assert_eq!(result.answer, clarification(Lang::En));
    }

    #[test]
    fn test_arabic_query_gets_arabic_clarification() {
        let config = Config::default();
        let result = answer_with(Generators::none(), &config, "الطقس غدا في باريس");
        assert_eq!(result.lang, Lang::Ar);
        assert_eq!(result.answer, clarification(Lang::Ar));
    }

    #[test]
    fn test_ladder_order() {
        assert_eq!(Stage::LADDER[0], Stage::RuleHit);
        assert_eq!(Stage::LADDER[4], Stage::Extractive);
    }
}
