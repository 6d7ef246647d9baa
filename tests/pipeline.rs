use campus_assist::assistant::Assistant;
use campus_assist::config::Config;
use campus_assist::generation::{GenerationError, Generator, Generators};
use campus_assist::orchestrator::{clarification, disclaimer};
use campus_assist_core::models::{Decision, Lang, LangHint, Query, SourceKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every prompt and answers with a fixed reply or error.
struct StubGenerator {
    name: &'static str,
    reply: Result<String, u16>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl StubGenerator {
    fn replying(name: &'static str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &'static str, status: u16) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Err(status),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> (String, String) {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

impl Generator for StubGenerator {
    fn name(&self) -> &str {
        self.name
    }

    fn chat(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(GenerationError::Upstream {
                status: *status,
                body: "service unavailable".to_string(),
            }),
        }
    }
}

/// An assistant over the built-in seed knowledge base.
fn seed_assistant(generators: Generators) -> (TempDir, Assistant) {
    let tmp = TempDir::new().unwrap();
    let assistant = Assistant::with_generators(Config::with_data_dir(tmp.path()), generators).unwrap();
    (tmp, assistant)
}

const STRONG_MATCH: &str = "office hours documents transcripts photos";
const NO_MATCH: &str = "weather tomorrow paris";

#[test]
fn test_greeting_is_rule_hit() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let result = assistant.answer(&Query::new("hello")).unwrap();

    assert!(result.explain.rule_hit);
    assert_eq!(result.explain.intent, "greeting");
    assert_eq!(result.explain.intent_confidence, 0.95);
    assert_eq!(result.explain.decision, Decision::Answer);
    assert!(result.sources.is_empty());
    assert!(result.explain.top_matches.is_empty());
}

#[test]
fn test_arabic_greeting_overrides_english_hint() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let query = Query::new("مرحبا").with_hint(LangHint::En);
    let result = assistant.answer(&query).unwrap();

    assert_eq!(result.lang, Lang::Ar);
    assert_eq!(result.explain.detected_lang, Lang::Ar);
    assert!(result.explain.rule_hit);
    assert!(result.answer.starts_with("مرحباً"));
}

#[test]
fn test_low_score_without_generator_asks_for_clarification() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let result = assistant.answer(&Query::new(NO_MATCH)).unwrap();

    assert_eq!(result.explain.decision, Decision::Fallback);
    assert_eq!(result.explain.intent, "unknown");
    assert_eq!(result.explain.intent_confidence, 0.0);
    assert!(result.sources.is_empty());
    assert_eq!(result.answer, clarification(Lang::En));
}

#[test]
fn test_strong_match_without_generator_is_extractive() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let result = assistant.answer(&Query::new(STRONG_MATCH)).unwrap();

    assert_eq!(result.explain.decision, Decision::Answer);
    assert_eq!(result.explain.intent, "rag_answer");
    assert_eq!(result.explain.intent_confidence, 0.6);
    assert!(!result.explain.rule_hit);
    assert_eq!(result.explain.retrieval_method, "tfidf");

    assert_eq!(result.sources.len(), 1);
    assert_eq!(
        result.sources[0].url,
        "https://university.example.edu/admissions"
    );
    assert_eq!(result.sources[0].kind, SourceKind::Policy);

    assert!(result.answer.starts_with("Registration process:"));
    assert!(result.answer.ends_with(" [1]"));
    assert_eq!(result.explain.top_matches.len(), 1);
    assert!(result.explain.top_matches[0].similarity >= 0.25);
}

#[test]
fn test_grounded_generator_answers_from_numbered_sources() {
    let general = StubGenerator::replying("general", "Bring your ID copy, transcripts and photos [1].");
    let generators = Generators {
        general: Some(general.clone()),
        secondary: None,
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let result = assistant.answer(&Query::new(STRONG_MATCH)).unwrap();

    assert_eq!(result.explain.intent, "rag_llm_rewrite");
    assert_eq!(result.explain.intent_confidence, 0.75);
    assert_eq!(result.answer, "Bring your ID copy, transcripts and photos [1].");
    assert_eq!(result.sources.len(), 1);

    let (system, user) = general.last_prompt();
    assert!(system.contains("Answer in English"));
    assert!(user.contains("[1] Admissions & Registration (Sample)\nURL: https://university.example.edu/admissions\n"));
    assert_eq!(general.calls(), 1);
}

#[test]
fn test_secondary_used_when_grounded_fails() {
    let general = StubGenerator::failing("general", 503);
    let secondary = StubGenerator::replying("secondary", "Submit documents online [1].");
    let generators = Generators {
        general: Some(general.clone()),
        secondary: Some(secondary.clone()),
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let result = assistant.answer(&Query::new(STRONG_MATCH)).unwrap();

    assert_eq!(result.explain.intent, "rag_answer");
    assert_eq!(result.answer, "Submit documents online [1].");
    assert_eq!(general.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    let (system, user) = secondary.last_prompt();
    assert!(system.contains("Answer ONLY using the provided sources"));
    assert!(user.ends_with("cite sources by numbers like [1], [2] when relevant."));
}

#[test]
fn test_every_generator_failing_still_answers_extractively() {
    let generators = Generators {
        general: Some(StubGenerator::failing("general", 500)),
        secondary: Some(StubGenerator::failing("secondary", 429)),
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let result = assistant.answer(&Query::new(STRONG_MATCH)).unwrap();

    assert_eq!(result.explain.intent, "rag_answer");
    assert_eq!(result.explain.decision, Decision::Answer);
    assert!(result.answer.ends_with(" [1]"));
}

#[test]
fn test_low_score_with_generator_returns_disclaimed_general_answer() {
    let general = StubGenerator::replying("general", "It depends on the forecast.");
    let generators = Generators {
        general: Some(general.clone()),
        secondary: None,
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let result = assistant.answer(&Query::new(NO_MATCH)).unwrap();

    assert_eq!(result.explain.intent, "fallback_llm");
    assert_eq!(result.explain.intent_confidence, 0.2);
    assert_eq!(result.explain.decision, Decision::Answer);
    assert!(result.sources.is_empty());
    assert_eq!(
        result.answer,
        format!("{}It depends on the forecast.", disclaimer(Lang::En))
    );
    assert_eq!(general.last_prompt().1, NO_MATCH);
}

#[test]
fn test_low_score_generator_failure_includes_details() {
    let generators = Generators {
        general: Some(StubGenerator::failing("general", 503)),
        secondary: None,
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let query = Query::new(NO_MATCH).with_hint(LangHint::Ar);
    let result = assistant.answer(&query).unwrap();

    assert_eq!(result.lang, Lang::Ar);
    assert_eq!(result.explain.intent, "fallback_llm_error");
    assert_eq!(result.explain.decision, Decision::Fallback);
    assert!(result.answer.contains(clarification(Lang::Ar)));
    assert!(result.answer.ends_with("(Details: UpstreamError: provider error (HTTP 503): service unavailable)"));
}

#[test]
fn test_rule_hit_never_calls_generators() {
    let general = StubGenerator::replying("general", "unused");
    let generators = Generators {
        general: Some(general.clone()),
        secondary: None,
    };
    let (_tmp, assistant) = seed_assistant(generators);
    let result = assistant.answer(&Query::new("hi, exam schedule please")).unwrap();

    assert_eq!(result.explain.intent, "greeting");
    assert_eq!(general.calls(), 0);
}

#[test]
fn test_ambiguous_calendar_question_is_clarified_by_rule() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let result = assistant.answer(&Query::new("exam schedule please")).unwrap();

    assert_eq!(result.explain.intent, "academic_calendar");
    assert!(result.explain.rule_hit);
}

#[test]
fn test_french_hint_answers_in_english() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let query = Query::new(NO_MATCH).with_hint(LangHint::Fr);
    let result = assistant.answer(&query).unwrap();
    assert_eq!(result.lang, Lang::En);
}

#[test]
fn test_result_serializes_with_camel_case_explain() {
    let (_tmp, assistant) = seed_assistant(Generators::none());
    let result = assistant.answer(&Query::new(STRONG_MATCH)).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["lang"], "en");
    assert_eq!(json["sources"][0]["type"], "policy");
    assert_eq!(json["explain"]["detectedLang"], "en");
    assert_eq!(json["explain"]["ruleHit"], false);
    assert_eq!(json["explain"]["retrievalMethod"], "tfidf");
    assert_eq!(json["explain"]["decision"], "answer");
    assert!(json["explain"]["topMatches"][0]["similarity"].is_number());
}
