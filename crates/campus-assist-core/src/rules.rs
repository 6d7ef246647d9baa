//! Rule router: ordered intent matchers that short-circuit the pipeline.
//!
//! Rules are evaluated in table order against the lowercased message and
//! the first match wins. There is no scoring and no combination of rules.
//!
//! Keywords come in two flavours:
//! - **words** must equal a whole token of the message, so short greetings
//!   like `hi` do not fire inside `this` or `which`;
//! - **phrases** are plain substring tests, so `exam` also covers `exams`.
//!
//! English greetings are also recognised when drawn out (`heyyyy`, `hiii`,
//! `hellooo`); the whole token must still be the greeting.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Lang, RuleOutcome};
use crate::text::tokenize;

static ELONGATED_GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:h+e+y+|h+i+|hel+o+)$").expect("greeting pattern is valid")
});

/// A lowercased message prepared for keyword tests.
struct Message<'a> {
    text: &'a str,
    tokens: Vec<String>,
}

impl<'a> Message<'a> {
    fn new(lowered: &'a str) -> Self {
        Self {
            text: lowered,
            tokens: tokenize(lowered),
        }
    }

    fn any_word(&self, words: &[&str]) -> bool {
        self.tokens.iter().any(|t| words.contains(&t.as_str()))
    }

    fn any_token_matching(&self, re: &Regex) -> bool {
        self.tokens.iter().any(|t| re.is_match(t))
    }

    fn any_phrase(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.text.contains(p))
    }
}

/// One entry of the routing table.
struct Rule {
    intent: &'static str,
    confidence: f64,
    matches: fn(&Message<'_>) -> bool,
    answer_en: &'static str,
    answer_ar: &'static str,
}

const GREETING_WORDS: &[&str] = &[
    "hiya", "hru", // English
    "salut", "bonjour", "bonsoir", "coucou", // French
];
const GREETING_PHRASES: &[&str] = &[
    "سلام", "السلام", "مرحبا", "أهلا", "اهلا", "how are you", "how r u", "how are u",
    "how are uu",
];

const CALENDARISH: &[&str] = &["calendar", "schedule", "exam", "semester"];
const ACADEMIC_CALENDAR: &[&str] = &[
    "academic calendar",
    "التقويم",
    "تقويم أكاديمي",
    "التقويم الأكاديمي",
];
const TIMETABLE: &[&str] = &["timetable", "class timetable", "جدول", "جدول الحصص"];
const START_DATE: &[&str] = &[
    "start date",
    "date of start",
    "when does semester",
    "semester start",
    "تاريخ بداية",
    "بداية الفصل",
    "متى يبدأ الفصل",
    "متى تبدا الفصل",
];

const ADMISSIONS: &[&str] = &["admission", "apply", "enroll", "registration", "inscription"];
const EVENTS: &[&str] = &["event", "conference", "workshop", "club", "activité", "événement"];

fn is_greeting(m: &Message<'_>) -> bool {
    m.any_token_matching(&ELONGATED_GREETING)
        || m.any_word(GREETING_WORDS)
        || m.any_phrase(GREETING_PHRASES)
}

/// Generic date/schedule questions that do not say which calendar they mean.
/// A start-date question or an explicit calendar/timetable mention carries
/// enough signal to go straight to retrieval.
fn is_ambiguous_calendar(m: &Message<'_>) -> bool {
    m.any_phrase(CALENDARISH)
        && !m.any_phrase(START_DATE)
        && !m.any_phrase(ACADEMIC_CALENDAR)
        && !m.any_phrase(TIMETABLE)
}

fn is_admissions(m: &Message<'_>) -> bool {
    m.any_phrase(ADMISSIONS)
}

fn is_events(m: &Message<'_>) -> bool {
    m.any_phrase(EVENTS)
}

static RULES: &[Rule] = &[
    Rule {
        intent: "greeting",
        confidence: 0.95,
        matches: is_greeting,
        answer_en: "Hello there! I'm happy to help in any way I can as your university student-services assistant.",
        answer_ar: "مرحباً! أنا مساعد شؤون الطلبة. كيف يمكنني مساعدتك؟",
    },
    Rule {
        intent: "academic_calendar",
        confidence: 0.85,
        matches: is_ambiguous_calendar,
        answer_en: "Do you mean the **academic calendar** (semester dates/exams) or the **class timetable**? Tell me your program/level and I'll look it up in the documents.",
        answer_ar: "هل تقصد **التقويم الأكاديمي** (بداية الفصل/نهاية الفصل/الامتحانات) أم **جدول الحصص**؟ أعطني الشعبة/المستوى وسأبحث في الوثائق.",
    },
    Rule {
        intent: "admissions",
        confidence: 0.85,
        matches: is_admissions,
        answer_en: "For admissions/registration: are you a new student or re-enrolling? Share your program/level and I'll extract the requirements and documents from the guide.",
        answer_ar: "لأسئلة القبول/التسجيل: هل أنت طالب جديد أم إعادة تسجيل؟ أعطني المستوى/الشعبة وسأستخرج الشروط والوثائق المطلوبة من الدليل.",
    },
    Rule {
        intent: "events",
        confidence: 0.8,
        matches: is_events,
        answer_en: "Are you looking for a specific **event** (name/date) or a list of upcoming events? Give me the timeframe and I'll search the university announcements.",
        answer_ar: "هل تبحث عن **حدث** محدد (اسم/تاريخ) أم قائمة الفعاليات القادمة؟ أعطني الفترة الزمنية وسأبحث في إعلانات الجامعة.",
    },
];

/// Intent labels in priority order.
pub fn intents() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|r| r.intent)
}

/// Run the routing table. Returns the first matching rule's localized
/// answer, or `None` to let the pipeline continue to retrieval.
pub fn route(message: &str, lang: Lang) -> Option<RuleOutcome> {
    let lowered = message.to_lowercase();
    let msg = Message::new(&lowered);
    RULES.iter().find(|r| (r.matches)(&msg)).map(|r| RuleOutcome {
        intent: r.intent,
        confidence: r.confidence,
        answer: match lang {
            Lang::Ar => r.answer_ar,
            Lang::En => r.answer_en,
        }
        .to_string(),
    })
}
