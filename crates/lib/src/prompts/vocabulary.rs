//! # Fallback Vocabulary
//!
//! Phrases the intent heuristic looks for when the classifier's verdict is
//! unusable. Every supported language's phrases sit in the same list, so matching
//! never needs to know which language the user wrote in.

/// Phrases asking what data exists.
pub const DISCOVERY_MARKERS: &[&str] = &[
    "what tables",
    "which tables",
    "what data",
    "which data",
    "what datasets",
    "tables do we have",
    "tables related",
    "tables about",
    "list tables",
    "list the tables",
    "show tables",
    "show me the tables",
    "data do we have",
    "טבלאות",
    "אילו נתונים",
];

/// Whole messages that need no tool at all.
pub const SMALL_TALK: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "thanks",
    "thank you",
    "good morning",
    "bye",
    "שלום",
    "תודה",
    "היי",
];
