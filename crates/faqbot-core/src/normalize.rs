//! Input normalization: lowercasing, stripping, elongation collapse,
//! abbreviation expansion, and dictionary spelling correction.
//!
//! `normalize` is total and idempotent: expansions are emitted in the
//! already-normalized alphabet and corrected tokens are dictionary terms,
//! so a second pass is a no-op.

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Built-in token -> expansion table, used when no `abbreviations.csv` is
/// present in the data directory. Expansions are pre-normalized (lowercase,
/// no punctuation) so the pipeline stays idempotent.
const DEFAULT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("u", "you"),
    ("r", "are"),
    ("ur", "your"),
    ("ow", "how"),
    ("pls", "please"),
    ("plz", "please"),
    ("tmrw", "tomorrow"),
    ("cn", "can"),
    ("wat", "what"),
    ("cud", "could"),
    ("shud", "should"),
    ("wud", "would"),
    ("abt", "about"),
    ("bcz", "because"),
    ("bcoz", "because"),
    ("btw", "between"),
    ("asap", "as soon as possible"),
    ("idk", "i dont know"),
    ("imo", "in my opinion"),
    ("msg", "message"),
    ("doc", "document"),
    ("d", "the"),
    ("yr", "year"),
    ("sem", "semester"),
    ("dept", "department"),
    ("admsn", "admission"),
    ("cresnt", "crescent"),
    ("uni", "university"),
    ("clg", "college"),
    ("sch", "school"),
    ("info", "information"),
];

/// Built-in synonym -> canonical-term table, applied after correction so
/// query and stored questions land on the same vocabulary.
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("programme", "course"),
    ("program", "course"),
    ("varsity", "university"),
    ("lodging", "accommodation"),
];

/// Built-in correction dictionary in rank order (most frequent first).
/// Ties at equal edit distance resolve to the earlier entry.
const DEFAULT_DICTIONARY: &[&str] = &[
    "the", "you", "are", "what", "is", "a", "i", "to", "of", "and", "in", "for", "how", "can",
    "about", "my", "we", "it", "on", "this", "that", "when", "where", "who", "why", "which", "do",
    "does", "have", "has", "be", "will", "your", "with", "from", "at", "or", "not", "no", "yes",
    "so", "if", "am", "was", "they", "there", "more", "me", "much", "get", "tell", "know", "dont",
    "its", "as", "soon", "possible", "please", "thank", "thanks", "help", "reply", "another",
    "hello", "hi", "hey", "greetings", "fine", "okay", "good", "well", "doing", "going", "talk",
    "conversation", "name", "time", "available", "open", "opening", "hours", "now", "today",
    "tomorrow", "year", "semester", "session", "course", "courses",
    "department", "departments", "faculty", "school", "college", "university", "campus",
    "student", "students", "admission", "admissions", "requirements", "requirement", "apply",
    "application", "register", "registration", "fee", "fees", "tuition", "payment", "bursary",
    "scholarship", "scholarships", "hostel", "accommodation", "housing", "library", "exam",
    "exams", "examination", "result", "results", "grade", "grades", "level", "credit", "credits",
    "math", "mathematics", "english", "transcript", "transfer", "deadline", "contact", "email",
    "phone", "office", "information", "message", "document", "because", "between", "could",
    "should", "would", "opinion", "crescent", "computer", "science", "engineering", "law",
    "business", "administration", "accounting", "economics", "architecture", "microbiology",
    "mass", "communication", "location", "located", "offered", "start", "resume", "graduation",
];

/// Text normalizer. Pure; holds only its lookup tables.
pub struct Normalizer {
    abbreviations: HashMap<String, String>,
    synonyms: HashMap<String, String>,
    dictionary: Vec<String>,
    dictionary_index: HashSet<String>,
}

fn builtin_abbreviations() -> HashMap<String, String> {
    DEFAULT_ABBREVIATIONS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn builtin_synonyms() -> HashMap<String, String> {
    DEFAULT_SYNONYMS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Normalizer {
    /// Normalizer with the built-in tables.
    pub fn new() -> Self {
        Self::from_tables(
            builtin_abbreviations(),
            builtin_synonyms(),
            DEFAULT_DICTIONARY.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Loads `abbreviations.csv` and `synonyms.csv` (two-column
    /// `token,expansion`) and `dictionary.txt` (one ranked term per line)
    /// from the data directory. A missing or unreadable file falls back to
    /// the built-in table.
    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let dir = data_dir.as_ref();
        let abbreviations = match load_two_column(&dir.join("abbreviations.csv")) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    target: "faqbot::normalize",
                    error = %e,
                    "abbreviations.csv not loaded; using built-in table"
                );
                builtin_abbreviations()
            }
        };
        let synonyms = match load_two_column(&dir.join("synonyms.csv")) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    target: "faqbot::normalize",
                    error = %e,
                    "synonyms.csv not loaded; using built-in table"
                );
                builtin_synonyms()
            }
        };
        let dictionary = match load_lines(&dir.join("dictionary.txt")) {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!(
                    target: "faqbot::normalize",
                    error = %e,
                    "dictionary.txt not loaded; using built-in dictionary"
                );
                DEFAULT_DICTIONARY.iter().map(|s| s.to_string()).collect()
            }
        };
        Self::from_tables(abbreviations, synonyms, dictionary)
    }

    /// Normalizer over explicit tables (tests and embedded deployments).
    pub fn from_tables(
        abbreviations: HashMap<String, String>,
        synonyms: HashMap<String, String>,
        dictionary: Vec<String>,
    ) -> Self {
        let dictionary_index = dictionary.iter().cloned().collect();
        Self {
            abbreviations,
            synonyms,
            dictionary,
            dictionary_index,
        }
    }

    /// Normalizes text through the fixed pipeline:
    /// lowercase -> strip to `[a-z0-9 space]` -> collapse runs of 3+
    /// identical characters -> expand abbreviations -> correct spelling at
    /// edit distance <= 2 -> standardize synonyms. Total; never fails.
    ///
    /// The elongation collapse also flattens legitimately tripled letters;
    /// accepted lossy behavior.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut stripped = String::with_capacity(lowered.len());
        for ch in lowered.chars() {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                stripped.push(ch);
            } else if ch.is_whitespace() {
                stripped.push(' ');
            }
        }
        let collapsed = collapse_elongations(&stripped);

        let mut out: Vec<String> = Vec::new();
        for token in collapsed.split_whitespace() {
            if let Some(expansion) = self.abbreviations.get(token) {
                out.push(expansion.clone());
            } else {
                out.push(self.correct(token));
            }
        }
        let expanded = out.join(" ");

        expanded
            .split_whitespace()
            .map(|t| self.synonyms.get(t).map(String::as_str).unwrap_or(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Corrects a single token against the dictionary: a verbatim hit wins;
    /// otherwise the closest entry within edit distance 2, rank breaking
    /// ties; no candidate leaves the token unchanged. Numeric tokens pass
    /// through untouched.
    fn correct(&self, token: &str) -> String {
        if self.dictionary_index.contains(token) || token.chars().any(|c| c.is_ascii_digit()) {
            return token.to_string();
        }
        let mut best: Option<(usize, &str)> = None;
        for term in &self.dictionary {
            if term.len().abs_diff(token.len()) > 2 {
                continue;
            }
            if let Some(d) = bounded_levenshtein(token, term, 2) {
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, term));
                }
            }
        }
        match best {
            Some((_, term)) => term.to_string(),
            None => token.to_string(),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapses any run of 3 or more identical characters to a single one
/// ("sooo" -> "so", "helllo" -> "helo").
fn collapse_elongations(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run_char: Option<char> = None;
    let mut run_len = 0usize;
    for ch in s.chars() {
        if Some(ch) == run_char {
            run_len += 1;
        } else {
            flush_run(&mut out, run_char, run_len);
            run_char = Some(ch);
            run_len = 1;
        }
    }
    flush_run(&mut out, run_char, run_len);
    out
}

fn flush_run(out: &mut String, ch: Option<char>, len: usize) {
    if let Some(c) = ch {
        let emit = if len >= 3 { 1 } else { len };
        for _ in 0..emit {
            out.push(c);
        }
    }
}

/// Levenshtein distance with a cutoff. Returns `None` once the distance is
/// known to exceed `max`.
fn bounded_levenshtein(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost)
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let d = prev[b.len()];
    (d <= max).then_some(d)
}

/// Reads a two-column `token,expansion` mapping file. Lines without a comma
/// or starting with `#` are skipped.
fn load_two_column(path: &Path) -> std::io::Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((token, expansion)) = line.split_once(',') {
            map.insert(
                token.trim().to_lowercase(),
                expansion.trim().to_lowercase(),
            );
        }
    }
    Ok(map)
}

/// Reads one ranked dictionary term per line.
fn load_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_punctuation_and_lowercases() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("What's the FEE?!"), "what the fee");
    }

    #[test]
    fn test_collapses_elongated_words() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("soooo good"), "so good");
    }

    #[test]
    fn test_expands_abbreviations_including_multi_word() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize("pls reply asap"),
            "please reply as soon as possible"
        );
    }

    #[test]
    fn test_scenario_sms_speak_admission_query() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize("wat r d admsn requirements"),
            "what are the admission requirements"
        );
    }

    #[test]
    fn test_corrects_close_misspellings() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("admissionn requirments"), "admission requirements");
    }

    #[test]
    fn test_synonyms_standardized_after_correction() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize("what programme is offered at the varsity"),
            "what course is offered at the university"
        );
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("asdkjasjdk"), "asdkjasjdk");
    }

    #[test]
    fn test_numeric_tokens_not_corrected() {
        let n = Normalizer::new();
        assert_eq!(n.normalize("100 level fees"), "100 level fees");
    }

    #[test]
    fn test_idempotent() {
        let n = Normalizer::new();
        for input in [
            "Wat r d admsn requirements?",
            "pls tell me abt hostel fees ASAP!!!",
            "sooo... idk, wat abt d library",
            "How are you doing?",
            "",
            "asdkjasjdk qwerty 12345",
        ] {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_empty_and_whitespace_inputs() {
        let n = Normalizer::new();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize("   \t\n  "), "");
        assert_eq!(n.normalize("!!!???"), "");
    }

    #[test]
    fn test_tables_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abbreviations.csv"), "qq,quick question\n").unwrap();
        std::fs::write(dir.path().join("dictionary.txt"), "quick\nquestion\n").unwrap();
        let n = Normalizer::from_data_dir(dir.path());
        assert_eq!(n.normalize("qq"), "quick question");
    }

    #[test]
    fn test_missing_table_files_fall_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let n = Normalizer::from_data_dir(dir.path());
        assert_eq!(n.normalize("wat"), "what");
    }

    #[test]
    fn test_bounded_levenshtein() {
        assert_eq!(bounded_levenshtein("fee", "fee", 2), Some(0));
        assert_eq!(bounded_levenshtein("fes", "fees", 2), Some(1));
        assert_eq!(bounded_levenshtein("fee", "library", 2), None);
    }
}
