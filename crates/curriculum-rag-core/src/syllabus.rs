//! Syllabus extraction from curriculum markdown.
//!
//! Two helpers used by the template answer provider to enrich replies with
//! facts pulled from retrieved context:
//!
//! - [`extract_languages`] lists programming languages mentioned in text.
//! - [`extract_courses`] reads rows out of markdown course tables of the form
//!   `| [Course](url) | Duration | Effort | ... |`.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// One row of a markdown course table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub name: String,
    pub duration: String,
    pub effort: String,
}

struct LanguagePattern {
    name: &'static str,
    regex: Regex,
}

// Single-letter and two-letter names are matched case-sensitively; "go",
// "r" and "ml" are ordinary words in lower case.
const LANGUAGE_PATTERNS: &[(&str, &str)] = &[
    ("Python", r"(?i)\bpython\b"),
    ("Java", r"(?i)\bjava\b"),
    ("JavaScript", r"(?i:\bjavascript\b)|\bJS\b"),
    ("C++", r"(?i)(?:^|[^\w+])c\+\+"),
    ("C", r"\bC\b(?:[^+#]|$)"),
    ("Scheme", r"(?i)\bscheme\b"),
    ("Racket", r"(?i)\bracket\b"),
    ("OCaml", r"(?i)\bocaml\b"),
    ("SML", r"\bSML\b"),
    ("ML", r"\bML\b"),
    ("Haskell", r"(?i)\bhaskell\b"),
    ("Ruby", r"(?i)\bruby\b"),
    ("Rust", r"(?i)\brust\b"),
    // Bare "Go" only inside a list or after a preposition, never as the
    // verb that opens a sentence.
    (
        "Go",
        r"(?i:\bgolang\b)|\bGo\s+(?:language|programming)\b|(?:,\s*|\b(?:and|or|in|with|using)\s+)Go\b",
    ),
    ("SQL", r"(?i)\bsql\b"),
    ("Assembly", r"(?i)\bassembly\b"),
    ("MATLAB", r"(?i)\bmatlab\b"),
    ("R", r"\bR\b"),
];

fn language_patterns() -> &'static Vec<LanguagePattern> {
    static PATTERNS: OnceLock<Vec<LanguagePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        LANGUAGE_PATTERNS
            .iter()
            .filter_map(|&(name, pattern)| {
                Regex::new(pattern)
                    .ok()
                    .map(|regex| LanguagePattern { name, regex })
            })
            .collect()
    })
}

fn markdown_link() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r"^\[([^\]]+)\]\([^)]*\)").ok())
        .as_ref()
}

/// `:-- | :--: | ---` style alignment rows.
fn is_separator_row(cells: &[&str]) -> bool {
    cells.iter().any(|c| c.contains('-'))
        && cells
            .iter()
            .all(|c| c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// Programming languages mentioned in `text`, sorted and deduplicated.
pub fn extract_languages(text: &str) -> Vec<String> {
    language_patterns()
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.name.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Course rows from every markdown table in `text`.
///
/// A table starts after its alignment row (`---`, `:--:`) and ends at the
/// first line that is not a table row. The first column is the course name,
/// with link syntax reduced to the link text.
pub fn extract_courses(text: &str) -> Vec<Course> {
    let mut courses = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        let line = line.trim();
        if line.matches('|').count() < 2 {
            in_table = false;
            continue;
        }

        let cells: Vec<&str> = line
            .trim_start_matches('|')
            .trim_end_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if is_separator_row(&cells) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }

        let Some(raw_name) = cells.first().copied().filter(|c| !c.is_empty()) else {
            continue;
        };
        let name = markdown_link()
            .and_then(|re| re.captures(raw_name))
            .and_then(|c| c.get(1))
            .map_or(raw_name, |m| m.as_str());
        if name.starts_with('-') {
            continue;
        }

        courses.push(Course {
            name: name.to_string(),
            duration: cells.get(1).copied().unwrap_or_default().to_string(),
            effort: cells.get(2).copied().unwrap_or_default().to_string(),
        });
    }

    courses
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE_TABLE: &str = "\
## Core programming

Courses | Duration | Effort | Prerequisites
:-- | :--: | :--: | :--:
| [Systematic Program Design](https://www.edx.org/spd) | 13 weeks | 8-10 hours/week | none |
| [Class-based Program Design](https://course.ccs.neu.edu/cs2510sp22) | 13 weeks | 5-10 hours/week | Systematic Program Design |

Some trailing prose.
| not | a course row |
";

    #[test]
    fn test_extract_languages_sorted_unique() {
        let text = "Learn Python and Racket, then C and C++. Later, SQL databases and more Python.";
        assert_eq!(
            extract_languages(text),
            vec!["C", "C++", "Python", "Racket", "SQL"]
        );
    }

    #[test]
    fn test_java_is_not_javascript() {
        assert_eq!(extract_languages("We use JavaScript here"), vec!["JavaScript"]);
        assert_eq!(extract_languages("java and javascript"), vec!["Java", "JavaScript"]);
    }

    #[test]
    fn test_go_verb_is_not_a_language() {
        assert!(extract_languages("Go through the prerequisites first.").is_empty());
        assert!(extract_languages("Go ahead. Go on to the next course.").is_empty());
        assert_eq!(extract_languages("Projects are written in Go."), vec!["Go"]);
        assert_eq!(extract_languages("Python, Go and Rust"), vec!["Go", "Python", "Rust"]);
        assert_eq!(extract_languages("The Go language"), vec!["Go"]);
        assert_eq!(extract_languages("golang tooling"), vec!["Go"]);
    }

    #[test]
    fn test_lowercase_short_words_ignored() {
        assert!(extract_languages("go ahead, or r ml stuff").is_empty());
    }

    #[test]
    fn test_extract_courses_from_table() {
        let courses = extract_courses(CORE_TABLE);
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].name, "Systematic Program Design");
        assert_eq!(courses[0].duration, "13 weeks");
        assert_eq!(courses[0].effort, "8-10 hours/week");
        assert_eq!(courses[1].name, "Class-based Program Design");
    }

    #[test]
    fn test_dashed_separator_and_plain_names() {
        let text = "| Course | Duration |\n|---|---|\n| Linear Algebra | 14 weeks |\n";
        let courses = extract_courses(text);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "Linear Algebra");
        assert_eq!(courses[0].effort, "");
    }

    #[test]
    fn test_no_table_no_courses() {
        assert!(extract_courses("Just prose | with one pipe").is_empty());
        assert!(extract_courses("").is_empty());
    }
}
