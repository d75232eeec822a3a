//! Deterministic local answers used when no hosted model replies.
//!
//! | Query contains | Answer |
//! |----------------|--------|
//! | `ossu` and `what`/`about` | Curriculum description |
//! | `core cs` / `core curriculum` | Core course list by area |
//! | `programming language` | Language overview, plus languages seen in context |
//! | `how long` / `duration` | Time commitment estimates |
//! | `course`, with a course table in context | Courses read from the table |
//! | anything else | First 800 chars of the retrieved context |

use async_trait::async_trait;

use curriculum_rag_core::models::ChatMessage;
use curriculum_rag_core::syllabus::{extract_courses, extract_languages, Course};

use super::{truncate_chars, AnswerContext, AnswerProvider};

pub const OSSU_DESCRIPTION: &str = "OSSU (Open Source Society University) is a complete, self-taught education in Computer Science using free online materials.

It's designed to mirror the curriculum of an undergraduate CS degree and includes:
- Rigorous coursework from MIT, Harvard, Princeton, and other top universities
- Projects and assignments to build practical skills
- A supportive community of learners
- No tuition fees - completely free

The curriculum covers everything from programming basics to advanced topics like machine learning and distributed systems.";

pub const CORE_CURRICULUM: &str = "The Core CS curriculum consists of the following courses:

**Core Programming** (3 courses):
• How to Code: Simple Data
• How to Code: Complex Data
• Programming Languages (Parts A, B, C)

**Core Math** (3 courses):
• Mathematics for Computer Science
• Linear Algebra
• Calculus

**Core Systems** (3 courses):
• Build a Modern Computer (Nand2Tetris)
• Operating Systems: Three Easy Pieces
• Computer Networking

**Core Theory** (3 courses):
• Algorithms and Data Structures
• Computability and Complexity
• Computer Science Theory

**Core Security** (2 courses):
• Information Security
• Cryptography I

**Core Applications** (4 courses):
• Databases
• Machine Learning
• Computer Graphics
• Software Engineering";

pub const PROGRAMMING_LANGUAGES: &str = concat!(
    "The OSSU curriculum teaches various programming languages:\n",
    "\n",
    "**Introductory**: Python, Scheme/Racket  \n",
    "**Systems**: C, Assembly  \n",
    "**Object-Oriented**: Java, C++  \n",
    "**Functional**: Haskell, ML/OCaml  \n",
    "**Web**: JavaScript, HTML/CSS  \n",
    "**Databases**: SQL\n",
    "\n",
    "Each language is chosen to teach specific programming paradigms and concepts.",
);

pub const DURATION: &str = concat!(
    "The OSSU Computer Science curriculum typically takes 2-4 years to complete, depending on your pace:\n",
    "\n",
    "• **Part-time (10-20 hours/week)**: 4-6 years\n",
    "• **Half-time (20-30 hours/week)**: 2-3 years  \n",
    "• **Full-time (40+ hours/week)**: 1.5-2 years\n",
    "\n",
    "The curriculum includes approximately 2000 hours of study, similar to a traditional CS degree.",
);

pub const NO_CONTEXT: &str = "I couldn't find relevant information in the documentation for your question. Try asking about the OSSU curriculum, core CS courses, or programming languages used.";

const MAX_LISTED_COURSES: usize = 10;

pub struct TemplateProvider;

impl TemplateProvider {
    /// Always produces text.
    pub fn answer(&self, query: &str, context: &AnswerContext<'_>) -> String {
        let q = query.to_lowercase();

        if q.contains("ossu") && (q.contains("what") || q.contains("about")) {
            return OSSU_DESCRIPTION.to_string();
        }
        if q.contains("core cs") || q.contains("core curriculum") {
            return CORE_CURRICULUM.to_string();
        }
        if q.contains("programming language") {
            let mentioned = extract_languages(&raw_context(context));
            if mentioned.is_empty() {
                return PROGRAMMING_LANGUAGES.to_string();
            }
            return format!(
                "{}\n\nLanguages mentioned in the retrieved documentation: {}.",
                PROGRAMMING_LANGUAGES,
                mentioned.join(", ")
            );
        }
        if q.contains("how long") || q.contains("duration") {
            return DURATION.to_string();
        }
        if q.contains("course") {
            let courses = courses_in(context);
            if !courses.is_empty() {
                return render_courses(&courses);
            }
        }

        if context.text.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            format!(
                "Based on the documentation:\n\n{}",
                truncate_chars(&context.text, 800)
            )
        }
    }
}

/// Untruncated text of every retrieved result, falling back to the
/// rendered context when no raw results were supplied.
fn raw_context(context: &AnswerContext<'_>) -> String {
    if context.results.is_empty() {
        return context.text.clone();
    }
    context
        .results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn courses_in(context: &AnswerContext<'_>) -> Vec<Course> {
    let mut seen = std::collections::HashSet::new();
    let mut courses = Vec::new();
    let texts: Vec<&str> = if context.results.is_empty() {
        vec![context.text.as_str()]
    } else {
        context.results.iter().map(|r| r.content.as_str()).collect()
    };
    for text in texts {
        for course in extract_courses(text) {
            if seen.insert(course.name.clone()) {
                courses.push(course);
            }
        }
    }
    courses.truncate(MAX_LISTED_COURSES);
    courses
}

fn render_courses(courses: &[Course]) -> String {
    let mut out = String::from("Courses found in the documentation:\n");
    for course in courses {
        let details: Vec<&str> = [course.duration.as_str(), course.effort.as_str()]
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect();
        if details.is_empty() {
            out.push_str(&format!("\n• {}", course.name));
        } else {
            out.push_str(&format!("\n• {} ({})", course.name, details.join(", ")));
        }
    }
    out
}

#[async_trait]
impl AnswerProvider for TemplateProvider {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn attempt(
        &self,
        query: &str,
        context: &AnswerContext<'_>,
        _history: &[ChatMessage],
    ) -> Option<String> {
        Some(self.answer(query, context))
    }
}
