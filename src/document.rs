//! Course document parsing.
//!
//! Turns the plain-text course format into a [`Course`] plus the ordered
//! [`CourseChunk`]s that feed the content collection.
//!
//! # Format
//!
//! ```text
//! Course Title: <title>
//! Course Link: <url>
//! Course Instructor: <name>
//!
//! Lesson 0: <title>
//! Lesson Link: <url>
//! <body text...>
//!
//! Lesson 1: <title>
//! ...
//! ```
//!
//! The first chunk of every lesson is stored as
//! `"Lesson {n} content: {text}"`; later chunks hold raw text. Chunk
//! indices run `0..N` across the whole course.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::chunk::{chunk_text, ChunkSettings};
use crate::error::{RagError, RagResult};
use crate::models::{Course, CourseChunk, Lesson};

fn course_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Course Title:\s*(.+)$").expect("valid regex"))
}

fn course_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Course Link:\s*(.+)$").expect("valid regex"))
}

fn course_instructor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Course Instructor:\s*(.+)$").expect("valid regex"))
}

fn lesson_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Lesson\s+(\d+):\s*(.+)$").expect("valid regex"))
}

fn lesson_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Lesson Link:\s*(.+)$").expect("valid regex"))
}

/// Parses course documents and chunks their lessons.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    settings: ChunkSettings,
}

impl DocumentProcessor {
    pub fn new(settings: ChunkSettings) -> Self {
        Self { settings }
    }

    /// Parse `text` and chunk every lesson body.
    ///
    /// # Errors
    ///
    /// [`RagError::Format`] if the document is empty, has lesson markers
    /// but no `Course Title:` line, or repeats a lesson number.
    pub fn process(&self, text: &str) -> RagResult<(Course, Vec<CourseChunk>)> {
        let parsed = parse_course_document(text)?;
        let chunks = self.chunk_course(&parsed);
        Ok((parsed.course, chunks))
    }

    fn chunk_course(&self, parsed: &ParsedDocument) -> Vec<CourseChunk> {
        let course = &parsed.course;
        let mut chunks = Vec::new();
        let mut chunk_index: i64 = 0;

        for lesson in &course.lessons {
            for (i, piece) in chunk_text(&lesson.body, &self.settings)
                .into_iter()
                .enumerate()
            {
                let content = if i == 0 {
                    format!("Lesson {} content: {}", lesson.lesson_number, piece)
                } else {
                    piece
                };
                chunks.push(CourseChunk {
                    course_title: course.title.clone(),
                    lesson_number: Some(lesson.lesson_number),
                    chunk_index,
                    content,
                });
                chunk_index += 1;
            }
        }

        if let Some(body) = &parsed.unlabeled_body {
            for piece in chunk_text(body, &self.settings) {
                chunks.push(CourseChunk {
                    course_title: course.title.clone(),
                    lesson_number: None,
                    chunk_index,
                    content: piece,
                });
                chunk_index += 1;
            }
        }

        chunks
    }
}

/// A parsed document before chunking.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub course: Course,
    /// Body text of a course without any lesson markers.
    pub unlabeled_body: Option<String>,
}

/// Parse the course document format without chunking.
///
/// A document without a `Course Title:` line is accepted only when it has
/// no lesson markers at all: its first non-empty line becomes the title
/// and the remainder becomes an unlabeled body.
pub fn parse_course_document(text: &str) -> RagResult<ParsedDocument> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let has_lessons = lines.iter().any(|l| lesson_header_re().is_match(l.trim()));

    let first = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .ok_or_else(|| RagError::Format("document is empty".to_string()))?;

    let first_line = lines[first].trim();
    let mut course = Course {
        title: String::new(),
        course_link: None,
        instructor: None,
        lessons: Vec::new(),
    };

    let mut i = first + 1;
    match course_title_re().captures(first_line) {
        Some(caps) => course.title = caps[1].trim().to_string(),
        None if has_lessons => {
            return Err(RagError::Format(
                "missing 'Course Title:' line before lesson markers".to_string(),
            ))
        }
        None => course.title = first_line.to_string(),
    }

    // Metadata lines directly after the title, in any order.
    while i < lines.len() {
        let line = lines[i].trim();
        if let Some(caps) = course_link_re().captures(line) {
            course.course_link = Some(caps[1].trim().to_string());
        } else if let Some(caps) = course_instructor_re().captures(line) {
            course.instructor = Some(caps[1].trim().to_string());
        } else if !line.is_empty() {
            break;
        }
        i += 1;
    }

    if !has_lessons {
        let body = lines[i..].join("\n");
        let unlabeled_body = (!body.trim().is_empty()).then_some(body);
        return Ok(ParsedDocument {
            course,
            unlabeled_body,
        });
    }

    let mut seen = HashSet::new();
    let mut current: Option<Lesson> = None;
    let mut body: Vec<&str> = Vec::new();

    while i < lines.len() {
        let line = lines[i].trim();
        if let Some(caps) = lesson_header_re().captures(line) {
            if let Some(mut lesson) = current.take() {
                lesson.body = body.join("\n");
                course.lessons.push(lesson);
            }
            body.clear();

            let lesson_number: i64 = caps[1]
                .parse()
                .map_err(|_| RagError::Format(format!("lesson number out of range: {}", &caps[1])))?;
            if !seen.insert(lesson_number) {
                return Err(RagError::Format(format!(
                    "duplicate lesson number {} in '{}'",
                    lesson_number, course.title
                )));
            }

            let mut lesson = Lesson {
                lesson_number,
                title: caps[2].trim().to_string(),
                lesson_link: None,
                body: String::new(),
            };

            i += 1;
            while i < lines.len() && lines[i].trim().is_empty() {
                i += 1;
            }
            if let Some(link) = lines.get(i).and_then(|l| lesson_link_re().captures(l.trim())) {
                lesson.lesson_link = Some(link[1].trim().to_string());
                i += 1;
            }
            current = Some(lesson);
            continue;
        }

        if current.is_some() {
            body.push(line);
        }
        i += 1;
    }

    if let Some(mut lesson) = current.take() {
        lesson.body = body.join("\n");
        course.lessons.push(lesson);
    }

    Ok(ParsedDocument {
        course,
        unlabeled_body: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Course Title: Building Towards Computer Use with Anthropic
Course Link: https://example.com/course
Course Instructor: Colt Steele

Lesson 0: Introduction
Lesson Link: https://example.com/lesson0
Welcome to the course. We will build things.

Lesson 1: Working with the API
Lesson Link: https://example.com/lesson1
The API accepts messages. It returns responses.

Lesson 2: Wrap Up
Thanks for taking part. See you soon.
";

    #[test]
    fn parses_metadata_and_lessons() {
        let parsed = parse_course_document(DOC).unwrap();
        let course = parsed.course;
        assert_eq!(course.title, "Building Towards Computer Use with Anthropic");
        assert_eq!(course.course_link.as_deref(), Some("https://example.com/course"));
        assert_eq!(course.instructor.as_deref(), Some("Colt Steele"));
        assert_eq!(course.lessons.len(), 3);
        assert_eq!(course.lessons[1].lesson_number, 1);
        assert_eq!(course.lessons[1].title, "Working with the API");
        assert_eq!(
            course.lessons[1].lesson_link.as_deref(),
            Some("https://example.com/lesson1")
        );
        assert_eq!(course.lessons[2].lesson_link, None);
        assert!(course.lessons[0].body.contains("Welcome to the course."));
        assert!(!course.lessons[0].body.contains("Lesson Link"));
    }

    #[test]
    fn every_lesson_first_chunk_is_prefixed_including_last() {
        let (_, chunks) = DocumentProcessor::default().process(DOC).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks[0].content,
            "Lesson 0 content: Welcome to the course. We will build things."
        );
        assert!(chunks[2].content.starts_with("Lesson 2 content: "));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn empty_document_is_format_error() {
        let err = parse_course_document("  \n\n ").unwrap_err();
        assert!(matches!(err, RagError::Format(_)));
    }

    #[test]
    fn lessons_without_title_line_is_format_error() {
        let err = parse_course_document("Some heading\nLesson 1: Intro\nBody.").unwrap_err();
        assert!(matches!(err, RagError::Format(_)));
    }

    #[test]
    fn duplicate_lesson_number_is_format_error() {
        let doc = "Course Title: X\n\nLesson 1: A\nOne.\n\nLesson 1: B\nTwo.";
        assert!(matches!(
            parse_course_document(doc),
            Err(RagError::Format(_))
        ));
    }

    #[test]
    fn titleless_body_without_lessons_is_unlabeled_course() {
        let doc = "Notes on Prompting\nPrompts matter. Be specific.";
        let (course, chunks) = DocumentProcessor::default().process(doc).unwrap();
        assert_eq!(course.title, "Notes on Prompting");
        assert!(course.lessons.is_empty());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, None);
        assert_eq!(chunks[0].content, "Prompts matter. Be specific.");
    }

    #[test]
    fn lesson_numbers_need_not_be_contiguous() {
        let doc = "Course Title: Gaps\n\nLesson 3: C\nThree.\n\nLesson 7: G\nSeven.";
        let (course, chunks) = DocumentProcessor::default().process(doc).unwrap();
        let numbers: Vec<i64> = course.lessons.iter().map(|l| l.lesson_number).collect();
        assert_eq!(numbers, vec![3, 7]);
        assert_eq!(chunks[1].content, "Lesson 7 content: Seven.");
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn lesson_with_empty_body_is_kept_without_chunks() {
        let doc = "Course Title: Sparse\n\nLesson 0: Empty\n\nLesson 1: Full\nHas text.";
        let (course, chunks) = DocumentProcessor::default().process(doc).unwrap();
        assert_eq!(course.lessons.len(), 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lesson_number, Some(1));
        assert_eq!(chunks[0].chunk_index, 0);
    }
}
