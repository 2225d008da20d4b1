//! Core data models used throughout the course assistant.
//!
//! These types represent the courses, lessons, chunks, and search results
//! that flow through the indexing and query pipeline.

use serde::{Deserialize, Serialize};

/// A course parsed from a course document.
///
/// The title is the course's identity: the catalog is keyed by it and
/// re-loading a document with the same title overwrites rather than
/// duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// A numbered lesson within a [`Course`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: i64,
    pub title: String,
    pub lesson_link: Option<String>,
    /// Raw lesson body. Not stored in the catalog.
    #[serde(skip)]
    pub body: String,
}

/// A chunk of lesson text ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseChunk {
    pub course_title: String,
    /// `None` for bodies of courses that have no lesson markers.
    pub lesson_number: Option<i64>,
    /// Zero-based, contiguous across the whole course.
    pub chunk_index: i64,
    /// Stored text, including the `Lesson {n} content: ` prefix on the
    /// first chunk of each lesson.
    pub content: String,
}

impl CourseChunk {
    /// Content-collection key: `{course_title}_{chunk_index}` with
    /// whitespace in the title replaced by underscores.
    pub fn record_id(&self) -> String {
        format!(
            "{}_{}",
            normalize_title_key(&self.course_title),
            self.chunk_index
        )
    }
}

/// Replace every whitespace run in a course title with a single `_`.
pub fn normalize_title_key(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Lesson entry as serialized into the catalog's `lessons_json` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub lesson_number: i64,
    pub lesson_title: String,
    pub lesson_link: Option<String>,
}

/// Metadata-only view of a course, one per catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub instructor: Option<String>,
    pub course_link: Option<String>,
    pub lessons: Vec<LessonSummary>,
}

impl From<&Course> for CatalogEntry {
    fn from(course: &Course) -> Self {
        Self {
            title: course.title.clone(),
            instructor: course.instructor.clone(),
            course_link: course.course_link.clone(),
            lessons: course
                .lessons
                .iter()
                .map(|l| LessonSummary {
                    lesson_number: l.lesson_number,
                    lesson_title: l.title.clone(),
                    lesson_link: l.lesson_link.clone(),
                })
                .collect(),
        }
    }
}

/// Metadata attached to every content hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<i64>,
    pub chunk_index: i64,
}

/// A single content hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 - similarity`); lower is closer.
    pub distance: f32,
}

/// Ordered hits from a content search, closest first.
///
/// `error` is set when the search could not run as asked (for example the
/// requested course could not be resolved); an empty `hits` with no error
/// means the search ran and matched nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A human-readable provenance label for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// `"{course_title} - Lesson {n}"`, or just the course title.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            link: None,
        }
    }
}
