//! Exercise guides.
//!
//! A [`Guide`] holds the exercise definitions read from one document: a
//! mapping of exercise id to `Name`, `Description` and `Tips` fields. A
//! [`GuideBook`] stacks guides so that later ones override earlier ones,
//! reporting any exercise that gets shadowed along the way.

use crate::exercise::Exercise;
use crate::types::{ExerciseDefinition, TextField};
use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Source name used for guides not read from a file
pub const STREAM_SOURCE: &str = "<stream>";

/// Exercise definitions parsed from one source document
#[derive(Clone, Debug, Default)]
pub struct Guide {
    filename: String,
    exercises: BTreeMap<String, Arc<ExerciseDefinition>>,
}

impl Guide {
    /// An empty guide
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            exercises: BTreeMap::new(),
        }
    }

    /// Build a guide from an already-decoded document.
    ///
    /// Later entries with the same id replace earlier ones.
    pub fn load(filename: impl Into<String>, document: &Value) -> Result<Self> {
        let mut guide = Self::new(filename);

        let mapping = match document {
            // An empty document is an empty guide
            Value::Null => return Ok(guide),
            Value::Mapping(mapping) => mapping,
            Value::Tagged(tagged) => return Self::load(guide.filename, &tagged.value),
            other => {
                return Err(Error::Parse(format!(
                    "Guide {} must map exercise ids to exercises; got {}",
                    guide.filename,
                    describe(other)
                )))
            }
        };

        for (key, entry) in mapping {
            let id = match key {
                Value::String(id) => id,
                other => {
                    return Err(Error::Parse(format!(
                        "Exercise id {} is not allowed: exercise ids must be strings",
                        describe(other)
                    )))
                }
            };
            validate_id(id)?;
            let definition = parse_exercise(id, entry)?;
            guide.exercises.insert(id.clone(), Arc::new(definition));
        }

        tracing::debug!(
            "Loaded {} exercises from {}",
            guide.exercises.len(),
            guide.filename
        );
        Ok(guide)
    }

    /// Decode YAML text and build a guide from it
    pub fn from_yaml_str(filename: impl Into<String>, text: &str) -> Result<Self> {
        let filename = filename.into();
        let document: Value = serde_yaml::from_str(text)
            .map_err(|e| Error::Parse(format!("Failed to parse {}: {}", filename, e)))?;
        Self::load(filename, &document)
    }

    /// Read and build a guide from a YAML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let guide = Self::from_yaml_str(path.display().to_string(), &text)?;
        tracing::info!("Loaded guide {:?} ({} exercises)", path, guide.len());
        Ok(guide)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// All the exercise ids this guide documents
    pub fn exercise_ids(&self) -> BTreeSet<&str> {
        self.exercises.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ExerciseDefinition> {
        self.exercises.values().map(|d| d.as_ref())
    }

    pub fn definition(&self, exercise_id: &str) -> Option<&ExerciseDefinition> {
        self.exercises.get(exercise_id).map(|d| d.as_ref())
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.exercises.contains_key(exercise_id)
    }

    /// True if every exercise id of `other` is also in this guide
    pub fn contains_guide(&self, other: &Guide) -> bool {
        other.exercises.keys().all(|id| self.contains(id))
    }

    /// A new, unprepped instance of the named exercise
    pub fn get_exercise(&self, exercise_id: &str) -> Result<Exercise> {
        self.exercises
            .get(exercise_id)
            .map(|definition| Exercise::new(Arc::clone(definition)))
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Exercise {} not found in guide {}",
                    exercise_id, self.filename
                ))
            })
    }

    /// Add or replace a definition after loading
    pub fn insert_definition(&mut self, definition: ExerciseDefinition) -> Result<()> {
        validate_id(&definition.id)?;
        self.exercises
            .insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn remove_definition(&mut self, exercise_id: &str) -> Option<ExerciseDefinition> {
        self.exercises
            .remove(exercise_id)
            .map(Arc::unwrap_or_clone)
    }
}

fn validate_id(exercise_id: &str) -> Result<()> {
    let starts_with_space = exercise_id.chars().next().is_some_and(char::is_whitespace);
    if exercise_id.contains('\n') || starts_with_space {
        return Err(Error::Parse(format!(
            "Exercise id {:?} is not allowed: exercise ids must not contain newlines \
             or begin with whitespace",
            exercise_id
        )));
    }
    Ok(())
}

fn parse_exercise(id: &str, entry: &Value) -> Result<ExerciseDefinition> {
    let fields: &Mapping = match entry {
        Value::Mapping(fields) => fields,
        Value::Tagged(tagged) => return parse_exercise(id, &tagged.value),
        _ => return Err(Error::Parse(format!("Badly formed exercise: {}", id))),
    };

    let name = match fields.get("Name").map(text_field).transpose()?.flatten() {
        Some(name) => name.into_text(),
        None => {
            return Err(Error::Parse(format!(
                "Badly formed exercise: {} (it has no Name)",
                id
            )))
        }
    };
    let description = fields
        .get("Description")
        .map(text_field)
        .transpose()?
        .flatten()
        .map(TextField::into_text)
        .unwrap_or_default();
    let tips = fields
        .get("Tips")
        .map(text_field)
        .transpose()?
        .flatten()
        .map(TextField::into_list)
        .unwrap_or_default();

    Ok(ExerciseDefinition {
        id: id.to_string(),
        name,
        description,
        tips,
    })
}

/// Reduce a document value to a text field; null means the field is absent
fn text_field(value: &Value) -> Result<Option<TextField>> {
    match value {
        Value::Null => Ok(None),
        Value::Sequence(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Result<Vec<_>>>()
            .map(|lines| Some(TextField::Lines(lines))),
        Value::Tagged(tagged) => text_field(&tagged.value),
        other => scalar_text(other).map(|text| Some(TextField::Single(text))),
    }
}

fn scalar_text(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        other => Err(Error::Parse(format!(
            "Expected scalar; got {}",
            describe(other)
        ))),
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|text| text.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

// ============================================================================
// GuideBook
// ============================================================================

/// Raised when an added guide redefines exercises already in the book.
///
/// Advisory only: the guide is still added and its definitions win.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "Duplicate exercise(s) '{}' loaded from files '{}', '{file}'; last loaded takes precedence",
    .exercises.join("', '"),
    .previous_files.join("', '")
)]
pub struct DuplicateWarning {
    /// Redefined exercise ids, sorted
    pub exercises: Vec<String>,
    /// Files that last defined those ids before this guide
    pub previous_files: Vec<String>,
    /// The file of the guide being added
    pub file: String,
}

/// An ordered stack of guides; later guides shadow earlier ones
#[derive(Clone, Debug, Default)]
pub struct GuideBook {
    guides: Vec<Arc<Guide>>,
}

impl GuideBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guides(&self) -> &[Arc<Guide>] {
        &self.guides
    }

    pub fn len(&self) -> usize {
        self.guides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guides.is_empty()
    }

    /// Add a guide so routines resolved against this book can use its
    /// exercises.
    ///
    /// Adding the same guide object twice does nothing. If the guide
    /// redefines exercises from earlier guides, it is still added and a
    /// [`DuplicateWarning`] describing the overlap is returned.
    pub fn add_guide(&mut self, guide: impl Into<Arc<Guide>>) -> Option<DuplicateWarning> {
        let guide = guide.into();
        if self.guides.iter().any(|g| Arc::ptr_eq(g, &guide)) {
            return None;
        }

        // Every known id, pointing at the last file that defined it
        let mut known: BTreeMap<&str, &str> = BTreeMap::new();
        for existing in &self.guides {
            for id in existing.exercises.keys() {
                known.insert(id.as_str(), existing.filename());
            }
        }

        let mut exercises = Vec::new();
        let mut previous_files: Vec<String> = Vec::new();
        for id in guide.exercises.keys() {
            if let Some(&file) = known.get(id.as_str()) {
                exercises.push(id.clone());
                if !previous_files.iter().any(|f| f == file) {
                    previous_files.push(file.to_string());
                }
            }
        }

        let warning = (!exercises.is_empty()).then(|| DuplicateWarning {
            exercises,
            previous_files,
            file: guide.filename().to_string(),
        });

        self.guides.push(guide);

        if let Some(warning) = &warning {
            tracing::warn!("{}", warning);
        }
        warning
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.guide_for(exercise_id).is_some()
    }

    /// The guide that answers lookups for `exercise_id`
    pub fn guide_for(&self, exercise_id: &str) -> Option<&Guide> {
        self.guides
            .iter()
            .rev()
            .find(|g| g.contains(exercise_id))
            .map(|g| g.as_ref())
    }

    /// Every exercise id known to any guide
    pub fn exercise_ids(&self) -> BTreeSet<&str> {
        self.guides
            .iter()
            .flat_map(|g| g.exercises.keys().map(String::as_str))
            .collect()
    }

    /// A new instance of the named exercise from the most recently added
    /// guide that defines it
    pub fn get_exercise(&self, exercise_id: &str) -> Result<Exercise> {
        if self.guides.is_empty() {
            return Err(Error::NotFound("No guides imported".into()));
        }
        match self.guide_for(exercise_id) {
            Some(guide) => guide.get_exercise(exercise_id),
            None => Err(Error::NotFound(format!(
                "Exercise {} not found in any current guide",
                exercise_id
            ))),
        }
    }
}
