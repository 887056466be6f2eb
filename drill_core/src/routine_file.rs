//! Routine file parser.
//!
//! Routine files are line oriented:
//!
//! ```text
//! # comment
//! rest=10
//! read_delay=5
//! name=
//!   A name split over
//!   several lines
//!
//! kettle_swing,60
//! kettle_clean_left,45,15,5
//! ```
//!
//! Leading and trailing whitespace is ignored. `key=value` lines are
//! settings; `key=` opens a multi-line setting that runs until the next
//! blank line, with its lines joined by single spaces. Any other line is an
//! exercise: `id,duration[,rest[,read_delay]]`, where a missing rest or read
//! delay falls back to the current default. A backslash before `=` or `,`
//! makes it literal.

use crate::guide::GuideBook;
use crate::routine::Routine;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Most comma-separated fields an exercise line can have
const MAX_EXERCISE_FIELDS: usize = 4;

/// Settings recognised in a routine file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Setting {
    Rest,
    ReadDelay,
    Name,
    Description,
}

/// What applying a setting changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingKind {
    /// An integer default for later exercise lines
    Default,
    /// A property of the routine being built
    Routine,
}

impl Setting {
    /// Case-insensitive lookup of a setting key
    pub fn lookup(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "rest" => Some(Setting::Rest),
            "read_delay" => Some(Setting::ReadDelay),
            "name" => Some(Setting::Name),
            "description" => Some(Setting::Description),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Setting::Rest => "rest",
            Setting::ReadDelay => "read_delay",
            Setting::Name => "name",
            Setting::Description => "description",
        }
    }

    /// Human wording used in error messages
    pub fn meaning(&self) -> &'static str {
        match self {
            Setting::Rest => "rest period",
            Setting::ReadDelay => "read delay",
            Setting::Name => "name",
            Setting::Description => "description",
        }
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            Setting::Rest | Setting::ReadDelay => SettingKind::Default,
            Setting::Name | Setting::Description => SettingKind::Routine,
        }
    }
}

/// A `key=` setting still collecting lines
struct Continuation {
    setting: Setting,
    opened_by: String,
    value: String,
}

/// Parses routine files, remembering default settings between lines.
///
/// Defaults persist across parses until [`RoutineFile::clear_settings`].
#[derive(Clone, Debug, Default)]
pub struct RoutineFile {
    rest: Option<i64>,
    read_delay: Option<i64>,
}

impl RoutineFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the default rest and read delay
    pub fn clear_settings(&mut self) {
        self.rest = None;
        self.read_delay = None;
    }

    pub fn default_rest(&self) -> Option<i64> {
        self.rest
    }

    pub fn default_read_delay(&self) -> Option<i64> {
        self.read_delay
    }

    /// Load the routine file at `path`
    pub fn load_file<'g>(&mut self, path: &Path, guidebook: &'g GuideBook) -> Result<Routine<'g>> {
        let file = File::open(path)?;
        let routine = self.parse_reader(BufReader::new(file), guidebook)?;
        tracing::info!(
            "Loaded routine {:?} ({} exercises)",
            path,
            routine.len()
        );
        Ok(routine)
    }

    pub fn parse_str<'g>(&mut self, text: &str, guidebook: &'g GuideBook) -> Result<Routine<'g>> {
        self.parse_reader(text.as_bytes(), guidebook)
    }

    pub fn parse_reader<'g, R: BufRead>(
        &mut self,
        reader: R,
        guidebook: &'g GuideBook,
    ) -> Result<Routine<'g>> {
        let mut routine = Routine::new(guidebook);
        let mut open: Option<Continuation> = None;

        for raw in reader.lines() {
            let raw = raw?;
            let line = raw.trim();

            if line.is_empty() {
                if let Some(continuation) = open.take() {
                    self.finish_continuation(&mut routine, continuation)?;
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if let Some(continuation) = open.as_mut() {
                if !continuation.value.is_empty() {
                    continuation.value.push(' ');
                }
                continuation.value.push_str(line);
                continue;
            }

            if let Some((key, value)) = split_setting(line) {
                let setting = Setting::lookup(&key).ok_or_else(|| {
                    Error::Parse(format!("Unrecognised setting '{}'", key.trim())).with_line(line)
                })?;
                let value = value.trim();
                if value.is_empty() {
                    open = Some(Continuation {
                        setting,
                        opened_by: line.to_string(),
                        value: String::new(),
                    });
                } else {
                    self.apply(&mut routine, setting, value)
                        .map_err(|e| e.with_line(line))?;
                }
                continue;
            }

            let fields = split_unescaped(line, ',');
            if fields.len() > 1 {
                self.add_exercise(&mut routine, &fields)
                    .map_err(|e| e.with_line(line))?;
                continue;
            }

            return Err(Error::Parse(format!(
                "Unrecognised line in routine file: {}",
                line
            )));
        }

        // The input may end without the blank line that closes a setting
        if let Some(continuation) = open.take() {
            self.finish_continuation(&mut routine, continuation)?;
        }

        Ok(routine)
    }

    fn finish_continuation(&mut self, routine: &mut Routine<'_>, continuation: Continuation) -> Result<()> {
        self.apply(routine, continuation.setting, &continuation.value)
            .map_err(|e| e.with_line(&continuation.opened_by))
    }

    fn apply(&mut self, routine: &mut Routine<'_>, setting: Setting, value: &str) -> Result<()> {
        tracing::debug!("Setting {} = {:?}", setting.key(), value);
        match setting.kind() {
            SettingKind::Default => {
                let value = to_int(value, setting.meaning())?;
                if let Some(slot) = self.default_slot(setting) {
                    *slot = Some(value);
                }
            }
            SettingKind::Routine => {
                if setting == Setting::Name {
                    routine.set_name(value);
                } else {
                    routine.set_description(value);
                }
            }
        }
        Ok(())
    }

    fn default_slot(&mut self, setting: Setting) -> Option<&mut Option<i64>> {
        match setting {
            Setting::Rest => Some(&mut self.rest),
            Setting::ReadDelay => Some(&mut self.read_delay),
            Setting::Name | Setting::Description => None,
        }
    }

    fn add_exercise(&self, routine: &mut Routine<'_>, fields: &[String]) -> Result<()> {
        if fields.len() > MAX_EXERCISE_FIELDS {
            return Err(Error::Parse(format!(
                "Unrecognised exercise in routine file (too many arguments; \
                 expected at most {} comma-separated fields, found {})",
                MAX_EXERCISE_FIELDS,
                fields.len()
            )));
        }

        let exercise_id = fields[0].trim();
        let duration = to_int(&fields[1], "duration")?;
        let rest = fields
            .get(2)
            .map(|field| to_int(field, Setting::Rest.meaning()))
            .transpose()?;
        let read_delay = fields
            .get(3)
            .map(|field| to_int(field, Setting::ReadDelay.meaning()))
            .transpose()?;

        let mut exercise = routine.guidebook().get_exercise(exercise_id)?;

        let rest = match rest.or(self.rest) {
            Some(rest) => rest,
            None => {
                return Err(Error::Default(
                    "If a default rest period hasn't been set, you must supply an explicit one"
                        .into(),
                ))
            }
        };
        let read_delay = match read_delay.or(self.read_delay) {
            Some(read_delay) => read_delay,
            None => {
                return Err(Error::Default(
                    "If a default read_delay hasn't been set, you must supply an explicit one"
                        .into(),
                ))
            }
        };

        exercise.prep(duration, rest, read_delay)?;
        routine.push_exercise(exercise)
    }
}

/// Split `line` at every `delimiter` not preceded by a backslash.
///
/// `\<delimiter>` becomes a literal delimiter; other backslashes are kept.
fn split_unescaped(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&delimiter) {
            field.push(delimiter);
            chars.next();
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}

/// `(key, value)` if `line` has an unescaped `=`.
///
/// Only the first unescaped `=` separates; any later ones belong to the value.
fn split_setting(line: &str) -> Option<(String, String)> {
    let mut fields = split_unescaped(line, '=').into_iter();
    let key = fields.next()?;
    let rest: Vec<String> = fields.collect();
    if rest.is_empty() {
        return None;
    }
    Some((key, rest.join("=")))
}

fn to_int(text: &str, meaning: &str) -> Result<i64> {
    text.trim().parse::<i64>().map_err(|_| {
        let cause = Error::Parse(format!("{:?} is not a valid integer", text));
        Error::Parse(format!(
            "{:?} is not a valid {}:\n{}",
            text,
            meaning,
            cause.indented_message("  ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guide::Guide;

    fn guidebook() -> GuideBook {
        let mut book = GuideBook::new();
        book.add_guide(
            Guide::from_yaml_str(
                "guide1.yaml",
                "exercise1:\n    Name: Test Exercise 1\n    Description: Test description 1\n",
            )
            .unwrap(),
        );
        book.add_guide(
            Guide::from_yaml_str(
                "guide2.yaml",
                "exercise2:\n    Name: Test Exercise 2\n    Description: Test description 2\n",
            )
            .unwrap(),
        );
        book
    }

    fn parse(text: &str) -> Result<(Vec<(String, u64, u64, u64)>, Option<String>, Option<String>)> {
        let book = guidebook();
        let routine = RoutineFile::new().parse_str(text, &book)?;
        let exercises = routine
            .exercises()
            .iter()
            .map(|e| {
                let t = e.timing().unwrap();
                (e.id().to_string(), t.duration, t.rest, t.read_delay)
            })
            .collect();
        Ok((
            exercises,
            routine.name().map(String::from),
            routine.description().map(String::from),
        ))
    }

    #[test]
    fn test_load_good_file() {
        let (exercises, name, description) = parse(
            "
            # Settings
            rest=7
            read_delay=10
            name=Test routine
            description=Test description
            # Exercises
            exercise1,5
            exercise2,8
            ",
        )
        .unwrap();
        assert_eq!(
            exercises,
            vec![
                ("exercise1".to_string(), 5, 7, 10),
                ("exercise2".to_string(), 8, 7, 10),
            ]
        );
        assert_eq!(name.as_deref(), Some("Test routine"));
        assert_eq!(description.as_deref(), Some("Test description"));
    }

    #[test]
    fn test_multiline_setting_and_explicit_timings() {
        let (exercises, name, description) = parse(
            "
            name=
              Multiline
              name

            # Don't need a description (or a name, even)
            exercise1,5,2,8
            exercise2,4,3,1
            ",
        )
        .unwrap();
        assert_eq!(name.as_deref(), Some("Multiline name"));
        assert_eq!(description, None);
        assert_eq!(exercises[0].3, 8);
        assert_eq!(exercises[1].2, 3);
    }

    #[test]
    fn test_comment_inside_continuation() {
        let (_, _, description) = parse(
            "description=\n  first\n# not part of it\n  second\n\nrest=1\nread_delay=1\nexercise1,1\n",
        )
        .unwrap();
        assert_eq!(description.as_deref(), Some("first second"));
    }

    #[test]
    fn test_continuation_closed_by_end_of_input() {
        let (exercises, name, _) = parse("rest=1\nread_delay=2\nexercise1,3\nname=\n  Trailing\n  name").unwrap();
        assert_eq!(exercises.len(), 1);
        assert_eq!(name.as_deref(), Some("Trailing name"));
    }

    #[test]
    fn test_file_order_is_kept() {
        let (exercises, _, _) = parse(
            "rest=1\nread_delay=1\nexercise2,1\nexercise1,2\nexercise2,3\nexercise1,4\n",
        )
        .unwrap();
        let order: Vec<_> = exercises.iter().map(|e| (e.0.as_str(), e.1)).collect();
        assert_eq!(
            order,
            vec![("exercise2", 1), ("exercise1", 2), ("exercise2", 3), ("exercise1", 4)]
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (exercises, name, _) =
            parse("REST = 4\nRead_Delay=6\nName=Shouty\nexercise1,2\n").unwrap();
        assert_eq!(exercises[0], ("exercise1".to_string(), 2, 4, 6));
        assert_eq!(name.as_deref(), Some("Shouty"));
    }

    #[test]
    fn test_missing_defaults() {
        let err = parse("rest=5\n# No default read delay\nexercise1,5,2\n").unwrap_err();
        assert!(err.is_default());
        assert!(err.to_string().contains("default read_delay"));
        assert!(err.to_string().contains("Line: exercise1,5,2"));

        let err = parse("read_delay=8\n# No default rest period\nexercise1,6\n").unwrap_err();
        assert!(err.is_default());
        assert!(err.to_string().contains("default rest"));
    }

    #[test]
    fn test_bad_values() {
        let err = parse("rest=4\nread_delay=3\nexercise1\n").unwrap_err();
        assert!(err.to_string().contains("Unrecognised line"));

        let err = parse("rest=not a number\nread_delay=48\nexercise1,6\n").unwrap_err();
        assert!(err.is_parse());
        let message = err.to_string();
        assert!(message.contains("\"not a number\" is not a valid rest period"));
        assert!(message.contains("Line: rest=not a number"));

        let err = parse("rest=68\nread_delay=also not a number\nexercise1,2\n").unwrap_err();
        assert!(err.to_string().contains("\"also not a number\" is not a valid read delay"));

        let err = parse("rest=42\nread_delay=21\nexercise1,still not a number\n").unwrap_err();
        assert!(err.to_string().contains("\"still not a number\" is not a valid duration"));

        let err = parse("rest=24\nread_delay=28\nexercise1,65,bad rest\n").unwrap_err();
        assert!(err.to_string().contains("\"bad rest\" is not a valid rest period"));

        let err = parse("rest=39\nread_delay=84\nexercise1,38,4223,bad read delay\n").unwrap_err();
        assert!(err.to_string().contains("\"bad read delay\" is not a valid read delay"));
    }

    #[test]
    fn test_unknown_setting() {
        let err = parse("rest=4\nbad setting=87\n").unwrap_err();
        assert!(err.is_parse());
        let message = err.to_string();
        assert!(message.contains("Unrecognised setting 'bad setting'"));
        assert!(message.contains("Line: bad setting=87"));

        let err = parse("colour=\n  blue\n\n").unwrap_err();
        assert!(err.to_string().contains("Unrecognised setting 'colour'"));
    }

    #[test]
    fn test_too_many_fields() {
        let err = parse("rest=245\nread_delay=2495\nexercise1,32,51,15,15\n").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("too many arguments"));
    }

    #[test]
    fn test_escaped_comma_is_not_a_separator() {
        let err = parse("rest=1\nread_delay=1\nexercise1,5\\,000\n").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("\"5,000\" is not a valid duration"));
    }

    #[test]
    fn test_escaped_equals_in_values() {
        let (_, name, _) = parse("name=a \\= b\nrest=1\nread_delay=1\nexercise1,1\n").unwrap();
        assert_eq!(name.as_deref(), Some("a = b"));
    }

    #[test]
    fn test_missing_exercise_propagates() {
        let err = parse("rest=4\nread_delay=8\nmissing_exercise,2\n").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_huge_timings_do_not_overflow_total() {
        let book = guidebook();
        let max = i64::MAX;
        let routine = RoutineFile::new()
            .parse_str(&format!("exercise1,{max},{max},{max}\nexercise2,{max},{max},{max}\n"), &book)
            .unwrap();
        assert_eq!(routine.len(), 2);
        assert_eq!(routine.total_time(), u64::MAX);
        assert_eq!(routine.summary().total_time, u64::MAX);
    }

    #[test]
    fn test_negative_duration() {
        let err = parse("rest=4\nread_delay=8\nexercise1,-2\n").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("Can't exercise for -2"));
    }

    #[test]
    fn test_defaults_persist_until_cleared() {
        let book = guidebook();
        let mut file = RoutineFile::new();
        file.parse_str("rest=3\nread_delay=4\nname=First\n", &book).unwrap();
        assert_eq!(file.default_rest(), Some(3));

        let routine = file.parse_str("exercise1,2\n", &book).unwrap();
        assert_eq!(routine.exercises()[0].timing().unwrap().rest, 3);
        assert_eq!(routine.name(), None);

        file.clear_settings();
        assert_eq!(file.default_rest(), None);
        assert_eq!(file.default_read_delay(), None);
        assert!(file.parse_str("exercise1,2\n", &book).unwrap_err().is_default());
    }

    #[test]
    fn test_setting_table() {
        assert_eq!(Setting::lookup(" Read_Delay "), Some(Setting::ReadDelay));
        assert_eq!(Setting::lookup("colour"), None);
        assert_eq!(Setting::Rest.kind(), SettingKind::Default);
        assert_eq!(Setting::Description.kind(), SettingKind::Routine);
        assert_eq!(Setting::ReadDelay.meaning(), "read delay");
    }

    #[test]
    fn test_settings_update_defaults_or_routine() {
        let book = guidebook();
        let mut file = RoutineFile::new();
        let routine = file.parse_str("rest=3\ndescription=Just a description\n", &book).unwrap();
        assert_eq!(file.default_rest(), Some(3));
        assert_eq!(file.default_read_delay(), None);
        assert_eq!(routine.description(), Some("Just a description"));
        assert_eq!(routine.name(), None);
    }

    #[test]
    fn test_split_unescaped() {
        assert_eq!(split_unescaped("a,b\\,c,d", ','), vec!["a", "b,c", "d"]);
        assert_eq!(split_unescaped("a\\b", ','), vec!["a\\b"]);
        assert_eq!(split_setting("key=va=lue"), Some(("key".into(), "va=lue".into())));
        assert_eq!(split_setting("key\\=value"), None);
    }

    #[test]
    fn test_load_file() {
        let book = guidebook();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("routine.txt");
        std::fs::write(&path, "rest=1\nread_delay=1\nexercise1,30\nexercise2,30\n").unwrap();

        let routine = RoutineFile::new().load_file(&path, &book).unwrap();
        assert_eq!(routine.total_time(), 64);
    }
}
