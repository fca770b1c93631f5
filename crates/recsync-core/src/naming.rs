//! Folder and file naming.
//!
//! Names are produced by [`NameTemplate`]s such as
//! `{meeting_time} - {topic} - {rec_type} - {recording_id}.{file_extension}`.
//! Templates are parsed once at startup so an unknown placeholder is a
//! configuration error rather than a failure in the middle of a download.
//! Rendered names always go through [`sanitize_component`] before they touch
//! the filesystem.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

use crate::recording::{FileDescriptor, Recording};

/// Default meeting time format.
pub const DEFAULT_STRFTIME: &str = "%Y.%m.%d - %I.%M %p UTC";

/// Default file name template.
pub const DEFAULT_FILENAME_TEMPLATE: &str =
    "{meeting_time} - {topic} - {rec_type} - {recording_id}.{file_extension}";

/// Default folder template.
pub const DEFAULT_FOLDER_TEMPLATE: &str = "{meeting_time} - {topic}";

/// Suffix of in-progress downloads, appended to the final file name.
pub const PART_SUFFIX: &str = ".part";

/// Maximum length of one path component, in bytes.
const MAX_COMPONENT_BYTES: usize = 255;

/// Longest file name produced, so that `<name>.part` is still a valid name.
pub const MAX_FILE_NAME_BYTES: usize = MAX_COMPONENT_BYTES - PART_SUFFIX.len();

/// Longest tail after the last `.` kept intact when a name is shortened.
const MAX_EXTENSION_BYTES: usize = 16;

/// Marks where a shortened name was cut.
const ELISION: &str = "~";

/// Errors found while validating naming settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{name}` placeholder that no field provides.
    #[error("unknown placeholder `{{{name}}}` in template `{template}`")]
    UnknownPlaceholder { name: String, template: String },

    /// A `{` without matching `}` or a stray `}`.
    #[error("unbalanced braces in template `{template}`")]
    Unbalanced { template: String },

    /// The strftime pattern contains an invalid specifier.
    #[error("invalid time format `{0}`")]
    InvalidTimeFormat(String),

    /// The timezone is not a known IANA name.
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

/// A named value that templates may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    MeetingTime,
    Topic,
    RecType,
    RecordingId,
    MeetingId,
    FileType,
    FileExtension,
    Year,
    Month,
    Day,
}

impl Placeholder {
    const ALL: [Placeholder; 10] = [
        Self::MeetingTime,
        Self::Topic,
        Self::RecType,
        Self::RecordingId,
        Self::MeetingId,
        Self::FileType,
        Self::FileExtension,
        Self::Year,
        Self::Month,
        Self::Day,
    ];

    /// The name used inside braces.
    pub fn name(self) -> &'static str {
        match self {
            Self::MeetingTime => "meeting_time",
            Self::Topic => "topic",
            Self::RecType => "rec_type",
            Self::RecordingId => "recording_id",
            Self::MeetingId => "meeting_id",
            Self::FileType => "file_type",
            Self::FileExtension => "file_extension",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

/// A validated naming pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    /// Parses a pattern. `{{` and `}}` produce literal braces.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let unbalanced = || TemplateError::Unbalanced {
            template: template.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(unbalanced()),
                            Some(ch) => name.push(ch),
                        }
                    }
                    let field = Placeholder::from_name(name.trim()).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder {
                            name: name.clone(),
                            template: template.to_string(),
                        }
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => return Err(unbalanced()),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The pattern this template was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the template references the given placeholder.
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field(p) if *p == placeholder))
    }

    /// Renders the template. Pure: the output only depends on `fields`.
    pub fn render(&self, fields: &NameFields) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(p) => out.push_str(fields.get(*p)),
            }
        }
        out
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Converts meeting start instants into local, formatted strings.
#[derive(Debug, Clone)]
pub struct MeetingTimeFormat {
    timezone: Tz,
    strftime: String,
}

impl MeetingTimeFormat {
    /// Validates the timezone name and strftime pattern.
    pub fn new(timezone: &str, strftime: &str) -> Result<Self, TemplateError> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| TemplateError::UnknownTimezone(timezone.to_string()))?;
        if StrftimeItems::new(strftime).any(|item| matches!(item, Item::Error)) {
            return Err(TemplateError::InvalidTimeFormat(strftime.to_string()));
        }
        Ok(Self {
            timezone,
            strftime: strftime.to_string(),
        })
    }

    /// The configured timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }
}

impl Default for MeetingTimeFormat {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            strftime: DEFAULT_STRFTIME.to_string(),
        }
    }
}

/// The structured values a template can reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFields {
    pub meeting_time: String,
    pub topic: String,
    pub rec_type: String,
    pub recording_id: String,
    pub meeting_id: String,
    pub file_type: String,
    pub file_extension: String,
    pub year: String,
    pub month: String,
    pub day: String,
}

impl NameFields {
    /// Builds the fields for one file of a recording.
    pub fn for_file(
        recording: &Recording,
        file: &FileDescriptor,
        time_format: &MeetingTimeFormat,
    ) -> Self {
        let local = time_format.local(recording.start_time);
        Self {
            meeting_time: local.format(&time_format.strftime).to_string(),
            topic: strip_invalid_chars(&recording.topic),
            rec_type: file.category.title(),
            recording_id: file.id.clone(),
            meeting_id: recording.meeting_id.to_string(),
            file_type: file.file_type.clone(),
            file_extension: file.file_extension.to_lowercase(),
            year: local.format("%Y").to_string(),
            month: local.format("%m").to_string(),
            day: local.format("%d").to_string(),
        }
    }

    fn get(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::MeetingTime => &self.meeting_time,
            Placeholder::Topic => &self.topic,
            Placeholder::RecType => &self.rec_type,
            Placeholder::RecordingId => &self.recording_id,
            Placeholder::MeetingId => &self.meeting_id,
            Placeholder::FileType => &self.file_type,
            Placeholder::FileExtension => &self.file_extension,
            Placeholder::Year => &self.year,
            Placeholder::Month => &self.month,
            Placeholder::Day => &self.day,
        }
    }
}

/// The folder and file templates plus the time format, validated together.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    pub folder: NameTemplate,
    pub filename: NameTemplate,
    pub time_format: MeetingTimeFormat,
}

impl NamingScheme {
    /// Parses and validates all naming settings.
    pub fn new(
        folder: &str,
        filename: &str,
        timezone: &str,
        strftime: &str,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            folder: NameTemplate::parse(folder)?,
            filename: NameTemplate::parse(filename)?,
            time_format: MeetingTimeFormat::new(timezone, strftime)?,
        })
    }

    /// Returns the sanitized destination of `file`, relative to the download
    /// root.
    ///
    /// File names longer than [`MAX_FILE_NAME_BYTES`] lose bytes from the
    /// middle; the start, the end and the extension are kept.
    pub fn relative_path(&self, recording: &Recording, file: &FileDescriptor) -> PathBuf {
        let fields = NameFields::for_file(recording, file, &self.time_format);
        let folder = sanitize_relative_path(&self.folder.render(&fields));
        folder.join(sanitize_name(
            &self.filename.render(&fields),
            MAX_FILE_NAME_BYTES,
        ))
    }

    /// Returns the destinations of all `files` of `recording`, in order.
    ///
    /// No two entries are equal, even ignoring case. A file whose name is
    /// already taken (for example with a template that omits
    /// `{recording_id}`) gets ` - <file id>` before its extension.
    pub fn file_paths(&self, recording: &Recording, files: &[FileDescriptor]) -> Vec<PathBuf> {
        let mut taken = HashSet::new();
        files
            .iter()
            .map(|file| {
                let base = self.relative_path(recording, file);
                let mut path = base.clone();
                let mut attempt = 1;
                while !taken.insert(path.to_string_lossy().to_lowercase()) {
                    let suffix = if attempt == 1 {
                        format!(" - {}", file.id)
                    } else {
                        format!(" - {} ({})", file.id, attempt)
                    };
                    path = with_name_suffix(&base, &suffix);
                    attempt += 1;
                }
                path
            })
            .collect()
    }
}

impl Default for NamingScheme {
    fn default() -> Self {
        Self {
            folder: NameTemplate::parse(DEFAULT_FOLDER_TEMPLATE)
                .expect("default folder template is valid"),
            filename: NameTemplate::parse(DEFAULT_FILENAME_TEMPLATE)
                .expect("default filename template is valid"),
            time_format: MeetingTimeFormat::default(),
        }
    }
}

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).expect("valid regex"));

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn strip_invalid_chars(value: &str) -> String {
    INVALID_CHARS.replace_all(value, "").into_owned()
}

/// Makes a single name safe to use as one path component.
///
/// Never fails: characters invalid on common filesystems are dropped,
/// trailing dots and spaces are trimmed, reserved device names get a leading
/// underscore, overly long names are shortened in the middle at character
/// boundaries, and an empty result becomes `_`.
pub fn sanitize_component(name: &str) -> String {
    sanitize_name(name, MAX_COMPONENT_BYTES)
}

fn sanitize_name(name: &str, max_bytes: usize) -> String {
    let cleaned = strip_invalid_chars(name);
    let trimmed = cleaned.trim().trim_end_matches(['.', ' ']);

    let mut out = if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "_".to_string()
    } else {
        trimmed.to_string()
    };

    let stem = out.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        out.insert(0, '_');
    }

    shorten_middle(out, max_bytes)
}

/// Splits `name` into a stem and an extension that includes its dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot)
            if dot > 0
                && name.len() - dot <= MAX_EXTENSION_BYTES
                && !name[dot..].contains(' ') =>
        {
            name.split_at(dot)
        }
        _ => (name, ""),
    }
}

fn shorten_middle(name: String, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name;
    }
    let (stem, extension) = split_extension(&name);
    let budget = max_bytes.saturating_sub(extension.len() + ELISION.len());
    let head = floor_char_boundary(stem, budget / 2);
    let tail = ceil_char_boundary(stem, stem.len() - (budget - budget / 2));
    format!("{}{}{}{}", &stem[..head], ELISION, &stem[tail..], extension)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Inserts `suffix` before the extension of the file name of `path`.
fn with_name_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = split_extension(&name);
    path.with_file_name(sanitize_name(
        &format!("{}{}{}", stem, suffix, extension),
        MAX_FILE_NAME_BYTES,
    ))
}

/// Sanitizes a relative path made of `/`-separated components.
///
/// Absolute prefixes and `..` components are dropped, so the result always
/// stays below whatever root it is joined to.
pub fn sanitize_relative_path(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.split(['/', '\\']) {
        let component = Path::new(part).components().next();
        if matches!(
            component,
            None | Some(Component::ParentDir | Component::CurDir | Component::RootDir)
        ) {
            continue;
        }
        out.push(sanitize_component(part));
    }
    if out.as_os_str().is_empty() {
        out.push("_");
    }
    out
}
