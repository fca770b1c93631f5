//! Core types: date windows, recordings, file naming, tracing setup

pub mod naming;
pub mod recording;
pub mod time;
pub mod tracing;

pub use naming::{
    MAX_FILE_NAME_BYTES, MeetingTimeFormat, NameFields, NameTemplate, NamingScheme, PART_SUFFIX,
    Placeholder, TemplateError, sanitize_component, sanitize_relative_path,
};
pub use recording::{FileCategory, FileDescriptor, MeetingId, Recording, RecordingFile};
pub use time::{DateRange, DateWindow, TimeError, Windows};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
