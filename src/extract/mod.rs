pub mod fields;

pub use fields::{extract_resume_fields, ExtractOptions, ResumeFields};
