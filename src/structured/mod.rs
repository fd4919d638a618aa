//! JSON-contract response handling.
//!
//! When a prompt is sent in JSON-contract mode the model must answer with a
//! JSON object carrying exactly the [`REQUIRED_FIELDS`]. Markdown code fences
//! around the object are tolerated; anything else is an
//! [`InvalidResponseShape`](crate::Error::InvalidResponseShape) error.

mod contract;
mod error;

pub use contract::{
    parse_translation_record, strip_code_fences, validate_fields, TranslationRecord,
    REQUIRED_FIELDS,
};
pub use error::ValidationError;
