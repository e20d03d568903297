pub mod chunker;
pub mod extract;

pub use chunker::Chunker;
pub use extract::{detect_content_kind, extract_text, ContentKind, DecodeError};
