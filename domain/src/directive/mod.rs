//! Image-generation directives embedded in assistant responses.

pub mod parser;

pub use parser::{
    DIRECTIVE_MARKER, DirectiveError, GenerationDirective, contains_directive, extract_directive,
};
