mod inline;
mod token;

pub use inline::{InlineSpan, SpanKind, plain_text, segment};
pub use token::{Token, tokenize};
