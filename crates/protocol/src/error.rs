//! Error types for reply decoding.

/// Errors produced while decoding a DBGp reply.
///
/// These describe malformed input. A well-formed negative reply from the
/// engine (an `<error>` element) is not an error; it decodes into
/// [`CommandOutcome::Failure`](crate::CommandOutcome::Failure).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("empty message")]
    Empty,

    #[error("<{element}> is missing attribute `{attribute}`")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("<{element}> has invalid `{attribute}` value {value:?}")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
    },

    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),
}
