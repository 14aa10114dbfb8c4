/// Errors from the fallible corners of the geometry crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid resolution `{0}`: expected WIDTHxHEIGHT")]
    InvalidResolution(String),
    #[error("unknown anchor `{0}`")]
    UnknownAnchor(String),
    #[error("transform is not invertible (determinant {0})")]
    SingularMatrix(f64),
    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),
}
