/// Errors produced by the `relay-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A function was registered twice under the same name and version.
    #[error("function '{name}' version {version} is already registered")]
    DuplicateFunction { name: String, version: u32 },

    /// A function was registered without a name and does not carry one.
    #[error("function has no name; pass one explicitly when registering")]
    UnnamedFunction,

    /// Registration used a version outside the accepted range.
    #[error("invalid version {version} for function '{name}': must be >= 1")]
    InvalidVersion { name: String, version: u32 },

    /// A value could not be encoded for, or decoded from, the wire.
    #[error("value encoding failed: {0}")]
    Encoding(String),

    /// The opaque task body is missing the fields the engine needs.
    #[error("malformed task: {0}")]
    MalformedTask(String),

    /// A promise could not be read from the orchestrator.
    #[error("promise source failed: {0}")]
    PromiseSource(String),
}
