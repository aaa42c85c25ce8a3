use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`sync.interval_secs` cannot be zero")]
    IntervalZero,
    #[error("`sync.association_concurrency` cannot be zero")]
    AssociationConcurrencyZero,
    #[error("`sync.batch_read_size` must be between 1 and {max}, got {actual}")]
    BatchReadSizeOutOfRange { actual: usize, max: usize },
    #[error("`sync.page_size` must be between 1 and {max}, got {actual}")]
    PageSizeOutOfRange { actual: usize, max: usize },
    #[error("no clients are configured")]
    NoClients,
    #[error("client `{client_name}` is missing `{field}`")]
    MissingClientCoordinate {
        client_name: String,
        field: &'static str,
    },
    #[error("clients `{first}` and `{second}` share the client key `{key}`")]
    DuplicateClientKey {
        key: String,
        first: String,
        second: String,
    },
    #[error("field settings reference unknown client key `{0}`")]
    UnknownClientKey(String),
    #[error("`rules.key_column` cannot be empty")]
    EmptyKeyColumn,
}
