// Error types shared by the phenology and temporal statistics engines.

pub type Result<T> = std::result::Result<T, PhenologyError>;

#[derive(thiserror::Error, Debug)]
pub enum PhenologyError {
  /// A deferred (lazily loaded) volume was passed where in-memory data is required.
  #[error("unsupported input kind: {0} volumes are not supported, call compute() before passing the volume")]
  UnsupportedInputKind(String),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("unknown statistic '{name}' (expected one of: {expected})")]
  UnknownStatistic { name: String, expected: String },

  /// The volume violates one of its construction invariants.
  #[error("invalid volume: {0}")]
  InvalidVolume(String),

  #[error("grid mismatch: {0}")]
  GridMismatch(String),

  #[error("failed to build thread pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
