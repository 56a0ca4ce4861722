use std::fmt::Display;

use thiserror::Error;

/// Boxed error type used to carry backend failures through [`FftError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while planning, generating, building or replaying a transform.
///
/// Build and launch failures are never retried: a build failure means the generator emitted something the device
/// compiler rejected, and a launch failure is passed through unchanged along with the description of the stage.
#[derive(Error, Debug)]
pub enum FftError {
    /// A transform of length zero was requested
    #[error("FFT length must be at least 1")]
    ZeroLength,

    /// A radix stage was requested for a size the small-DFT library does not cover
    #[error("radix {0} is not covered by the small-DFT library")]
    UnsupportedRadix(usize),

    /// The planner configuration is inconsistent
    #[error("invalid planner configuration: {0}")]
    InvalidConfig(String),

    /// A kernel was bound to the wrong number of arguments
    #[error("kernel '{kernel}' declares {expected} parameters, but {got} arguments were supplied")]
    ArgumentCount {
        /// Entry point name
        kernel: String,
        /// Number of declared parameters
        expected: usize,
        /// Number of supplied arguments
        got: usize,
    },

    /// A kernel argument does not match the kind of its declared parameter
    #[error("kernel '{kernel}' parameter {index} ('{name}') expects {expected}, got {got}")]
    ArgumentMismatch {
        /// Entry point name
        kernel: String,
        /// Position of the offending argument
        index: usize,
        /// Declared parameter name
        name: String,
        /// Expected kind
        expected: &'static str,
        /// Supplied kind
        got: &'static str,
    },

    /// A size or stride does not fit in an unsigned 32-bit kernel argument
    #[error("value {value} for '{name}' does not fit in a 32-bit kernel argument")]
    ValueOutOfRange {
        /// What the value describes
        name: &'static str,
        /// The offending value
        value: usize,
    },

    /// Global and local extents are inconsistent
    #[error("invalid launch geometry: {0}")]
    InvalidGeometry(String),

    /// The caller did not supply a buffer that the strategy requires
    #[error("the plan requires a {0} buffer, but none was supplied")]
    MissingBuffer(&'static str),

    /// The backend compiler rejected a generated compilation unit
    #[error("failed to build kernel '{kernel}':\n{log}")]
    Build {
        /// Entry point of the rejected unit
        kernel: String,
        /// Diagnostic text reported by the backend
        log: String,
    },

    /// Any other backend failure outside of building and launching
    #[error("backend error while {context}: {source}")]
    Backend {
        /// What the planner was doing
        context: String,
        /// The backend's error
        #[source]
        source: BoxError,
    },

    /// The backend failed to enqueue a stage
    #[error("failed to launch {stage}: {source}")]
    Launch {
        /// Human-readable description of the stage
        stage: String,
        /// The backend's error
        #[source]
        source: BoxError,
    },
}

impl FftError {
    pub(crate) fn backend<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// One butterfly stage's fan-in size, stored as `value = base^exponent`.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub struct Radix {
    /// The prime (or, for Bluestein stages, the unfactored cofactor) this radix is a power of
    pub base: usize,
    /// How many times `base` was folded into this stage
    pub exponent: u32,
    /// `base^exponent`, the size of the small DFT computed by the stage
    pub value: usize,
}
impl Radix {
    /// Creates a radix of `base^exponent`
    pub fn new(base: usize, exponent: u32) -> Self {
        Self {
            base,
            exponent,
            value: base.pow(exponent),
        }
    }
}
impl Display for Radix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        if self.exponent != 1 {
            write!(f, "^{}", self.exponent)?;
        }
        Ok(())
    }
}

/// Converts a host size into an unsigned 32-bit kernel argument
pub(crate) fn to_u32(name: &'static str, value: usize) -> Result<u32, FftError> {
    u32::try_from(value).map_err(|_| FftError::ValueOutOfRange { name, value })
}
