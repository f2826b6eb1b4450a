use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of [`Error`], following when the error can happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised while building a component; nothing was created.
    Construction,
    /// Raised at a call site because an argument has the wrong shape; nothing was mutated.
    InputShape,
    /// Raised when reading tensor data back to the host fails.
    Data,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{what} must have the same shape, got {left:?} and {right:?}")]
    ShapeMismatch {
        what: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("invalid action bounds: action_max ({max}) must be greater than action_min ({min})")]
    InvalidActionBounds { min: f32, max: f32 },

    #[error("unbounded actions are not supported (action_min = {min}, action_max = {max})")]
    UnboundedActions { min: f32, max: f32 },

    #[error("capacity ({capacity}) must be a multiple of the write batch size ({batch_size})")]
    CapacityNotDivisible { capacity: usize, batch_size: usize },

    #[error("{0} must not be zero")]
    ZeroSize(&'static str),

    #[error("unable to construct MLP, expected (input size, hidden size, ..., output size), got {0:?}")]
    InvalidLayerSizes(Vec<usize>),

    #[error("{0} optimizer factory must return an optimizer")]
    MissingOptimizer(&'static str),

    #[error("live and target networks have different architectures: {0}")]
    ArchitectureMismatch(String),

    #[error("hyperparameter {name} = {value} is outside of {range}")]
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("{what}: expected {expected}, got {actual}")]
    InputShape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cannot sample from an empty replay buffer")]
    EmptyReplayBuffer,

    #[error("failed to read tensor data: {0}")]
    TensorData(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ShapeMismatch { .. }
            | Error::InvalidActionBounds { .. }
            | Error::UnboundedActions { .. }
            | Error::CapacityNotDivisible { .. }
            | Error::ZeroSize(_)
            | Error::InvalidLayerSizes(_)
            | Error::MissingOptimizer(_)
            | Error::ArchitectureMismatch(_)
            | Error::InvalidHyperparameter { .. } => ErrorKind::Construction,
            Error::InputShape { .. } | Error::EmptyReplayBuffer => ErrorKind::InputShape,
            Error::TensorData(_) => ErrorKind::Data,
        }
    }

    pub fn input_shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::InputShape {
            what,
            expected,
            actual,
        }
    }
}

/// Checks that `value` lies in `(low, high]`, or `[low, high]` when `low_inclusive` is set.
pub fn check_hyperparameter(
    name: &'static str,
    value: f64,
    low: f64,
    high: f64,
    low_inclusive: bool,
    range: &'static str,
) -> Result<()> {
    let above_low = if low_inclusive { value >= low } else { value > low };
    if value.is_finite() && above_low && value <= high {
        Ok(())
    } else {
        Err(Error::InvalidHyperparameter { name, value, range })
    }
}
