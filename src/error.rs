use thiserror::Error;

/// Errors surfaced by the core to callers.
///
/// Validation errors are raised before any wire activity and have no side
/// effects. Transport and driver errors may occur after a lock has been
/// taken; callers do not need to release it themselves, it is dropped by
/// the RAII guard regardless of which branch returns.
#[derive(Debug, Error)]
pub enum ScError {
    /// APDU validation failure, a malformed path, or oversized input.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The driver or reader does not implement the requested operation.
    #[error("operation not supported")]
    NotSupported,

    /// No slot matches the requested id.
    #[error("slot not found")]
    SlotNotFound,

    /// A bounded-capacity structure would need to grow past its static
    /// bound. The Rust analogue of the source's allocator-failure checks.
    #[error("out of memory")]
    OutOfMemory,

    /// No driver matched the inserted card's ATR, or a driver's `init`
    /// rejected the card.
    #[error("invalid or unrecognized card")]
    InvalidCard,

    /// A reader-callback failure. Opaque from the core's point of view.
    #[error("reader transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// A non-success status word, classified by the driver's `check_sw`.
    #[error("card returned SW={sw1:02X}{sw2:02X}: {source}")]
    DriverStatus {
        /// First status-word byte.
        sw1: u8,
        /// Second status-word byte.
        sw2: u8,
        /// The driver-specific classification of the status word.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A transport whose I/O is naturally expressed with `std::io::Error`
    /// (serial, USB-HID, ...) surfaced one.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScError {
    /// Build an [`ScError::InvalidArguments`] from a static description.
    pub fn invalid(msg: impl Into<String>) -> Self {
        ScError::InvalidArguments(msg.into())
    }

    /// Wrap an opaque transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ScError::Transport(Box::new(err))
    }
}
