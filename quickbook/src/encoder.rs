use thiserror::Error;

use crate::event::Event;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unbalanced event stream: {0}")]
    Unbalanced(String),
    #[error("unsupported event: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Consumer of the compiler's event stream.
pub trait Encoder {
    fn emit(&mut self, event: Event) -> Result<(), EncodeError>;

    /// Called once after the last event.
    fn finish(&mut self) -> Result<(), EncodeError> {
        Ok(())
    }
}

/// Collects events unchanged; handy for tests and `--events`.
impl Encoder for Vec<Event> {
    fn emit(&mut self, event: Event) -> Result<(), EncodeError> {
        self.push(event);
        Ok(())
    }
}
