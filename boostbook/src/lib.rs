pub mod encoder;
pub mod post_process;

pub use encoder::BoostBookEncoder;
pub use post_process::{PostProcessError, PostProcessOptions, post_process};

use quickbook::{Compilation, EncodeError};

/// Encode a whole compilation as BoostBook XML.
pub fn to_boostbook(compilation: &Compilation) -> Result<String, EncodeError> {
    let mut encoder = BoostBookEncoder::new();
    compilation.encode(&mut encoder)?;
    Ok(encoder.into_string())
}
