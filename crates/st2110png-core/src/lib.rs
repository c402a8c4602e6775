pub mod assembler;
pub mod capture;
pub mod error;
pub mod frame;
pub mod net;
pub mod pipeline;
pub mod st2110;

#[cfg(test)]
mod test_support;

pub use error::{CaptureError, DecodeError};
