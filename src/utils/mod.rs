mod error;

pub use error::{DiagError, Result};
