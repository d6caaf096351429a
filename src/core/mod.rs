pub mod error;
pub mod value;

pub use error::{RepoError, Result};
pub use value::{Record, Value};
