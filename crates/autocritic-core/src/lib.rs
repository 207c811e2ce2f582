mod context;
mod error;
mod outcome;
mod runner;

pub use context::{InvocationContext, InvocationSink, ReflectionInput};
pub use error::ReflectError;
pub use outcome::{Correction, Resolution};
pub use runner::ReflectionRunner;
