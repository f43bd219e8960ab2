//! Function registry
//!
//! Holds the functions callers may invoke through `function_call` messages,
//! each described by a name, a description and a typed parameter schema.

mod error;
#[allow(clippy::module_inception)]
mod registry;
mod schema;

pub use error::{RegistryError, RegistryResult};
pub use registry::{FunctionRegistry, RegisteredFunction};
pub use schema::{FunctionDescriptor, ParamType, ParameterSpec};
