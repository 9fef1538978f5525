pub mod environment;
pub mod manager;
pub mod sources;
pub mod validation;

pub use environment::*;
pub use manager::*;
pub use sources::*;
pub use validation::*;
