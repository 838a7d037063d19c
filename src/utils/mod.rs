pub mod jwt;
pub mod validation;

pub use jwt::*;
pub use validation::*;
