pub mod generation;
pub mod validator;
