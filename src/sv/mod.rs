pub mod keys;
pub mod validator;

pub use keys::Keys;
pub use validator::Validator;
