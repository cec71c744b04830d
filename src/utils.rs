pub mod confirmation_code;
pub mod token;
