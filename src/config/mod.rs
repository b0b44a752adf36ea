pub mod auth;
pub mod clouds;
pub mod credentials;
pub mod loader;
pub mod settings;
pub mod types;
pub mod validator;
