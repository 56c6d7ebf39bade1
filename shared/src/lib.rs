pub mod client_message;
pub mod constants;
pub mod crypto;
pub mod server_message;
pub mod types;
