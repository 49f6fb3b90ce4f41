pub mod http;
pub mod retry;
pub mod text;
