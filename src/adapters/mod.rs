pub mod api;
pub mod niu_http;
