pub mod email_filter;
pub mod request_cache;
pub mod seed;
