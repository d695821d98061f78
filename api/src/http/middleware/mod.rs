/// Middleware modules

pub mod logger;
pub mod ratelimit;
pub mod request_id;
