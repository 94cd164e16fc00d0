pub mod link_service;
pub mod short_code;
