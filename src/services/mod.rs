pub mod auth_service;
pub mod filter;
pub mod mail_service;
pub mod post_service;
pub mod storage_service;
pub mod user_service;
