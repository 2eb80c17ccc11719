pub mod auth;
pub mod tiktok;
