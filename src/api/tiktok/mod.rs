pub mod connect;
pub mod overview;
pub mod post;
pub mod video_detail;
