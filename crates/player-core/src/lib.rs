pub mod channel;
pub mod config;
pub mod controller;
pub mod media;
pub mod pipeline;
pub mod source;
pub mod status;
