mod admin;
mod commands;
mod queries;
mod service;
mod views;

pub use service::CommentService;
