// src/handlers/mod.rs

pub mod auth;
pub mod comments;
pub mod enrichment;
pub mod moderation;
pub mod translate;
pub mod videos;
