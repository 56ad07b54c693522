//! Data models

pub mod application;
