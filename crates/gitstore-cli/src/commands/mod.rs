//! Command handlers

pub mod bag;
pub mod config;
pub mod tiddler;
