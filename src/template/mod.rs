// ABOUTME: Template engine module for hopfile placeholders
// ABOUTME: Renders {{variables.*}}, {{target.*}} and {{env.*}} inside step commands

pub mod context;
pub mod engine;
pub mod error;

pub use context::{RunInfo, TemplateContext};
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
