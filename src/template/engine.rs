// ABOUTME: Template engine implementation using Handlebars
// ABOUTME: Renders hopfile variables and step fields (command, dir, env) before execution

use handlebars::Handlebars;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::context::TemplateContext;
use super::error::{Result, TemplateError};
use crate::parser::Step;

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        // A missing variable in a shell command is a hopfile defect, not an empty string
        handlebars.set_strict_mode(true);
        handlebars.set_dev_mode(false);

        // Output is shell text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template string with JSON context
    pub fn render_with_json(&self, template: &str, context: &JsonValue) -> Result<String> {
        if !Self::has_templates(template) {
            return Ok(template.to_string());
        }
        self.handlebars
            .render_template(template, context)
            .map_err(TemplateError::HandlebarsError)
    }

    /// Render a template string with the given context
    pub fn render(&self, template: &str, context: &TemplateContext) -> Result<String> {
        self.render_with_json(template, &context.to_json()?)
    }

    /// Resolve hopfile variables against a context built from their raw values.
    /// One pass: a variable may refer to another variable's unrendered value.
    pub fn resolve_variables(
        &self,
        variables: &IndexMap<String, String>,
        context: &TemplateContext,
    ) -> Result<IndexMap<String, String>> {
        let json_context = context.to_json()?;
        variables
            .iter()
            .map(|(key, value)| {
                self.render_field(&format!("variables.{}", key), value, &json_context)
                    .map(|rendered| (key.clone(), rendered))
            })
            .collect()
    }

    /// Render every templated field of a step
    pub fn render_step(&self, step: &Step, context: &JsonValue) -> Result<Step> {
        let mut rendered = step.clone();
        rendered.command = self.render_field(step.kind.as_str(), &step.command, context)?;

        if let Some(ref dir) = step.working_dir {
            rendered.working_dir = Some(self.render_field("dir", dir, context)?);
        }

        rendered.env = step
            .env
            .iter()
            .map(|(key, value)| {
                self.render_field(&format!("env.{}", key), value, context)
                    .map(|v| (key.clone(), v))
            })
            .collect::<Result<_>>()?;

        Ok(rendered)
    }

    fn render_field(&self, field: &str, template: &str, context: &JsonValue) -> Result<String> {
        self.render_with_json(template, context)
            .map_err(|e| TemplateError::RenderError {
                field: field.to_string(),
                message: e.to_string(),
            })
    }

    /// Validate template syntax without rendering
    pub fn check_syntax(template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }

    /// Check if a string contains template expressions
    pub fn has_templates(text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Target;

    fn context() -> TemplateContext {
        let mut variables = IndexMap::new();
        variables.insert("code_dir".to_string(), "~/6.824".to_string());
        variables.insert("pkg".to_string(), "paxos".to_string());
        TemplateContext::new(variables)
            .with_target(Some(&Target::new("example.edu", "u")))
            .with_run("run-1", "deploy")
    }

    #[test]
    fn test_basic_template_rendering() {
        let engine = TemplateEngine::new();
        let result = engine
            .render("cd {{variables.code_dir}} && whoami # {{target.user}}", &context())
            .unwrap();
        assert_eq!(result, "cd ~/6.824 && whoami # u");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = TemplateEngine::new();
        let mut ctx = context();
        ctx.set_variable("cmd".to_string(), "a && b > 'c'".to_string());
        let result = engine.render("{{variables.cmd}}", &ctx).unwrap();
        assert_eq!(result, "a && b > 'c'");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let engine = TemplateEngine::new();
        assert!(engine.render("{{variables.nope}}", &context()).is_err());
    }

    #[test]
    fn test_render_step_fields() {
        let engine = TemplateEngine::new();
        let step = Step::remote("go test ./{{variables.pkg}}")
            .in_dir("{{variables.code_dir}}/src")
            .with_env("GOPATH", "$HOME/{{run.task}}");

        let rendered = engine
            .render_step(&step, &context().to_json().unwrap())
            .unwrap();

        assert_eq!(rendered.command, "go test ./paxos");
        assert_eq!(rendered.working_dir.as_deref(), Some("~/6.824/src"));
        assert_eq!(rendered.env.get("GOPATH").map(String::as_str), Some("$HOME/deploy"));
        assert_eq!(rendered.kind, step.kind);
    }

    #[test]
    fn test_resolve_variables() {
        let engine = TemplateEngine::new();
        let mut ctx = context();
        ctx.set_variable("src".to_string(), "{{variables.code_dir}}/src".to_string());

        let resolved = engine.resolve_variables(&ctx.variables, &ctx).unwrap();
        assert_eq!(resolved.get("src").map(String::as_str), Some("~/6.824/src"));
    }

    #[test]
    fn test_check_syntax() {
        assert!(TemplateEngine::check_syntax("plain text").is_ok());
        assert!(TemplateEngine::check_syntax("{{variables.x}}").is_ok());
        assert!(TemplateEngine::check_syntax("{{variables.x").is_err());
    }
}
