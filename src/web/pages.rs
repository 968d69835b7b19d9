//! HTML pages rendered with Handlebars from templates embedded at build time.

use handlebars::Handlebars;
use serde_json::{json, Value};

use crate::auth::UserSession;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.hbs");
const LOGIN_TEMPLATE: &str = include_str!("../../templates/login.hbs");
const AUTH_ERROR_TEMPLATE: &str = include_str!("../../templates/auth_error.hbs");

/// Page renderer. Every page receives `company_url`.
#[derive(Debug)]
pub struct Pages {
    registry: Handlebars<'static>,
    company_url: String,
}

impl Pages {
    /// Register the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to parse.
    pub fn new(company_url: &str) -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        for (name, source) in [
            ("index", INDEX_TEMPLATE),
            ("login", LOGIN_TEMPLATE),
            ("auth_error", AUTH_ERROR_TEMPLATE),
        ] {
            registry
                .register_template_string(name, source)
                .map_err(|e| anyhow::anyhow!("failed to register template {name}: {e}"))?;
        }
        Ok(Self {
            registry,
            company_url: company_url.to_owned(),
        })
    }

    fn render(&self, name: &str, mut data: Value) -> Result<String, handlebars::RenderError> {
        if let Value::Object(map) = &mut data {
            map.insert(
                "company_url".to_owned(),
                Value::String(self.company_url.clone()),
            );
        }
        self.registry.render(name, &data)
    }

    /// Chat page for a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns a render error from Handlebars.
    pub fn index(&self, user: &UserSession) -> Result<String, handlebars::RenderError> {
        self.render("index", json!({ "user": user }))
    }

    /// Login page linking to the provider.
    ///
    /// # Errors
    ///
    /// Returns a render error from Handlebars.
    pub fn login(&self, auth_url: &str) -> Result<String, handlebars::RenderError> {
        self.render("login", json!({ "auth_url": auth_url }))
    }

    /// Sign-in failure page.
    ///
    /// # Errors
    ///
    /// Returns a render error from Handlebars.
    pub fn auth_error(
        &self,
        error: &str,
        description: &str,
    ) -> Result<String, handlebars::RenderError> {
        self.render(
            "auth_error",
            json!({ "result": { "error": error, "error_description": description } }),
        )
    }
}
