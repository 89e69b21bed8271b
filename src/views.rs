//! Page rendering.
//!
//! Templates are embedded at compile time and registered once; handlers
//! pass typed view models.

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::Error;

/// Registered template set.
pub struct Views {
    registry: Handlebars<'static>,
}

/// View model for the home page.
#[derive(Serialize)]
pub struct HomeView {
    pub display_name: String,
}

/// View model for the task-list dashboard.
#[derive(Serialize)]
pub struct DashboardView {
    pub hearing_date: String,
    pub show_warning: bool,
    pub groups: Vec<TaskGroupView>,
    pub divorce_case_url: String,
    pub help_email: String,
    pub help_telephone: String,
}

#[derive(Serialize)]
pub struct TaskGroupView {
    pub due_date: String,
    pub tasks: Vec<TaskItemView>,
}

#[derive(Serialize)]
pub struct TaskItemView {
    pub label: String,
    pub status: String,
}

/// View model for the mock IDAM sign-in form.
#[derive(Serialize, Default)]
pub struct MockLoginView {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub email: String,
    pub error: Option<String>,
}

impl Views {
    /// Register all embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if any embedded template fails to parse.
    pub fn new() -> Result<Self, Error> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        let templates = [
            ("home", include_str!("../templates/home.hbs")),
            (
                "task-list-upload-dashboard",
                include_str!("../templates/task-list-upload-dashboard.hbs"),
            ),
            ("error", include_str!("../templates/error.hbs")),
            ("not-found", include_str!("../templates/not-found.hbs")),
            (
                "mock-idam-login",
                include_str!("../templates/mock-idam-login.hbs"),
            ),
        ];
        for (name, source) in templates {
            registry
                .register_template_string(name, source)
                .map_err(|e| Error::Template(format!("template {name}: {e}")))?;
        }

        Ok(Self { registry })
    }

    /// Render a registered template with the given view model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] on render failure.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, Error> {
        self.registry
            .render(name, data)
            .map_err(|e| Error::Template(format!("render {name}: {e}")))
    }
}
