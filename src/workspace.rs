use std::collections::BTreeMap;

use crate::config::WorkspaceTemplate;

/// Environment variables available to a build.
pub type Environment = BTreeMap<String, String>;

/// A client workspace expanded for one build.
#[derive(Debug, Clone)]
pub struct Workspace {
    name: String,
    label: Option<String>,
    env: Environment,
}

impl Workspace {
    /// Expands the template against the given environment.
    pub fn load(template: &WorkspaceTemplate, env: &Environment) -> Self {
        Self {
            name: expand(&template.name, env),
            label: None,
            env: env.clone(),
        }
    }

    /// The expanded client name.
    pub fn full_name(&self) -> &str {
        &self.name
    }

    /// Substitutes `${VAR}` placeholders. Unknown variables are left in place.
    pub fn expand(&self, value: &str) -> String {
        expand(value, &self.env)
    }

    /// Sets the label or change this workspace should be synced to, expanding
    /// it first.
    pub fn set_label(&mut self, label: &str) {
        self.label = Some(self.expand(label));
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

fn expand(value: &str, env: &Environment) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match env.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}
