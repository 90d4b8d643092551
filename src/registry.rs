//! Template registry - the immutable catalog of gadget identity templates.

use std::collections::HashMap;

use crate::error::{LookupError, RegistrationError};
use crate::profile::ProfileConfig;

/// An immutable, named identity template.
///
/// Once registered its fields never change; switching to it always produces
/// the same gadget identity.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    config: ProfileConfig,
}

impl Template {
    pub fn new(name: impl Into<String>, config: ProfileConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }
}

/// Catalog of available identity templates, keyed by unique name.
///
/// Populated once at startup before the registry is shared; lookups are
/// read-only afterwards and need no locking. Enumeration preserves
/// registration order so diagnostics stay stable across runs.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
    order: Vec<String>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Rejects empty names, duplicates, and
    /// configurations that fail kind-specific validation.
    pub fn register(&mut self, template: Template) -> Result<(), RegistrationError> {
        if template.name().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.templates.contains_key(template.name()) {
            return Err(RegistrationError::DuplicateName(template.name().to_string()));
        }
        if let Err(reason) = template.config().validate() {
            return Err(RegistrationError::InvalidConfig {
                name: template.name().to_string(),
                reason,
            });
        }

        self.order.push(template.name().to_string());
        self.templates.insert(template.name().to_string(), template);
        Ok(())
    }

    /// Resolve a template by name.
    pub fn resolve(&self, name: &str) -> Result<&Template, LookupError> {
        self.templates
            .get(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    /// All registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{MassStorageConfig, NetworkConfig, ProfileConfig};

    fn storage_template(name: &str) -> Template {
        Template::new(
            name,
            ProfileConfig::MassStorage(MassStorageConfig {
                image: "/var/lib/gadgetswitch/disk.img".into(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = TemplateRegistry::new();
        registry.register(storage_template("storage")).unwrap();

        let template = registry.resolve("storage").unwrap();
        assert_eq!(template.name(), "storage");
    }

    #[test]
    fn resolve_missing_is_not_found() {
        let registry = TemplateRegistry::new();
        assert!(matches!(
            registry.resolve("bogus"),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = TemplateRegistry::new();
        registry.register(storage_template("storage")).unwrap();

        let err = registry.register(storage_template("storage")).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateName(name) if name == "storage"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        let mut registry = TemplateRegistry::new();
        assert!(matches!(
            registry.register(storage_template("")),
            Err(RegistrationError::EmptyName)
        ));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut registry = TemplateRegistry::new();
        let template = Template::new(
            "net",
            ProfileConfig::Network(NetworkConfig {
                dev_addr: Some("not-a-mac".into()),
                ..Default::default()
            }),
        );
        let err = registry.register(template).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidConfig { name, .. } if name == "net"));
        assert!(registry.is_empty());
    }

    #[test]
    fn names_preserve_registration_order() {
        let mut registry = TemplateRegistry::new();
        for name in ["storage", "network", "serial"] {
            registry.register(storage_template(name)).unwrap();
        }
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["storage", "network", "serial"]);
    }
}
