//! Plugin namespaces
//!
//! A call may name the plugin, or `plugin/module`, whose registry defines its
//! type. Calls without a namespace use the root registry.

use crate::error::{InvokerError, Result};
use crate::registry::{TypeDescriptor, TypeRegistry};
use dashmap::DashMap;
use std::sync::Arc;

/// Maps an optional namespace id to the registry that defines its types
pub trait ModuleResolver: Send + Sync {
    fn registry_for(&self, plugin_id: Option<&str>) -> Result<Arc<TypeRegistry>>;

    fn resolve_type(
        &self,
        plugin_id: Option<&str>,
        type_name: &str,
    ) -> Result<(Arc<TypeRegistry>, Arc<TypeDescriptor>)> {
        let registry = self.registry_for(plugin_id)?;
        let descriptor = registry.get(type_name).ok_or_else(|| match plugin_id {
            Some(plugin) => {
                InvokerError::resolution(format!("No such type {} in plugin {}", type_name, plugin))
            }
            None => InvokerError::resolution(format!("No such type {}", type_name)),
        })?;
        Ok((registry, descriptor))
    }
}

#[derive(Debug)]
struct Plugin {
    registry: Arc<TypeRegistry>,
    modules: DashMap<String, Arc<TypeRegistry>>,
}

/// Default in-memory plugin table
#[derive(Debug)]
pub struct PluginModules {
    root: Arc<TypeRegistry>,
    plugins: DashMap<String, Plugin>,
}

impl PluginModules {
    pub fn new(root: Arc<TypeRegistry>) -> Self {
        Self {
            root,
            plugins: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Arc<TypeRegistry> {
        &self.root
    }

    pub fn add_plugin(&self, plugin_id: impl Into<String>, registry: TypeRegistry) {
        let plugin_id = plugin_id.into();
        tracing::debug!(plugin_id = %plugin_id, types = registry.len(), "Adding plugin");
        self.plugins.insert(
            plugin_id,
            Plugin {
                registry: Arc::new(registry),
                modules: DashMap::new(),
            },
        );
    }

    /// Attach a content module to an already added plugin
    pub fn add_module(
        &self,
        plugin_id: &str,
        module_name: impl Into<String>,
        registry: TypeRegistry,
    ) -> Result<()> {
        let plugin = self
            .plugins
            .get(plugin_id)
            .ok_or_else(|| InvokerError::resolution(format!("No such plugin {}", plugin_id)))?;
        plugin.modules.insert(module_name.into(), Arc::new(registry));
        Ok(())
    }
}

impl ModuleResolver for PluginModules {
    fn registry_for(&self, plugin_id: Option<&str>) -> Result<Arc<TypeRegistry>> {
        let Some(plugin_id) = plugin_id else {
            return Ok(Arc::clone(&self.root));
        };

        let (plugin_name, module_name) = match plugin_id.split_once('/') {
            Some((plugin, module)) => (plugin, Some(module)),
            None => (plugin_id, None),
        };

        let plugin = self
            .plugins
            .get(plugin_name)
            .ok_or_else(|| InvokerError::resolution(format!("No such plugin {}", plugin_name)))?;

        match module_name {
            None => Ok(Arc::clone(&plugin.registry)),
            Some(module) => plugin
                .modules
                .get(module)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| {
                    InvokerError::resolution(format!("No such plugin module {}", plugin_id))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(type_name: &str) -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(TypeDescriptor::builder(type_name).build());
        registry
    }

    fn modules() -> PluginModules {
        let modules = PluginModules::new(Arc::new(registry_with("core.Application")));
        modules.add_plugin("vcs", registry_with("vcs.Repository"));
        modules
            .add_module("vcs", "git", registry_with("git.Branch"))
            .unwrap();
        modules
    }

    #[test]
    fn test_root_registry_without_namespace() {
        let (_, descriptor) = modules().resolve_type(None, "core.Application").unwrap();
        assert_eq!(descriptor.name(), "core.Application");
    }

    #[test]
    fn test_nested_module_lookup() {
        let modules = modules();
        assert!(modules.resolve_type(Some("vcs"), "vcs.Repository").is_ok());
        assert!(modules.resolve_type(Some("vcs/git"), "git.Branch").is_ok());
        assert!(modules.resolve_type(Some("vcs"), "git.Branch").is_err());
    }

    #[test]
    fn test_unknown_namespace_messages() {
        let modules = modules();
        let err = modules.registry_for(Some("missing")).unwrap_err();
        assert_eq!(err.to_string(), "No such plugin missing");

        let err = modules.registry_for(Some("vcs/hg")).unwrap_err();
        assert_eq!(err.to_string(), "No such plugin module vcs/hg");

        let err = modules.resolve_type(Some("vcs"), "vcs.Missing").unwrap_err();
        assert_eq!(err.category(), "resolution");
        assert_eq!(err.to_string(), "No such type vcs.Missing in plugin vcs");
    }

    #[test]
    fn test_module_requires_plugin() {
        let modules = PluginModules::new(Arc::new(TypeRegistry::new()));
        assert!(modules.add_module("ghost", "m", TypeRegistry::new()).is_err());
    }
}
