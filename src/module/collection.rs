//! Component collection handed to [`Module::get_module_metadata`]
//!
//! [`Module::get_module_metadata`]: crate::module::traits::Module::get_module_metadata

use crate::module::traits::{ComponentInfo, ModuleError};

#[derive(Debug, Default)]
pub struct ComponentCollection {
    components: Vec<ComponentInfo>,
}

impl ComponentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component; names must be non-blank and unique within the collection
    pub fn register(&mut self, component: ComponentInfo) -> Result<&mut Self, ModuleError> {
        if component.name.trim().is_empty() {
            return Err(ModuleError::InvalidArgument(
                "component name must be provided (non-empty/whitespaces)".to_string(),
            ));
        }
        if self.components.iter().any(|c| c.name == component.name) {
            return Err(ModuleError::DuplicateComponent(component.name));
        }
        self.components.push(component);
        Ok(self)
    }

    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn into_components(self) -> Vec<ComponentInfo> {
        self.components
    }
}
