//! Shader resource reflection data
//!
//! Backends fill this in from a compiled binary; the header emitter turns it
//! into per-class name/binding/count/space arrays.

use std::collections::BTreeMap;

/// Resource classes in the order they appear in generated headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClass {
    ConstantBuffer,
    TextureSrv,
    BufferSrv,
    TextureUav,
    BufferUav,
    Sampler,
    AccelerationStructure,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 7] = [
        ResourceClass::ConstantBuffer,
        ResourceClass::TextureSrv,
        ResourceClass::BufferSrv,
        ResourceClass::TextureUav,
        ResourceClass::BufferUav,
        ResourceClass::Sampler,
        ResourceClass::AccelerationStructure,
    ];

    /// Infix of the `g_<perm>_<infix>Resource*` arrays and the matching
    /// `PermutationInfo` members
    pub fn array_infix(self) -> &'static str {
        match self {
            ResourceClass::ConstantBuffer => "CBV",
            ResourceClass::TextureSrv => "TextureSRV",
            ResourceClass::BufferSrv => "BufferSRV",
            ResourceClass::TextureUav => "TextureUAV",
            ResourceClass::BufferUav => "BufferUAV",
            ResourceClass::Sampler => "Sampler",
            ResourceClass::AccelerationStructure => "RTAccelerationStructure",
        }
    }
}

/// One bound resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResource {
    pub name: String,
    pub binding: u32,
    pub count: u32,
    pub space: u32,
}

impl ShaderResource {
    pub fn new(name: impl Into<String>, binding: u32, count: u32, space: u32) -> Self {
        Self {
            name: name.into(),
            binding,
            count,
            space,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionData {
    resources: BTreeMap<ResourceClass, Vec<ShaderResource>>,
}

impl ReflectionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, keeping each class sorted by (space, binding)
    pub fn add(&mut self, class: ResourceClass, resource: ShaderResource) {
        let list = self.resources.entry(class).or_default();
        let at = list
            .iter()
            .position(|r| (r.space, r.binding) > (resource.space, resource.binding))
            .unwrap_or(list.len());
        list.insert(at, resource);
    }

    pub fn resources(&self, class: ResourceClass) -> &[ShaderResource] {
        self.resources.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.resources.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_sorted_by_space_then_binding() {
        let mut data = ReflectionData::new();
        data.add(ResourceClass::TextureSrv, ShaderResource::new("b", 1, 1, 0));
        data.add(ResourceClass::TextureSrv, ShaderResource::new("c", 0, 1, 1));
        data.add(ResourceClass::TextureSrv, ShaderResource::new("a", 0, 1, 0));

        let names: Vec<&str> = data
            .resources(ResourceClass::TextureSrv)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(data.total(), 3);
    }

    #[test]
    fn test_empty_class_lookup() {
        let data = ReflectionData::new();
        assert!(data.is_empty());
        assert!(data.resources(ResourceClass::Sampler).is_empty());
    }
}
