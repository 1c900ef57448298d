//! SPIR-V resource reflection via naga
//!
//! Descriptor set maps to space and binding to binding. Binding arrays
//! report their element count; unbounded arrays report 0.

use naga::front::spv;
use naga::{AddressSpace, ArraySize, GlobalVariable, ImageClass, Module, StorageAccess, TypeInner};
use permutator_core::{ReflectionData, ResourceClass, ShaderResource};

use crate::error::BackendError;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Whether `binary` starts with the SPIR-V magic number, in either byte order
pub fn is_spirv(binary: &[u8]) -> bool {
    binary.len() >= 4
        && (binary[..4] == SPIRV_MAGIC.to_le_bytes() || binary[..4] == SPIRV_MAGIC.to_be_bytes())
}

pub fn reflect_spirv(binary: &[u8]) -> Result<ReflectionData, BackendError> {
    let module = spv::parse_u8_slice(binary, &spv::Options::default())
        .map_err(|e| BackendError::Reflection(e.to_string()))?;

    let mut data = ReflectionData::new();
    for (_, variable) in module.global_variables.iter() {
        let Some(binding) = &variable.binding else {
            continue;
        };
        let Some((class, count)) = classify(&module, variable) else {
            log::trace!("Skipping global {:?} in space {:?}", variable.name, variable.space);
            continue;
        };
        let name = variable
            .name
            .clone()
            .unwrap_or_else(|| format!("unnamed_s{}_b{}", binding.group, binding.binding));
        data.add(class, ShaderResource::new(name, binding.binding, count, binding.group));
    }
    log::trace!("Reflected {} resource(s)", data.total());
    Ok(data)
}

fn classify(module: &Module, variable: &GlobalVariable) -> Option<(ResourceClass, u32)> {
    let (inner, count) = match &module.types[variable.ty].inner {
        TypeInner::BindingArray { base, size } => {
            let count = match size {
                ArraySize::Constant(n) => n.get(),
                _ => 0,
            };
            (&module.types[*base].inner, count)
        }
        inner => (inner, 1),
    };

    let class = match variable.space {
        AddressSpace::Uniform => ResourceClass::ConstantBuffer,
        AddressSpace::Storage { access } if access.contains(StorageAccess::STORE) => {
            ResourceClass::BufferUav
        }
        AddressSpace::Storage { .. } => ResourceClass::BufferSrv,
        AddressSpace::Handle => match inner {
            TypeInner::Image {
                class: ImageClass::Storage { .. },
                ..
            } => ResourceClass::TextureUav,
            TypeInner::Image { .. } => ResourceClass::TextureSrv,
            TypeInner::Sampler { .. } => ResourceClass::Sampler,
            TypeInner::AccelerationStructure { .. } => ResourceClass::AccelerationStructure,
            _ => return None,
        },
        _ => return None,
    };
    Some((class, count))
}
