//! Pipeline-facing reflection of one emitted entry point
//!
//! Describes what a pipeline needs to bind without parsing the binary:
//! specialization constant IDs by name, the stage interface and the
//! descriptor bindings.

use super::collector::Collection;
use super::id_assign::IdMap;
use super::ir::{DecorationEntry, EntryPointInfo, Library, OpId};
use super::ShaderStage;
use crate::error::{Error, Result};
use rspirv::spirv::{BuiltIn, Decoration, StorageClass};
use serde::Serialize;
use std::collections::BTreeMap;

/// One `Input` or `Output` variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceVariable {
    /// Field name
    pub name: String,
    /// `Location` decoration, absent for built-ins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<u32>,
    /// Built-in name (`Position`, `FragCoord`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin: Option<String>,
    /// Source type name (`Float4`, ...)
    #[serde(rename = "type")]
    pub type_name: String,
}

/// One descriptor-bound resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceBinding {
    /// Field name
    pub name: String,
    /// `Uniform`, `StorageBuffer` or `UniformConstant`
    pub storage: String,
    /// Descriptor set
    pub set: u32,
    /// Binding within the set
    pub binding: u32,
    /// Source type name
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Reflection of one stage binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderStageReflection {
    /// Owning struct of the entry function
    pub name: String,
    /// Pipeline stage
    pub stage: ShaderStage,
    /// Compute workgroup size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_size: Option<[u32; 3]>,
    /// Specialization constant name to `SpecId`; composites report their
    /// first scalar leaf
    pub spec_constants: BTreeMap<String, u32>,
    /// Stage inputs
    pub inputs: Vec<InterfaceVariable>,
    /// Stage outputs
    pub outputs: Vec<InterfaceVariable>,
    /// Uniform, storage and image/sampler bindings
    pub bindings: Vec<ResourceBinding>,
}

fn decoration_value(decorations: &[DecorationEntry], decoration: Decoration) -> Option<u32> {
    decorations
        .iter()
        .find(|d| d.decoration == decoration)
        .and_then(|d| d.operands.first().copied())
}

impl ShaderStageReflection {
    /// Reflect one collected, ID-assigned entry point
    pub fn build(
        lib: &Library,
        entry: &EntryPointInfo,
        collection: &Collection,
        ids: &IdMap,
    ) -> Self {
        let mut spec_constants = BTreeMap::new();
        for decl in lib.spec_constant_decls() {
            if let Some(spec_id) = ids.first_leaf_spec_id(lib, decl.op) {
                spec_constants.insert(decl.name.clone(), spec_id);
            }
        }

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for &global in &entry.interface {
            let Some(variable) = Self::interface_variable(lib, global) else {
                continue;
            };
            match lib.storage_of(global) {
                Some(StorageClass::Input) => inputs.push(variable),
                Some(StorageClass::Output) => outputs.push(variable),
                _ => {}
            }
        }

        let mut bindings = Vec::new();
        for &global in &collection.globals {
            let Some(variable) = lib.global_for_op(global) else {
                continue;
            };
            if !matches!(
                variable.storage,
                StorageClass::Uniform | StorageClass::StorageBuffer | StorageClass::UniformConstant
            ) {
                continue;
            }
            let (Some(set), Some(binding)) = (
                decoration_value(&variable.decorations, Decoration::DescriptorSet),
                decoration_value(&variable.decorations, Decoration::Binding),
            ) else {
                continue;
            };
            bindings.push(ResourceBinding {
                name: variable.name.clone(),
                storage: format!("{:?}", variable.storage),
                set,
                binding,
                type_name: variable.source_type.to_string(),
            });
        }

        Self {
            name: entry.owner.clone(),
            stage: entry.stage,
            local_size: entry.local_size,
            spec_constants,
            inputs,
            outputs,
            bindings,
        }
    }

    fn interface_variable(lib: &Library, global: OpId) -> Option<InterfaceVariable> {
        let variable = lib.global_for_op(global)?;
        let builtin = decoration_value(&variable.decorations, Decoration::BuiltIn)
            .and_then(BuiltIn::from_u32)
            .map(|b| format!("{:?}", b));
        Some(InterfaceVariable {
            name: variable.name.clone(),
            location: decoration_value(&variable.decorations, Decoration::Location),
            builtin,
            type_name: variable.source_type.to_string(),
        })
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::compiler(format!("Failed to serialize reflection: {}", e)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoration_value_lookup() {
        let decorations = vec![
            DecorationEntry::with(Decoration::DescriptorSet, 0),
            DecorationEntry::with(Decoration::Binding, 3),
        ];
        assert_eq!(decoration_value(&decorations, Decoration::Binding), Some(3));
        assert_eq!(decoration_value(&decorations, Decoration::Location), None);
    }

    #[test]
    fn test_json_shape() {
        let reflection = ShaderStageReflection {
            name: "Blur".into(),
            stage: ShaderStage::Compute,
            local_size: Some([8, 8, 1]),
            spec_constants: BTreeMap::from([("Blur.Radius".to_string(), 1)]),
            inputs: vec![],
            outputs: vec![],
            bindings: vec![],
        };
        let json: serde_json::Value =
            serde_json::from_str(&reflection.to_json().unwrap()).unwrap();
        assert_eq!(json["stage"], "Compute");
        assert_eq!(json["local_size"][0], 8);
        assert_eq!(json["spec_constants"]["Blur.Radius"], 1);
    }
}
