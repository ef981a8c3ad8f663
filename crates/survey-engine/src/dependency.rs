//! Extraction of the dependent/dependency graph from instruction texts.
//!
//! Matching is textual: an instruction depends on every `Code.slot` key that occurs as a
//! substring of its text. This over-approximates, which downstream passes rely on.
use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{EngineError, Result};
use crate::model::{
    ChildlessComponent, Dependency, DependencyMap, Dependent, ImpactMap, Instruction, StringImpactMap,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyMapper {
    dependency_map: DependencyMap,
    impact_map: ImpactMap,
}

impl DependencyMapper {
    /// Builds both maps from flattened components in document order.
    pub fn new(components: &[ChildlessComponent]) -> Self {
        let keys = components
            .iter()
            .flat_map(|component| {
                component
                    .instruction_list
                    .iter()
                    .filter_map(|instruction| instruction.dependency(&component.code))
            })
            .map(|dependency| {
                let key = dependency.to_value_key();
                (dependency, key)
            })
            .collect::<Vec<_>>();

        let mut dependency_map = DependencyMap::default();
        for component in components {
            for instruction in &component.instruction_list {
                if !is_dependent(instruction) {
                    continue;
                }
                let Some(text) = instruction.text() else {
                    continue;
                };
                let dependencies = keys
                    .iter()
                    .filter(|(_, key)| text.contains(key.as_str()))
                    .map(|(dependency, _)| dependency.clone())
                    .unique()
                    .collect::<Vec<_>>();
                if !dependencies.is_empty() {
                    dependency_map
                        .entry(Dependent::new(component.code.clone(), instruction.code()))
                        .or_insert(dependencies);
                }
            }
        }

        tracing::trace!(dependents = dependency_map.len(), "dependency map built");
        Self {
            impact_map: to_impact_map(&dependency_map),
            dependency_map,
        }
    }

    pub fn from_dependency_map(dependency_map: DependencyMap) -> Self {
        Self {
            impact_map: to_impact_map(&dependency_map),
            dependency_map,
        }
    }

    pub fn from_string_impact_map(map: &StringImpactMap) -> Result<Self> {
        let impact_map = from_string_impact_map(map)?;
        Ok(Self {
            dependency_map: to_dependency_map(&impact_map),
            impact_map,
        })
    }

    pub fn dependency_map(&self) -> &DependencyMap {
        &self.dependency_map
    }

    pub fn impact_map(&self) -> &ImpactMap {
        &self.impact_map
    }

    pub fn dependencies(&self, dependent: &Dependent) -> &[Dependency] {
        self.dependency_map.get(dependent).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Active states and references are computed from script and can therefore depend on slots.
fn is_dependent(instruction: &Instruction) -> bool {
    match instruction {
        Instruction::SimpleState(_) | Instruction::Skip(_) => instruction.is_active(),
        Instruction::Reference(_) => true,
        _ => false,
    }
}

pub fn to_impact_map(dependency_map: &DependencyMap) -> ImpactMap {
    let mut impact_map = ImpactMap::default();
    for (dependent, dependencies) in dependency_map {
        for dependency in dependencies {
            let dependents = impact_map.entry(dependency.clone()).or_default();
            if !dependents.contains(dependent) {
                dependents.push(dependent.clone());
            }
        }
    }
    impact_map
}

pub fn to_dependency_map(impact_map: &ImpactMap) -> DependencyMap {
    let mut dependency_map = DependencyMap::default();
    for (dependency, dependents) in impact_map {
        for dependent in dependents {
            let dependencies = dependency_map.entry(dependent.clone()).or_default();
            if !dependencies.contains(dependency) {
                dependencies.push(dependency.clone());
            }
        }
    }
    dependency_map
}

pub fn to_string_impact_map(impact_map: &ImpactMap) -> StringImpactMap {
    impact_map
        .iter()
        .map(|(dependency, dependents)| {
            (
                dependency.to_value_key(),
                dependents.iter().map(ToString::to_string).collect(),
            )
        })
        .collect()
}

pub fn from_string_impact_map(map: &StringImpactMap) -> Result<ImpactMap> {
    map.iter()
        .map(|(key, dependents)| {
            let dependency = Dependency::from_value_key(key).ok_or_else(|| invalid_key(key))?;
            let dependents = dependents
                .iter()
                .map(|dependent| {
                    dependent
                        .split_once('.')
                        .map(|(component, instruction)| Dependent::new(component, instruction))
                        .ok_or_else(|| invalid_key(dependent))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((dependency, dependents))
        })
        .collect::<Result<IndexMap<_, _>>>()
}

fn invalid_key(key: &str) -> EngineError {
    EngineError::InvalidInstruction(format!("invalid impact map key `{key}`"))
}
