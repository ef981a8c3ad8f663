//! Survey definition model: the component tree, its instructions and the value types
//! exchanged with the script engine and the host.

mod codes;
mod component;
mod dependency;
mod instruction;
mod instruction_error;
mod navigation;
mod reserved_code;
mod response;
mod return_type;
mod tree;

pub use codes::{SURVEY_CODE, is_reference_code, is_skip_code, is_valid_component_code};
pub use component::{
    Answer, ChildlessComponent, ComponentError, ElementType, Group, GroupType, NodeEdit, NodeView, Question, Survey,
    SurveyComponent,
};
pub use dependency::{
    Bindings, Dependency, DependencyMap, Dependent, FormatBindings, ImpactMap, StringImpactMap, ValueMap,
};
pub use instruction::{
    ChildPriority, ComponentInstruction, Instruction, PARENT_RELEVANCE_CODE, PRIORITY_GROUPS_CODE, ParentRelevance,
    PriorityGroup, PriorityGroups, RANDOM_GROUP_CODE, RandomGroup, RandomGroups, RandomOption, Reference,
    RunnableInstruction, SimpleState, SkipInstruction,
};
pub use instruction_error::InstructionError;
pub use navigation::{NavigationDirection, NavigationIndex, NavigationInfo, NavigationMode};
pub use reserved_code::ReservedCode;
pub use response::{ColumnName, ResponseField};
pub use return_type::{DataType, ReturnType};
pub use tree::ComponentTree;
