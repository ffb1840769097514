//! Grammar model, inheritance resolution, compilation, and registry.

pub mod compiled;
pub mod inheritance;
pub mod model;
pub mod registry;

pub use compiled::CompiledGrammar;
pub use model::{
    Cardinality, EditableRange, Grammar, Placeholder, StructureKind, StructureNode,
    SuggestionDecls, SuggestionItem, Template, TemplateField, TokenDefinition, ValueItem,
};
pub use registry::{GrammarRegistry, DEFAULT_STANDARD};
