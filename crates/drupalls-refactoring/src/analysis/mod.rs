//! Structural analysis of class source
//!
//! Brace counting over a comment- and string-aware lexer stands in for a PHP
//! parser. The analyzer recovers just enough structure (imports, properties,
//! constructor, static factory) to merge new dependencies into existing code.

pub mod analyzer;
pub mod regions;
pub mod scanner;

pub use analyzer::{analyze_structure, StructureAnalyzer};
pub use regions::{
    ClassDeclaration, ClassKind, ConstructionCall, FactoryMethodRegion, FetchCall,
    ImportStatement, ImportsBlock, InstanceAssignment, LineRange, MethodRegion, Parameter,
    PropertiesBlock, PropertyDeclaration, SourceRegionMap,
};
