//! Commands Module - mutation commands, command graphs and their compiler

pub mod cache;
pub mod command;
pub mod compiler;
pub mod graph;
pub mod proxy;

pub use cache::{CacheStats, CompilationCache};
pub use command::{
    Associates, Command, CommandExtension, CommandSpec, CommandType, Mapper, PluginRegistry,
};
pub use compiler::{CommandCache, CommandCompiler, CompileKey, Customization};
pub use graph::CommandGraph;
pub use proxy::{CommandProxy, CompiledCommand};
