//! Command registry: a trie of command names to handlers, populated at
//! boot. Grounded in `agent::index::function_index`'s name->node lookup
//! shape, adapted from a flat function index to a nested command trie per
//! spec.md §4.4 ("a command may declare subcommands; dispatcher recurses
//! down the trie").

use super::CommandHandler;
use gateway_core::command::Privilege;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CommandNode {
    pub name: String,
    pub summary: String,
    pub required_privilege: Privilege,
    pub handler: Option<Arc<dyn CommandHandler>>,
    pub subcommands: HashMap<String, CommandNode>,
}

impl CommandNode {
    pub fn leaf(
        name: impl Into<String>,
        summary: impl Into<String>,
        required_privilege: Privilege,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            required_privilege,
            handler: Some(handler),
            subcommands: HashMap::new(),
        }
    }

    pub fn branch(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            required_privilege: Privilege::Everyone,
            handler: None,
            subcommands: HashMap::new(),
        }
    }

    pub fn with_subcommand(mut self, child: CommandNode) -> Self {
        self.subcommands.insert(child.name.clone(), child);
        self
    }
}

/// Top-level registry: one trie root per command name.
#[derive(Default)]
pub struct CommandRegistry {
    roots: HashMap<String, CommandNode>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: CommandNode) {
        self.roots.insert(node.name.clone(), node);
    }

    pub fn get(&self, name: &str) -> Option<&CommandNode> {
        self.roots.get(name)
    }

    /// All top-level command names, sorted, for rendering the help trie.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.roots.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn roots(&self) -> impl Iterator<Item = &CommandNode> {
        self.roots.values()
    }
}
