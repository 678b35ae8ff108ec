pub mod builtin;
pub mod fpe;
mod op;
mod resolve;
mod signature;
mod types;

pub use op::UFunc;
pub use resolve::{Resolution, resolve_loop};
pub use signature::CoreSignature;
pub use types::{Identity, InnerLoopFn, Loop, UFuncError};

use std::collections::HashMap;

/// Wrapper for ufunc factory functions
pub struct UFuncFactory {
    pub factory: fn() -> UFunc,
}

// Collect all registered ufuncs
inventory::collect!(UFuncFactory);

/// Register a ufunc factory with the inventory system
#[macro_export]
macro_rules! register_ufunc {
    ($factory:path) => {
        inventory::submit! {
            $crate::UFuncFactory { factory: $factory }
        }
    };
}

/// Holds every registered operation, keyed by name.
pub struct UFuncRegistry {
    map: HashMap<&'static str, UFunc>,
}

impl UFuncRegistry {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Build and register every inventory-submitted ufunc.
    pub fn collect_inventory(&mut self) {
        for entry in inventory::iter::<UFuncFactory> {
            self.register((entry.factory)());
        }
    }

    /// Register an operation under its own name, replacing any previous one.
    pub fn register(&mut self, ufunc: UFunc) {
        self.map.insert(ufunc.name(), ufunc);
    }

    pub fn get(&self, name: &str) -> Option<&UFunc> {
        self.map.get(name)
    }

    /// Mutable access, for appending user loops to a registered operation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut UFunc> {
        self.map.get_mut(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&UFunc, UFuncError> {
        self.map
            .get(name)
            .ok_or_else(|| UFuncError::UnknownUFunc(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.map.keys().copied()
    }
}

impl Default for UFuncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
