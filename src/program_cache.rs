use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{Backend, CompilationUnit};

/// Shares compiled programs between identical compilation units, keyed by source text and compiler options.
pub(crate) struct ProgramCache<B: Backend> {
    programs: HashMap<(String, String), Arc<B::Program>>,
}
impl<B: Backend> ProgramCache<B> {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
        }
    }

    pub fn get(&self, unit: &CompilationUnit) -> Option<Arc<B::Program>> {
        self.programs
            .get(&(unit.source.clone(), unit.options.clone()))
            .map(Arc::clone)
    }

    pub fn insert(&mut self, unit: &CompilationUnit, program: &Arc<B::Program>) {
        self.programs.insert(
            (unit.source.clone(), unit.options.clone()),
            Arc::clone(program),
        );
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }
}
