use crate::{
    environment::{OpStackRules, VMType},
    errors::{ContextResult, VMError},
    hooks::{default_hook::DefaultHook, op_stack_hook::OpStackHook},
    vm::VM,
};
use std::{cell::RefCell, rc::Rc};

/// Chain-specific logic run around the execution of the outermost frame.
pub trait Hook {
    /// Validates the transaction and charges it up front. An error here must leave no trace in
    /// the world state.
    fn prepare_execution(&mut self, vm: &mut VM<'_>) -> Result<(), VMError>;

    /// Settles gas and fees once the outermost frame has finished, successfully or not.
    fn finalize_execution(
        &mut self,
        vm: &mut VM<'_>,
        report: &mut ContextResult,
    ) -> Result<(), VMError>;
}

pub fn get_hooks(vm_type: &VMType) -> Vec<Rc<RefCell<dyn Hook + 'static>>> {
    match vm_type {
        VMType::L1 => l1_hooks(),
        VMType::OpStack(rules) => op_stack_hooks(*rules),
    }
}

pub fn l1_hooks() -> Vec<Rc<RefCell<dyn Hook + 'static>>> {
    vec![Rc::new(RefCell::new(DefaultHook))]
}

pub fn op_stack_hooks(rules: OpStackRules) -> Vec<Rc<RefCell<dyn Hook + 'static>>> {
    vec![Rc::new(RefCell::new(OpStackHook::new(rules)))]
}
