//! The rebinding pass and function instantiation.
//!
//! Rebinding walks an AIR subtree with a mirrored chain of analytic
//! contexts and replaces resolvable local lookups with bound references.
//! Subtrees with nothing to bind are shared structurally.

use std::rc::Rc;

use crate::air::AirNode;
use crate::runtime::context::{AnalyticContext, Scope};
use crate::runtime::function::InstantiatedFunction;
use crate::source::SourceLocation;

/// Rebind a node list in the given scope, cloning only what changed.
pub fn rebind_nodes(code: &[AirNode], ctx: &dyn Scope) -> Vec<AirNode> {
    code.iter()
        .map(|node| node.rebind_opt(ctx).unwrap_or_else(|| node.clone()))
        .collect()
}

pub struct AirOptimizer {
    params: Vec<String>,
    code: Vec<AirNode>,
}

impl AirOptimizer {
    /// Prepare a function body: when a defining scope is given, free names
    /// that resolve outside the body are captured as bound references.
    /// This is the only place names from an outer scope become visible to
    /// a function body.
    pub fn rebind(defining: Option<&dyn Scope>, params: Vec<String>, code: &[AirNode]) -> Self {
        let code = match defining {
            Some(scope) => {
                let ctx_func = AnalyticContext::new_function(Some(scope), &params);
                rebind_nodes(code, &ctx_func)
            }
            None => code.to_vec(),
        };
        Self { params, code }
    }

    /// Solidify the prepared body into an invocable function.
    pub fn create_function(
        &self,
        sloc: SourceLocation,
        name: impl Into<String>,
    ) -> Rc<InstantiatedFunction> {
        Rc::new(InstantiatedFunction::new(
            sloc,
            name,
            self.params.clone(),
            &self.code,
        ))
    }
}
