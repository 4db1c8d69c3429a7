//! Conversion between live references and relocatable tokens
//!
//! The recipe, not variable values, is the unit of relocatable state: every
//! argument to `add` is reduced to a token that can be resolved against a
//! registry's current state in a different process, under a different
//! identifier. The contract is that tokens may only reference prior `add`
//! results or variables the registry owns.

use super::args::{Arg, Literal};
use super::component::BoundMethod;
use super::Registry;
use crate::factory::Factory;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A relocatable stand-in for one argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A directly serializable value, passed through unchanged.
    Literal(Literal),
    /// A reference to a variable or component, as an identifier-relative
    /// path. For components the path is the component name; for variables it
    /// is the full name with the identifier segment stripped.
    Var { path: String },
    /// A bound method of a registered component. `owner` is the component
    /// name, or a path whose leading segment is the component name.
    Method { owner: String, method: String },
}

/// A relocatable stand-in for the callable of one registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallToken {
    /// A factory looked up by registered name.
    Factory(String),
    /// A bound method of a previously registered component.
    Method { owner: String, method: String },
}

/// A call token resolved against a live registry.
pub(crate) enum ResolvedCall {
    Factory(Arc<dyn Factory>),
    Method(BoundMethod),
}

impl Registry {
    /// Convert an argument into a relocatable token.
    ///
    /// Fails with [`Error::Sanitize`] when the argument is a live reference
    /// this registry does not track: a variable outside the owned set, a
    /// component handle with an unknown name, or a method bound to an
    /// unregistered owner.
    pub fn sanitize(&self, arg: &Arg) -> Result<Token> {
        match arg {
            Arg::Literal(lit) => Ok(Token::Literal(lit.clone())),
            Arg::Var(var) => {
                let owned = self.owned.iter().any(|v| v.same_storage(var));
                let path = self.relative_name(var.name());
                match (owned, path) {
                    (true, Some(path)) => Ok(Token::Var {
                        path: path.to_string(),
                    }),
                    _ => Err(Error::Sanitize(format!("variable {}", var.name()))),
                }
            }
            Arg::Component(component) => {
                if !self.components.contains_key(component.name()) {
                    return Err(Error::Sanitize(format!(
                        "component {}",
                        component.name()
                    )));
                }
                // Variable components are referenced by the variable's
                // relative path; everything else by the component name. Both
                // resolve through the same two-step lookup.
                let path = match component.as_variable() {
                    Some(var) => self
                        .relative_name(var.name())
                        .unwrap_or(component.name())
                        .to_string(),
                    None => component.name().to_string(),
                };
                Ok(Token::Var { path })
            }
            Arg::Method(method) => {
                if self.components.contains_key(method.owner().name()) {
                    Ok(Token::Method {
                        owner: method.owner().name().to_string(),
                        method: method.method().to_string(),
                    })
                } else {
                    Err(Error::Sanitize(format!(
                        "bound method {}.{}",
                        method.owner().name(),
                        method.method()
                    )))
                }
            }
        }
    }

    /// Resolve a token against this registry's current state.
    ///
    /// Variable paths resolve against the current identifier first; when no
    /// such variable exists (e.g. during replay, before the variable's
    /// component has been rebuilt) the leading path segment is retried as a
    /// component name. Method owners resolve as a component name directly,
    /// then by the owner's leading path segment, since only components carry
    /// method tables. Every miss fails with
    /// [`Error::UnresolvableReference`].
    pub fn unsanitize(&self, token: &Token) -> Result<Arg> {
        match token {
            Token::Literal(lit) => Ok(Arg::Literal(lit.clone())),
            Token::Var { path } => {
                let full = format!("{}/{}", self.identifier, path);
                if let Some(var) = self.graph.variable(&full) {
                    return Ok(Arg::Var(var));
                }
                let leading = path.split('/').next().unwrap_or(path);
                if let Some(component) = self.components.get(leading) {
                    return Ok(Arg::Component(component.clone()));
                }
                Err(Error::UnresolvableReference(path.clone()))
            }
            Token::Method { owner, method } => {
                let component = self
                    .components
                    .get(owner)
                    .or_else(|| {
                        let leading = owner.split('/').next().unwrap_or(owner);
                        self.components.get(leading)
                    })
                    .ok_or_else(|| Error::UnresolvableReference(owner.clone()))?;
                Ok(Arg::Method(component.method(method)?))
            }
        }
    }
}
