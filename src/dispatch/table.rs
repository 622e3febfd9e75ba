//! Closed table of named methods
//!
//! Handlers are registered with a typed parameter struct. Incoming keyword
//! arguments are deserialized into that struct before the handler runs, so a
//! bad argument name or type fails as a validation error rather than inside
//! the model code.

use std::collections::{BTreeMap, HashSet};

use anyhow::bail;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DispatchError;
use super::request::{Args, INIT_METHOD};

type Handler<T> = Box<dyn Fn(&mut T, Args) -> Result<Value, MethodError> + Send + Sync>;

/// Parameter struct for methods that take no arguments
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// Failure of a single handler call, before it is tagged with the handle name
pub(crate) enum MethodError {
    Arguments(serde_json::Error),
    Failed(anyhow::Error),
}

pub struct MethodTable<T> {
    methods: BTreeMap<&'static str, Handler<T>>,
    duplicates: HashSet<&'static str>,
}

impl<T> MethodTable<T> {
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
            duplicates: HashSet::new(),
        }
    }

    /// Register a method.
    ///
    /// Registration problems are collected and reported by [`validate`](Self::validate).
    pub fn method<P, R, F>(mut self, name: &'static str, handler: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(&mut T, P) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let handler: Handler<T> = Box::new(move |target, args| {
            let params: P =
                serde_json::from_value(Value::Object(args)).map_err(MethodError::Arguments)?;
            let result = handler(target, params).map_err(MethodError::Failed)?;
            serde_json::to_value(result).map_err(|e| MethodError::Failed(e.into()))
        });

        if self.methods.insert(name, handler).is_some() {
            self.duplicates.insert(name);
        }
        self
    }

    /// Check the table before it is put into service
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.methods.contains_key(INIT_METHOD) {
            bail!("`{}` is reserved for construction", INIT_METHOD);
        }
        if !self.duplicates.is_empty() {
            let mut names: Vec<_> = self.duplicates.iter().copied().collect();
            names.sort_unstable();
            bail!("methods registered more than once: {}", names.join(", "));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        self.methods.keys().copied().collect()
    }

    /// Run a method on `target`
    pub fn call(
        &self,
        handle: &'static str,
        target: &mut T,
        method: &str,
        args: Args,
    ) -> Result<Value, DispatchError> {
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| DispatchError::UnknownMethod {
                handle,
                method: method.to_string(),
            })?;

        handler(target, args).map_err(|e| match e {
            MethodError::Arguments(source) => DispatchError::InvalidArguments {
                handle,
                method: method.to_string(),
                source,
            },
            MethodError::Failed(source) => DispatchError::Invocation {
                handle,
                method: method.to_string(),
                source,
            },
        })
    }
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
