//! Per-endpoint dispatcher

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};

use super::error::DispatchError;
use super::handle::Handle;
use super::inspect::{resolve_path, Inspect};
use super::request::{Args, Reply, Request};
use super::table::MethodTable;

type Constructor<T> = Box<dyn Fn(Args) -> Result<T, DispatchError> + Send + Sync>;

/// Routes requests for one handle family to its singleton
pub struct Dispatcher<T> {
    name: &'static str,
    handle: Handle<T>,
    methods: MethodTable<T>,
    constructor: Constructor<T>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Create a dispatcher whose constructor takes typed arguments.
    ///
    /// Fails if the method table does not validate.
    pub fn new<P, F>(name: &'static str, methods: MethodTable<T>, constructor: F) -> anyhow::Result<Self>
    where
        P: DeserializeOwned,
        F: Fn(P) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        methods
            .validate()
            .map_err(|e| e.context(format!("invalid method table for `{}`", name)))?;

        let constructor: Constructor<T> = Box::new(move |args| {
            let params: P = serde_json::from_value(Value::Object(args)).map_err(|source| {
                DispatchError::InvalidArguments {
                    handle: name,
                    method: super::INIT_METHOD.to_string(),
                    source,
                }
            })?;
            constructor(params).map_err(|source| DispatchError::Construction { handle: name, source })
        });

        Ok(Self {
            name,
            handle: Handle::new(),
            methods,
            constructor,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.methods.names()
    }

    /// Construct the singleton if needed. Always replies with a null result
    /// on success, whether or not this call did the construction.
    pub fn initialize(&self, args: Args) -> Result<Reply, DispatchError> {
        let payload = args_payload(&args);

        let constructed = self
            .handle
            .get_or_try_init(|| {
                info!("Loading {}", self.name);
                (self.constructor)(args)
            })
            .inspect_err(|e| log_fault(self.name, super::INIT_METHOD, &payload, e))?;

        if constructed {
            info!("{} loaded", self.name);
        }

        Ok(Reply::result(Value::Null))
    }

    /// Call a registered method on the constructed singleton
    pub fn invoke(&self, method: &str, args: Args) -> Result<Reply, DispatchError> {
        let payload = args_payload(&args);

        let result = self
            .handle
            .get()
            .ok_or(DispatchError::Uninitialized { handle: self.name })
            .and_then(|instance| {
                let mut target = instance.lock();
                self.methods.call(self.name, &mut target, method, args)
            })
            .inspect_err(|e| log_fault(self.name, method, &payload, e))?;

        Ok(Reply::result(result))
    }

    /// Dispatch a request that does not read attributes
    pub fn dispatch(&self, request: Request) -> Result<Reply, DispatchError> {
        match request {
            Request::Read { path } => {
                let err = DispatchError::MalformedRequest(format!(
                    "`{}` does not support attribute reads",
                    self.name
                ));
                log_fault(self.name, &path, "{}", &err);
                Err(err)
            }
            Request::Init { args } => self.initialize(args),
            Request::Invoke { method, args } => self.invoke(&method, args),
        }
    }
}

impl<T: Inspect + Send + 'static> Dispatcher<T> {
    /// Read an attribute. Never fails: a missing handle or path yields the
    /// `{"value": "error", "code": -1}` reply.
    pub fn read(&self, path: &str) -> Reply {
        let value = self
            .handle
            .get()
            .and_then(|instance| {
                let target = instance.lock();
                resolve_path(&*target, path)
            });

        match value {
            Some(value) => Reply::value(value),
            None => {
                info!("Attribute read `{}.{}` failed", self.name, path);
                Reply::read_error()
            }
        }
    }

    /// Dispatch a request, serving attribute reads
    pub fn dispatch_with_reads(&self, request: Request) -> Result<Reply, DispatchError> {
        match request {
            Request::Read { path } => Ok(self.read(&path)),
            other => self.dispatch(other),
        }
    }
}

fn args_payload(args: &Args) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "<unserializable>".to_string())
}

fn log_fault(handle: &str, method: &str, payload: &str, err: &DispatchError) {
    error!(
        handle,
        method,
        args = payload,
        code = err.code(),
        "Request failed: {}",
        err
    );
}
