//! Name-based method dispatch onto construct-once inference objects
//!
//! Each endpoint owns a [`Dispatcher`] that pairs a lazily-constructed
//! singleton with a closed table of named methods. Requests either read an
//! attribute, construct the singleton, or invoke a registered method.

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod inspect;
pub mod request;
pub mod table;

pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use handle::Handle;
pub use inspect::{resolve_path, Attr, Inspect};
pub use request::{Args, RawRequest, Reply, Request, CODE_ERROR, CODE_OK, INIT_METHOD};
pub use table::{MethodTable, NoArgs};
