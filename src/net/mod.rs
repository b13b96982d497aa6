mod backend;

pub use backend::{Backend, BackendError, RemoteResponse};
