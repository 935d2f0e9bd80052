//! Request-side types shared by transports, adapters and the service layer.
//!
//! [`InferenceTask`] is the unit of work; [`TransportMetadata`] carries what
//! the transport knew about the request; [`Format`] and [`Orient`] describe
//! how a payload is laid out; [`SemanticType`] and [`DtypeSpec`] describe the
//! declared schema.

pub mod dtype;
pub mod format;
pub mod headers;
pub mod task;

pub use dtype::*;
pub use format::*;
pub use headers::*;
pub use task::*;
