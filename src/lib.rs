//! Declare request and response shapes once; get validation, serialization
//! and an OpenAPI 3.0.3 document out of the same declarations.
//!
//! ```
//! use json_oasis::{Field, Model, Origin, Schema};
//! use serde_json::json;
//!
//! let book = Model::builder("Book")
//!     .field(Field::new("title", Schema::string().max_length(20)))
//!     .field(Field::new("pages", Schema::integer().minimum(1.0)))
//!     .build()
//!     .unwrap();
//!
//! let err = book.deserialize(&json!({"title": "Dune", "pages": 0}), Origin::Body).unwrap_err();
//! assert_eq!(err.to_string(), "pages: The value must be greater than or equal to 1.");
//! ```
pub mod data;
mod de;
pub mod decl;
pub mod error;
pub mod model;
pub mod operation;
pub mod param;
pub mod schema;
mod ser;
pub mod spec;

pub use data::{Attributes, Data, Record, Secret, Timestamp, Upload, PASSWORD_MASK};
pub use decl::{DeclError, Declarations};
pub use error::{
    CodecError, DefinitionError, ErrorKind, Loc, SerializeError, SpecError, ValidationError, path_string,
};
pub use model::{Erase, Field, Model, ModelBuilder, ModelSlot, RequiredFields, UnknownFields};
pub use operation::{Method, Operation, ParsedRequest, RawRequest, RequestError};
pub use param::{FormBody, JsonBody, Location, Parameters, RawParams, Style, StyleKind};
pub use schema::{Origin, Schema};
pub use spec::{Info, OpenApi};
