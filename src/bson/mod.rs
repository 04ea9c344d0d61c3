//! BSON: the binary document format MongoDB documents and command
//! arguments are encoded in.

mod decimal128;
mod document;
mod object_id;
mod value;

pub use decimal128::Decimal128;
pub use document::Document;
pub use object_id::ObjectId;
pub(crate) use object_id::ObjectIdGenerator;
pub use value::Value;
