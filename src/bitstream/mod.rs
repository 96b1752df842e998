pub mod bitreader;
pub mod bitwriter;

pub use bitreader::InStream;
pub use bitwriter::OutStream;
