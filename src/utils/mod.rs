pub mod bytereader;
pub mod compose;
pub mod error;
pub mod image;
pub mod info;
pub mod logger;
pub mod options;
pub mod text;
pub mod writer;
