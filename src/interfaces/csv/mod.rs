pub mod receipt_writer;
pub mod session_reader;
