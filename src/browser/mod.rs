pub mod connection;

pub use connection::attach_to_exam_page;
