pub mod buffer;

pub use buffer::SharedBuffer;
