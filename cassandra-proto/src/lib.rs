pub mod error_frame;
pub mod frame;
pub mod parse;
pub mod request;
pub mod write;

pub use error_frame::ErrorFrame;
pub use frame::{read_frame, Frame, FrameError, FrameFlags, FrameHeader, ProtocolVersion};
pub use request::{extract_prepared_ids, RequestOpcode};
