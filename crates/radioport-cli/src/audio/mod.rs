//! Audio I/O: decoding, device output and the segment driver.

pub mod decoder;
pub mod driver;
pub mod output;

pub use decoder::{ Decoder, DecoderError, FileInfo };
pub use driver::AudioDriver;
