//! C-compatible FFI layer for the processing pipeline.
//!
//! Exposes `extern "C"` functions and `#[repr(C)]` types so C and C++
//! callers can drive [`AudioProcessing`](crate::AudioProcessing). The
//! `vesper-ffi` crate packages this module as a static library with a
//! generated header.
//!
//! # Symbol prefix
//!
//! - Functions: `vsp_*`
//! - Types: `Vsp*`
//!
//! # Thread safety
//!
//! **NOT thread-safe.** All calls on the same [`types::VspAudioProcessing`]
//! handle must be serialized by the caller.

pub mod types;

mod conversions;
pub mod functions;
mod panic_guard;
