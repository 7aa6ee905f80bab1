//! C API for the vesper voice enhancement pipeline.
//!
//! This crate only links the `vsp_*` functions defined in `vesper` (feature
//! `ffi`) into a static or dynamic library and generates `include/vesper.h`
//! with cbindgen at build time.
//!
//! # Usage from C
//!
//! ```c
//! #include "vesper.h"
//!
//! VspConfig config = vsp_config_default();
//! config.noise_suppression_enabled = true;
//! VspAudioProcessing *apm = vsp_create_with_config(config);
//!
//! VspStreamConfig stream = { .sample_rate_hz = 48000, .num_channels = 1 };
//! int16_t frame[480];
//! /* ... fill frame ... */
//! VspError err = vsp_process_stream_i16(apm, frame, 480, stream, stream, frame, 480);
//!
//! vsp_destroy(apm);
//! ```

pub use vesper::ffi::functions::*;
pub use vesper::ffi::types::*;
