//! Calibration data for a fixed camera setup.
//!
//! Rectangles are measured once (with any image viewer or selection tool)
//! and stored in a small text file.

pub mod roi_file;

pub use roi_file::RoiCoordinates;
