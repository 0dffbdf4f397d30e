#![allow(dead_code)]

pub mod recording_gpu;
pub mod test_utils;
