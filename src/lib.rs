pub mod cli;
pub mod config;
pub mod error;
pub mod frame_interval;
pub mod job_file;
pub mod model;
pub mod properties;
pub mod report;
pub mod segmenter;
pub mod segmenting_plan;
pub mod splitter;
pub mod store;
pub mod util;
