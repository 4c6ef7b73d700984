pub mod config;
pub mod context;
pub mod docx;
pub mod ir;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod textutil;
