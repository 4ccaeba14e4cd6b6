pub mod config;
pub mod converter;
pub mod imaging;
pub mod metrics;
pub mod options;
pub mod processor;
pub mod queue;
pub mod staging;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, QueueConfig,
};
pub use converter::{ConverterConfig, FfmpegConverter};
pub use imaging::ImageProcessor;
pub use options::{
    parse_options, parse_options_json, parse_query_options, MediaOptions, OptionsError,
};
pub use processor::{
    Event, EventSink, Job, JobInput, MediaKind, MediaService, ProcessError, ProcessedFile,
    Processor, StatusPayload, SubmitError,
};
pub use queue::{JobQueue, QueueStatus};
