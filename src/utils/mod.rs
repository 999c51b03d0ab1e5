pub mod utils_duration;
