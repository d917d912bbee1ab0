pub mod epoch_stats;
pub mod eval;
pub mod loop_fn;
pub mod parallel;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use eval::{evaluate, Errors};
pub use loop_fn::train_loop;
pub use parallel::train_parallel;
pub use train_config::TrainConfig;
