//! CLI command implementations.
//!
//! | Module    | Commands handled                          |
//! |-----------|-------------------------------------------|
//! | `project` | `Init`                                    |
//! | `serve`   | `Serve`                                   |
//! | `deploy`  | `Deploy`, `Trigger`, `History`, `Show`    |
//! | `config`  | `Config`                                  |

pub mod config;
pub mod deploy;
pub mod project;
pub mod serve;

pub use config::cmd_config;
pub use deploy::{cmd_deploy, cmd_history, cmd_show, cmd_trigger};
pub use project::cmd_init;
pub use serve::cmd_serve;
