//! Portfolio deployments — history plus a one-button GitHub Actions trigger.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Admin   │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  client  │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         │ Deployer::request_deployment()         │
//!                       │         v                                        │
//!                       │  trigger.rs  (Deployer, Dispatcher trait)        │
//!                       │         │                                        │
//!                       │         │ GitHubDispatcher::dispatch()           │
//!                       │         v                                        │
//!                       │  github.rs  (repository_dispatch over reqwest)   │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `models` | `Deployment`, `DeploymentStatus` and its transitions    |
//! | `db`     | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)     |
//! | `ws`     | `WsMessage` enum + `broadcast_message()` helper         |
//!
//! ## Typical Request Flow ("Deploy now")
//!
//! 1. `POST /api/deployments` → `Deployer::request_deployment()`; a second
//!    request while one is running gets 409.
//! 2. A `pending` row is inserted with the admin-panel note.
//! 3. `Deployer::trigger()` checks the GitHub token, marks the row
//!    `approved`, and sends `repository_dispatch` to the source repo.
//! 4. On success the row becomes `deploying` with the public site URL; on
//!    failure it becomes `failed` with the GitHub status and body.
//! 5. The CI workflow may later `POST /api/deployments/{id}/complete` to
//!    record `deployed` or `failed`.

pub mod api;
pub mod db;
pub mod github;
pub mod models;
pub mod server;
pub mod trigger;
pub mod ws;
