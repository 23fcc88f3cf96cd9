mod deployments;
mod projects;
mod system;
mod webhook;

pub use deployments::{deploy_routes, deployments_routes};
pub use projects::projects_routes;
pub use system::reconcile;
pub use webhook::receive_webhook;

use axum::{routing::post, Router};

use crate::state::AppContext;

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .nest("/projects", projects_routes())
        .nest("/deployments", deployments_routes())
        .nest("/deploy", deploy_routes())
        .route("/webhooks/{secret}", post(receive_webhook))
        .route("/system/reconcile", post(reconcile))
}
