//! Extension de mobserver::Server pour le relais audio

use crate::api_rest::{ApiDoc, RelayState, create_router};
use mobserver::Server;
use utoipa::OpenApi;

/// Ajoute `GET /audio/{id}` et sa documentation (`/swagger-ui/relay`)
pub trait RelayServerExt {
    async fn init_relay(&mut self, state: RelayState);
}

impl RelayServerExt for Server {
    async fn init_relay(&mut self, state: RelayState) {
        self.add_openapi(create_router(state), ApiDoc::openapi(), "relay")
            .await;
    }
}
