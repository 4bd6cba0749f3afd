//! # mobrelay - Relais audio de Mobify
//!
//! Sert `GET /audio/{id}` : l'identifiant est résolu par `mobyoutube`, puis
//! le flux de la source amont est relayé au client en respectant les
//! requêtes `Range` (lecture, reprise, déplacement dans la piste).
//!
//! ```rust,no_run
//! use mobconfig::Config;
//! use mobrelay::{RangeRelay, RelayConfigExt, RelayServerExt, RelayState};
//! use mobserver::ServerBuilder;
//! use mobyoutube::YoutubeClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_config("")?;
//! let relay = RangeRelay::new(YoutubeClient::from_config(&config), config.get_relay_options())?;
//!
//! let mut server = ServerBuilder::from_config(&config).build();
//! server.init_relay(RelayState::new(relay)).await;
//! # Ok(())
//! # }
//! ```

pub mod api_rest;
pub mod config_ext;
pub mod error;
pub mod probe;
pub mod range;
pub mod relay;
pub mod server_ext;

pub use api_rest::RelayState;
pub use config_ext::RelayConfigExt;
pub use error::{RelayError, Result};
pub use probe::{ProbeResult, probe};
pub use range::{ByteRange, ContentRange};
pub use relay::{RangeRelay, RelayOptions};
pub use server_ext::RelayServerExt;
