use drainer::drain::{request::RequestError, DrainError};
use drainer::telemetry::TelemetryError;
use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to create client: '{}'", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Invalid drain configuration: '{}'", source))]
    Configuration { source: RequestError },

    #[snafu(display("Drain failed: '{}'", source))]
    Drain { source: DrainError },

    #[snafu(display("Unable to serialize drain report: '{}'", source))]
    SerializeReport { source: serde_json::Error },

    #[snafu(display("Error configuring telemetry: '{}'", source))]
    TelemetryInit { source: TelemetryError },

    #[snafu(display("Uncordon failed: '{}'", source))]
    Uncordon { source: DrainError },
}
