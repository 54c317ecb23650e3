//! The gateway: request pipeline and its builder.

mod builder;
mod pipeline;

pub use builder::GatewayBuilder;
pub use pipeline::{Gateway, HealthReport};
